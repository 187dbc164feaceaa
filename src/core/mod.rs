//! Core data types for SNP typing.
//!
//! - [`Base`](types::Base), [`Category`](types::Category): nucleotides and call outcomes
//! - [`VariantTarget`](target::VariantTarget), [`TargetTable`](target::TargetTable):
//!   the ordered typing sites of a run
//! - [`AssemblyRecord`](assembly::AssemblyRecord), [`AssemblyResult`](assembly::AssemblyResult):
//!   one input genome and its output row
//!
//! ## Call categories
//!
//! | Observed base | Category |
//! |---------------|----------|
//! | reference allele | `REFERENCE` |
//! | alternate allele | `ALTERNATE` |
//! | `N` | `NO_DATA` |
//! | any other base | `OTHER` |

pub mod assembly;
pub mod target;
pub mod types;
