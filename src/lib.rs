//! # assembly-snptyper
//!
//! A library for genotyping bacterial genome assemblies at a fixed set of SNPs.
//!
//! Typing schemes define lineages or clones by the alleles carried at a few
//! hundred reference positions. Given a scheme as a variant-call file, the
//! reference it was defined on, and a list of assemblies, `assembly-snptyper`
//! aligns each assembly to the reference, reads the base at every site, and
//! reports whether it carries the reference allele, the alternate allele,
//! another base, or has no usable coverage.
//!
//! ## Features
//!
//! - **Assembly-to-reference alignment**: minimap2 with an `asm` preset
//! - **Pileup-based calls**: `samtools mpileup` restricted to the typing sites
//! - **Failure isolation**: an assembly that cannot be typed gets a failed row
//! - **Parallel and deterministic**: rows always follow input order
//! - **Scoped scratch space**: per-assembly artifacts removed on every exit path
//!
//! ## Example
//!
//! ```rust,no_run
//! use assembly_snptyper::cli::render::{render, OutputFormat};
//! use assembly_snptyper::external::{CancelToken, Toolchain};
//! use assembly_snptyper::parsing::{assembly_list, vcf};
//! use assembly_snptyper::typing::{dispatch, AssemblyWorker};
//! use std::path::Path;
//!
//! let targets = vcf::load(Path::new("scheme.vcf")).unwrap();
//! let records = assembly_list::parse_assembly_list(Path::new("assemblies.txt")).unwrap();
//!
//! let toolchain = Toolchain::default();
//! let (aligner, pileup) = (toolchain.aligner(), toolchain.pileup_reader());
//! let worker = AssemblyWorker::new(Path::new("reference.fa"), &targets, &aligner, &pileup);
//!
//! let results = dispatch::run(&records, 4, &worker, &CancelToken::new()).unwrap();
//! render(&results, &targets, OutputFormat::Tsv, &mut std::io::stdout()).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Core data types for sites, assemblies and calls
//! - [`parsing`]: Parsers for variant files, reference FASTA, lists and pileups
//! - [`external`]: minimap2 and samtools subprocess adapters
//! - [`typing`]: Per-assembly worker, call extraction and parallel dispatch
//! - [`cli`]: Command-line interface implementation and output formatting

pub mod cli;
pub mod core;
pub mod external;
pub mod parsing;
pub mod typing;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::assembly::{AssemblyRecord, AssemblyResult, Failure, FailureKind, SiteCall};
pub use crate::core::target::{TargetTable, VariantTarget};
pub use crate::core::types::*;
pub use typing::{AssemblyWorker, CallPolicy, ProcessAssembly};
