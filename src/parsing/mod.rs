//! Parsers for the files a typing run reads.
//!
//! - **Variant-call files** ([`vcf`]): typing sites (`CHROM POS ID REF ALT ...`)
//! - **Reference FASTA** ([`fasta`]): sequence dictionary used to validate sites
//! - **Assembly lists** ([`assembly_list`]): one assembly path per line
//! - **SAM output** ([`sam`]): alignment statistics for the aligner's output
//! - **Pileups** ([`pileup`]): `samtools mpileup` text, one column per site
//!
//! ## Example
//!
//! ```rust,no_run
//! use assembly_snptyper::parsing::{fasta, vcf};
//! use std::path::Path;
//!
//! let targets = vcf::load(Path::new("scheme.vcf")).unwrap();
//! let reference = fasta::parse_reference_dictionary(Path::new("reference.fa")).unwrap();
//! reference.validate_targets(&targets).unwrap();
//! ```

use thiserror::Error;

pub mod assembly_list;
pub mod fasta;
pub mod pileup;
pub mod sam;
pub mod vcf;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Malformed variant file (line {line}): {reason}")]
    MalformedVariantFile { line: usize, reason: String },

    #[error("Variant file contains no records")]
    NoVariantRecords,

    #[error("Reference mismatch: {0}")]
    ReferenceMismatch(String),

    #[error("Too many variant records: {0} exceeds maximum allowed")]
    TooManyTargets(usize),

    #[error("Too many assemblies: {0} exceeds maximum allowed")]
    TooManyAssemblies(usize),
}
