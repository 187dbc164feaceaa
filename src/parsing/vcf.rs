//! Loader for the typing-scheme variant file.
//!
//! The file is a standard VCF; only the first five columns are read:
//! `#CHROM POS ID REF ALT`. Header lines (`##...`, `#CHROM ...`) are skipped.
//! Every record must be a biallelic SNP with single-base `REF` and `ALT`.
//! Gzip/bgzip compressed files are supported.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::core::target::{TargetTable, VariantTarget};
use crate::core::types::Base;
use crate::parsing::ParseError;
use crate::utils::validation::{check_target_limit, open_text};

/// Load the typing sites from a variant file, in file order.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read,
/// `ParseError::MalformedVariantFile` if a record lacks a field, has a
/// non-SNP allele, has `REF == ALT`, or repeats a site, and
/// `ParseError::NoVariantRecords` if the file has no records.
pub fn load(path: &Path) -> Result<TargetTable, ParseError> {
    let reader = open_text(path)?;
    let table = parse_vcf_reader(reader)?;
    debug!(
        path = %path.display(),
        targets = table.len(),
        "Loaded variant targets"
    );
    Ok(table)
}

/// Parse variant records from VCF text
///
/// # Errors
///
/// See [`load`].
pub fn parse_vcf_text(text: &str) -> Result<TargetTable, ParseError> {
    parse_vcf_reader(text.as_bytes())
}

fn parse_vcf_reader<R: BufRead>(reader: R) -> Result<TargetTable, ParseError> {
    let mut targets = Vec::new();
    // (chromosome, position) -> first line it appeared on
    let mut seen: HashMap<(String, u64), usize> = HashMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        // Line numbers in errors are 1-based for user friendliness
        let line_num = i + 1;

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let target = parse_record_line(line, line_num)?;

        if let Some(first) = seen.insert((target.chromosome.clone(), target.position), line_num) {
            return Err(ParseError::MalformedVariantFile {
                line: line_num,
                reason: format!(
                    "site {} already listed on line {first}",
                    target.site_id()
                ),
            });
        }

        if check_target_limit(targets.len()).is_some() {
            return Err(ParseError::TooManyTargets(targets.len()));
        }
        targets.push(target);
    }

    if targets.is_empty() {
        return Err(ParseError::NoVariantRecords);
    }

    // Duplicates were rejected above
    TargetTable::new(targets).map_err(|dup| ParseError::MalformedVariantFile {
        line: 0,
        reason: format!("duplicate site {}", dup.site_id()),
    })
}

/// Parse one tab-delimited record: `CHROM POS ID REF ALT [...]`
fn parse_record_line(line: &str, line_num: usize) -> Result<VariantTarget, ParseError> {
    let malformed = |reason: String| ParseError::MalformedVariantFile {
        line: line_num,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 5 {
        return Err(malformed(format!(
            "expected at least 5 tab-separated fields (CHROM, POS, ID, REF, ALT), found {}",
            fields.len()
        )));
    }

    let chromosome = fields[0].trim();
    if chromosome.is_empty() {
        return Err(malformed("missing CHROM".to_string()));
    }

    let position: u64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| malformed(format!("invalid POS '{}'", fields[1])))?;
    if position == 0 {
        return Err(malformed("POS must be 1-based (got 0)".to_string()));
    }

    let reference_allele = parse_allele(fields[3].trim(), "REF").map_err(&malformed)?;
    let alternate_allele = parse_allele(fields[4].trim(), "ALT").map_err(&malformed)?;

    if reference_allele == alternate_allele {
        return Err(malformed(format!(
            "REF and ALT are both {reference_allele}"
        )));
    }

    Ok(VariantTarget::new(
        chromosome,
        position,
        reference_allele,
        alternate_allele,
    ))
}

/// Parse a REF/ALT column holding exactly one of `ACGT`
fn parse_allele(value: &str, column: &str) -> Result<Base, String> {
    if value.is_empty() || value == "." {
        return Err(format!("missing {column}"));
    }
    match Base::parse(value) {
        Some(base) if base.is_called() => Ok(base),
        _ => Err(format!(
            "{column} must be a single base (A, C, G or T), got '{value}'"
        )),
    }
}
