//! Reference FASTA parsing using noodles.
//!
//! Extracts the sequence dictionary (names and lengths) of the reference so
//! typing sites can be checked against it before any alignment starts.
//! Supports both uncompressed and gzip/bgzip compressed files.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use noodles::fasta;

use crate::core::target::TargetTable;
use crate::parsing::ParseError;
use crate::utils::validation::open_text;

/// Names and lengths of the reference sequences, in file order
#[derive(Debug, Clone, Default)]
pub struct ReferenceDictionary {
    contigs: Vec<(String, u64)>,
    lengths: HashMap<String, u64>,
}

impl ReferenceDictionary {
    #[must_use]
    pub fn new(contigs: Vec<(String, u64)>) -> Self {
        let lengths = contigs.iter().cloned().collect();
        Self { contigs, lengths }
    }

    #[must_use]
    pub fn contigs(&self) -> &[(String, u64)] {
        &self.contigs
    }

    #[must_use]
    pub fn length_of(&self, name: &str) -> Option<u64> {
        self.lengths.get(name).copied()
    }

    /// Check that every target lies on a reference sequence and within its bounds.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::ReferenceMismatch` naming the first offending site.
    pub fn validate_targets(&self, targets: &TargetTable) -> Result<(), ParseError> {
        for target in targets {
            match self.length_of(&target.chromosome) {
                None => {
                    let known: Vec<&str> = self
                        .contigs
                        .iter()
                        .take(5)
                        .map(|(name, _)| name.as_str())
                        .collect();
                    return Err(ParseError::ReferenceMismatch(format!(
                        "chromosome '{}' (site {}) not found in reference; reference has: {}{}",
                        target.chromosome,
                        target.site_id(),
                        known.join(", "),
                        if self.contigs.len() > known.len() { ", ..." } else { "" }
                    )));
                }
                Some(length) if target.position > length => {
                    return Err(ParseError::ReferenceMismatch(format!(
                        "site {} is beyond the end of '{}' (length {length})",
                        target.site_id(),
                        target.chromosome
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Parse a reference FASTA file and extract sequence names and lengths.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if
/// parsing fails, or `ParseError::InvalidFormat` if no sequences are found.
pub fn parse_reference_dictionary(path: &Path) -> Result<ReferenceDictionary, ParseError> {
    let reader = open_text(path)?;
    let mut fasta_reader = fasta::io::Reader::new(reader);
    parse_fasta_reader(&mut fasta_reader)
}

/// Parse from a noodles FASTA reader
fn parse_fasta_reader<R: BufRead>(
    reader: &mut fasta::io::Reader<R>,
) -> Result<ReferenceDictionary, ParseError> {
    let mut contigs = Vec::new();

    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        let name = String::from_utf8_lossy(record.name()).to_string();
        let length = record.sequence().len() as u64;

        contigs.push((name, length));
    }

    if contigs.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No sequences found in reference FASTA".to_string(),
        ));
    }

    Ok(ReferenceDictionary::new(contigs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target::VariantTarget;
    use crate::core::types::Base;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fasta(content: &[u8]) -> NamedTempFile {
        let mut temp = NamedTempFile::with_suffix(".fa").unwrap();
        temp.write_all(content).unwrap();
        temp.flush().unwrap();
        temp
    }

    #[test]
    fn test_parse_reference_dictionary() {
        let temp = write_fasta(b">chr1 description\nACGTACGT\nACGT\n>plasmid\nGGGG\n");

        let dict = parse_reference_dictionary(temp.path()).unwrap();
        assert_eq!(dict.contigs().len(), 2);
        assert_eq!(dict.contigs()[0], ("chr1".to_string(), 12));
        assert_eq!(dict.length_of("plasmid"), Some(4));
        assert_eq!(dict.length_of("chr2"), None);
    }

    #[test]
    fn test_parse_empty_fasta() {
        let temp = write_fasta(b"");
        assert!(parse_reference_dictionary(temp.path()).is_err());
    }

    #[test]
    fn test_validate_targets() {
        let dict = ReferenceDictionary::new(vec![("chr1".to_string(), 1000)]);

        let ok = TargetTable::new(vec![VariantTarget::new("chr1", 1000, Base::A, Base::T)])
            .unwrap();
        assert!(dict.validate_targets(&ok).is_ok());

        let wrong_name =
            TargetTable::new(vec![VariantTarget::new("1", 100, Base::A, Base::T)]).unwrap();
        let err = dict.validate_targets(&wrong_name).unwrap_err();
        assert!(matches!(err, ParseError::ReferenceMismatch(_)));
        assert!(err.to_string().contains("'1'"));

        let out_of_bounds =
            TargetTable::new(vec![VariantTarget::new("chr1", 1001, Base::A, Base::T)]).unwrap();
        assert!(matches!(
            dict.validate_targets(&out_of_bounds),
            Err(ParseError::ReferenceMismatch(_))
        ));
    }
}
