use std::io::{BufRead, BufReader};
use std::path::Path;

use noodles::sam;

use crate::parsing::ParseError;

/// What an aligner wrote for one assembly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentStats {
    /// Reference sequence names from the `@SQ` lines
    pub reference_names: Vec<String>,

    /// All alignment records, including unmapped and secondary ones
    pub records: usize,

    /// Mapped primary and supplementary records
    pub mapped: usize,
}

impl AlignmentStats {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapped == 0
    }
}

/// Read a SAM file and count its mapped records
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or `ParseError::Noodles`
/// if the header or a record cannot be parsed.
pub fn scan_sam_file(path: &Path) -> Result<AlignmentStats, ParseError> {
    let reader = std::fs::File::open(path).map(BufReader::new)?;
    scan_sam_reader(reader)
}

fn scan_sam_reader<R: BufRead>(reader: R) -> Result<AlignmentStats, ParseError> {
    let mut reader = sam::io::Reader::new(reader);

    let header = reader
        .read_header()
        .map_err(|e| ParseError::Noodles(e.to_string()))?;

    let mut stats = AlignmentStats {
        reference_names: header
            .reference_sequences()
            .keys()
            .map(ToString::to_string)
            .collect(),
        ..AlignmentStats::default()
    };

    for result in reader.record_bufs(&header) {
        let record = result.map_err(|e| ParseError::Noodles(e.to_string()))?;
        stats.records += 1;

        let flags = record.flags();
        if !flags.is_unmapped() && !flags.is_secondary() {
            stats.mapped += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "@HD\tVN:1.6\tSO:unsorted\n@SQ\tSN:chr1\tLN:1000\n@PG\tID:minimap2\tPN:minimap2\n";

    #[test]
    fn test_scan_mapped_records() {
        let sam = format!(
            "{HEADER}contig1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\t*\n\
             contig2\t4\t*\t0\t0\t*\t*\t0\t0\tGGGG\t*\n\
             contig3\t256\tchr1\t5\t0\t4M\t*\t0\t0\t*\t*\n"
        );
        let stats = scan_sam_reader(sam.as_bytes()).unwrap();

        assert_eq!(stats.reference_names, vec!["chr1".to_string()]);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.mapped, 1);
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_scan_header_only_is_empty() {
        let stats = scan_sam_reader(HEADER.as_bytes()).unwrap();
        assert_eq!(stats.records, 0);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_scan_only_unmapped_is_empty() {
        let sam = format!("{HEADER}contig1\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n");
        let stats = scan_sam_reader(sam.as_bytes()).unwrap();
        assert_eq!(stats.records, 1);
        assert!(stats.is_empty());
    }
}
