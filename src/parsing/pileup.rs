//! Parser for `samtools mpileup` text output.
//!
//! Each line describes one reference position:
//! `chrom  pos  ref_base  depth  bases  quals`
//!
//! The bases column uses the pileup encoding:
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | `.` `,` | matches the reference base (forward / reverse strand) |
//! | `ACGTN` `acgtn` | mismatching base |
//! | `*` `#` | deletion spanning this position |
//! | `>` `<` | reference skip |
//! | `^X` | start of a read, `X` is its mapping quality |
//! | `$` | end of a read |
//! | `+3ACG` `-2TT` | insertion / deletion following this position |

use std::io::BufRead;
use std::path::Path;

use crate::core::types::Base;
use crate::parsing::ParseError;

/// Base counts at one pileup position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PileupColumn {
    pub chromosome: String,

    /// 1-based position
    pub position: u64,

    /// Depth as reported by samtools
    pub depth: u32,

    /// Observed `A`, `C`, `G`, `T` counts (reference matches resolved)
    pub base_counts: [u32; 4],

    /// Observed `N` bases
    pub unknown: u32,

    /// Deletions and reference skips spanning the position
    pub deletions: u32,

    /// Insertions or deletions starting right after the position
    pub indels: u32,
}

impl PileupColumn {
    /// A column with no aligned data, for positions the pileup did not report
    #[must_use]
    pub fn empty(chromosome: impl Into<String>, position: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            ..Self::default()
        }
    }

    /// Whether any read carries a gap at or right after this position
    #[must_use]
    pub fn has_gap(&self) -> bool {
        self.deletions > 0 || self.indels > 0
    }

    /// The most frequent concrete base and its count, `None` if no base was seen.
    /// Ties resolve to the first base in `ACGT` order.
    #[must_use]
    pub fn top_base(&self) -> Option<(Base, u32)> {
        let mut best: Option<(Base, u32)> = None;
        for base in Base::ACGT {
            let count = base.index().map_or(0, |i| self.base_counts[i]);
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((base, count));
            }
        }
        best
    }

    /// Number of distinct concrete bases observed
    #[must_use]
    pub fn distinct_bases(&self) -> usize {
        self.base_counts.iter().filter(|&&c| c > 0).count()
    }
}

/// Parse a pileup file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::InvalidFormat` for malformed lines.
pub fn parse_pileup_file(path: &Path) -> Result<Vec<PileupColumn>, ParseError> {
    let reader = std::fs::File::open(path).map(std::io::BufReader::new)?;
    parse_pileup_reader(reader)
}

/// Parse pileup text
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for malformed lines.
pub fn parse_pileup_text(text: &str) -> Result<Vec<PileupColumn>, ParseError> {
    parse_pileup_reader(text.as_bytes())
}

fn parse_pileup_reader<R: BufRead>(reader: R) -> Result<Vec<PileupColumn>, ParseError> {
    let mut columns = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let column = parse_pileup_line(&line).map_err(|reason| {
            ParseError::InvalidFormat(format!("pileup line {}: {reason}", i + 1))
        })?;
        columns.push(column);
    }
    Ok(columns)
}

/// Parse a single mpileup line
fn parse_pileup_line(line: &str) -> Result<PileupColumn, String> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if fields.len() < 4 {
        return Err(format!("expected at least 4 fields, found {}", fields.len()));
    }

    let position: u64 = fields[1]
        .parse()
        .map_err(|_| format!("invalid position '{}'", fields[1]))?;
    let depth: u32 = fields[3]
        .parse()
        .map_err(|_| format!("invalid depth '{}'", fields[3]))?;

    // IUPAC or missing reference bases cannot be resolved from '.' / ','
    let reference = fields[2]
        .as_bytes()
        .first()
        .and_then(|&b| Base::from_byte(b))
        .unwrap_or(Base::N);

    let mut column = PileupColumn {
        chromosome: fields[0].to_string(),
        position,
        depth,
        ..PileupColumn::default()
    };

    let bases = fields.get(4).copied().unwrap_or("");
    tally_bases(bases.as_bytes(), reference, &mut column)?;

    Ok(column)
}

fn tally_bases(bases: &[u8], reference: Base, column: &mut PileupColumn) -> Result<(), String> {
    let mut i = 0;
    while i < bases.len() {
        match bases[i] {
            // Read start: the following byte is the mapping quality
            b'^' => {
                i += 2;
                continue;
            }
            b'$' => {}
            b'.' | b',' => count_base(reference, column),
            b'*' | b'#' | b'>' | b'<' => column.deletions += 1,
            b'+' | b'-' => {
                let digits_start = i + 1;
                let mut digits_end = digits_start;
                while digits_end < bases.len() && bases[digits_end].is_ascii_digit() {
                    digits_end += 1;
                }
                let length: usize = std::str::from_utf8(&bases[digits_start..digits_end])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| "indel marker without length".to_string())?;
                let end = digits_end.saturating_add(length);
                if end > bases.len() {
                    return Err(format!(
                        "indel of length {length} runs past the end of the bases field"
                    ));
                }
                column.indels += 1;
                i = end;
                continue;
            }
            other => match Base::from_byte(other) {
                Some(base) => count_base(base, column),
                None => return Err(format!("unexpected pileup symbol '{}'", other as char)),
            },
        }
        i += 1;
    }
    Ok(())
}

fn count_base(base: Base, column: &mut PileupColumn) {
    match base.index() {
        Some(i) => column.base_counts[i] += 1,
        None => column.unknown += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_match() {
        let columns = parse_pileup_text("chr1\t100\tA\t1\t^~.$\t~\n").unwrap();
        assert_eq!(columns.len(), 1);
        let col = &columns[0];
        assert_eq!(col.chromosome, "chr1");
        assert_eq!(col.position, 100);
        assert_eq!(col.depth, 1);
        assert_eq!(col.top_base(), Some((Base::A, 1)));
        assert!(!col.has_gap());
    }

    #[test]
    fn test_mismatch_both_strands() {
        let col = &parse_pileup_text("chr1\t100\tA\t2\tTt\t~~").unwrap()[0];
        assert_eq!(col.top_base(), Some((Base::T, 2)));
        assert_eq!(col.distinct_bases(), 1);
    }

    #[test]
    fn test_mapq_char_is_not_a_base() {
        // '^' followed by mapq 'G' must not count as a G
        let col = &parse_pileup_text("chr1\t100\tA\t1\t^G,\t~").unwrap()[0];
        assert_eq!(col.top_base(), Some((Base::A, 1)));
        assert_eq!(col.distinct_bases(), 1);
    }

    #[test]
    fn test_zero_depth() {
        let col = &parse_pileup_text("chr1\t100\tA\t0\t\t").unwrap()[0];
        assert_eq!(col.depth, 0);
        assert_eq!(col.top_base(), None);

        let col = &parse_pileup_text("chr1\t100\tA\t0").unwrap()[0];
        assert_eq!(col.depth, 0);
    }

    #[test]
    fn test_deletion_and_indel_markers() {
        let col = &parse_pileup_text("chr1\t100\tA\t2\t*.\t~~").unwrap()[0];
        assert_eq!(col.deletions, 1);
        assert!(col.has_gap());

        // Insertion sequence must not be counted as bases
        let col = &parse_pileup_text("chr1\t100\tA\t1\t.+3GGG\t~").unwrap()[0];
        assert_eq!(col.indels, 1);
        assert_eq!(col.base_counts, [1, 0, 0, 0]);

        let col = &parse_pileup_text("chr1\t100\tA\t1\t,-12ACGTACGTACGT$\t~").unwrap()[0];
        assert_eq!(col.indels, 1);
        assert_eq!(col.base_counts, [1, 0, 0, 0]);
    }

    #[test]
    fn test_ambiguous_reference_base() {
        let col = &parse_pileup_text("chr1\t100\tR\t1\t.\t~").unwrap()[0];
        assert_eq!(col.unknown, 1);
        assert_eq!(col.top_base(), None);
    }

    #[test]
    fn test_tie_keeps_first_base() {
        let col = &parse_pileup_text("chr1\t100\tA\t2\t.G\t~~").unwrap()[0];
        assert_eq!(col.distinct_bases(), 2);
        assert_eq!(col.top_base(), Some((Base::A, 1)));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(parse_pileup_text("chr1\t100\tA\n").is_err());
        assert!(parse_pileup_text("chr1\tabc\tA\t1\t.\t~\n").is_err());
        assert!(parse_pileup_text("chr1\t100\tA\t1\t.+\t~\n").is_err());
        assert!(parse_pileup_text("chr1\t100\tA\t1\t!\t~\n").is_err());
    }

    #[test]
    fn test_indel_length_beyond_field() {
        let huge = parse_pileup_text("chr1\t100\tA\t1\t.+18446744073709551615A\t~\n");
        assert!(matches!(huge, Err(ParseError::InvalidFormat(_))));

        let truncated = parse_pileup_text("chr1\t100\tA\t1\t.+5GG\t~\n");
        assert!(matches!(truncated, Err(ParseError::InvalidFormat(_))));

        // Indel sequence ending exactly at the field end is fine
        let col = &parse_pileup_text("chr1\t100\tA\t1\t.+2GG\t~\n").unwrap()[0];
        assert_eq!(col.indels, 1);
    }
}
