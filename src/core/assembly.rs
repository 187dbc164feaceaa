use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::types::{Base, Category};

/// One input genome to be typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRecord {
    /// Location of the assembly FASTA
    pub path: PathBuf,

    /// Sample identifier shown in the output (file name without extensions)
    pub label: String,

    /// Position in the input list; the sort key of the final output
    pub ordinal: usize,
}

impl AssemblyRecord {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, ordinal: usize) -> Self {
        let path = path.into();
        let label = label_for(&path);
        Self {
            path,
            label,
            ordinal,
        }
    }
}

/// Derive a sample label from an assembly path.
///
/// Strips the directory and the last extension, plus a trailing compression
/// extension if present: `dir/ERR123.fasta.gz` -> `ERR123`.
#[must_use]
pub fn label_for(path: &Path) -> String {
    let mut stem = path.file_stem().map(|s| s.to_string_lossy().to_string());

    let compressed = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz") || e.eq_ignore_ascii_case("bgz"));
    if compressed {
        stem = stem.map(|s| {
            Path::new(&s)
                .file_stem()
                .map_or_else(|| s.clone(), |inner| inner.to_string_lossy().to_string())
        });
    }

    stem.unwrap_or_else(|| path.display().to_string())
}

/// The call at one (assembly, target) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiteCall {
    /// Dominant base at the site, `N` when there was no usable coverage
    pub observed_base: Base,

    pub category: Category,

    /// Number of aligned bases at the site (assembly contigs covering it)
    pub depth: u32,
}

/// Why an assembly could not be typed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The aligner failed, or the assembly did not align to the reference
    AlignmentFailed,
    /// The pileup could not be produced or read
    ExtractionFailed,
    /// Tooling problem: a subprocess crashed, could not start, or disk I/O failed
    Infrastructure,
    /// The run was interrupted while this assembly was in flight
    Interrupted,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlignmentFailed => "alignment_failed",
            Self::ExtractionFailed => "extraction_failed",
            Self::Infrastructure => "infrastructure_error",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

/// One output row.
///
/// Either carries exactly one [`SiteCall`] per target (in table order), or is
/// failed with no calls at all. Partial rows cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyResult {
    ordinal: usize,
    label: String,
    calls: Vec<SiteCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

impl AssemblyResult {
    /// A successfully typed row. `calls` must be in target-table order.
    #[must_use]
    pub fn typed(record: &AssemblyRecord, calls: Vec<SiteCall>) -> Self {
        Self {
            ordinal: record.ordinal,
            label: record.label.clone(),
            calls,
            failure: None,
        }
    }

    #[must_use]
    pub fn failed(record: &AssemblyRecord, failure: Failure) -> Self {
        Self {
            ordinal: record.ordinal,
            label: record.label.clone(),
            calls: Vec::new(),
            failure: Some(failure),
        }
    }

    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn calls(&self) -> &[SiteCall] {
        &self.calls
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Per-category counters for the row, `None` for failed rows
    #[must_use]
    pub fn summary(&self) -> Option<CallSummary> {
        if self.is_failed() {
            return None;
        }

        let mut summary = CallSummary {
            in_scheme: self.calls.len(),
            ..CallSummary::default()
        };
        for call in &self.calls {
            match call.category {
                Category::Reference => summary.reference += 1,
                Category::Alternate => summary.alternate += 1,
                Category::Other => summary.other += 1,
                Category::NoData => summary.missing += 1,
            }
            if call.depth > 1 {
                summary.multiple_coverage += 1;
            }
        }
        Some(summary)
    }
}

/// Counts of calls by category for one assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    /// Sites carrying the alternate (type-defining) allele
    pub alternate: usize,
    /// Sites carrying the reference (wild-type) allele
    pub reference: usize,
    pub other: usize,
    /// Sites with no usable coverage
    pub missing: usize,
    /// Sites covered more than once, hinting at a duplicated region
    pub multiple_coverage: usize,
    pub in_scheme: usize,
}
