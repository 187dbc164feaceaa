use std::path::Path;

use tracing::debug;

use crate::core::target::TargetTable;
use crate::core::types::Base;
use crate::external::{AlignmentHandle, CancelToken, PileupReader, ToolError};
use crate::parsing::pileup::PileupColumn;
use crate::utils::validation::ValidationError;

/// Default minimum depth for a call
pub const DEFAULT_MIN_DEPTH: u32 = 1;

/// Default share of the depth the dominant base must exceed (strict majority)
pub const DEFAULT_MAJORITY_FRACTION: f64 = 0.5;

/// The base read at one site, with the depth it was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub base: Base,
    pub depth: u32,
}

impl Observation {
    #[must_use]
    pub fn no_data() -> Self {
        Self {
            base: Base::N,
            depth: 0,
        }
    }
}

/// Rules for turning a pileup column into a single base
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallPolicy {
    /// Sites covered by fewer aligned bases are `N`
    pub min_depth: u32,

    /// The dominant base must account for more than this share of the depth
    pub majority_fraction: f64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            min_depth: DEFAULT_MIN_DEPTH,
            majority_fraction: DEFAULT_MAJORITY_FRACTION,
        }
    }
}

impl CallPolicy {
    /// # Errors
    ///
    /// Returns `ValidationError::MajorityFraction` unless
    /// `0.5 <= majority_fraction < 1.0`.
    pub fn new(min_depth: u32, majority_fraction: f64) -> Result<Self, ValidationError> {
        if !(0.5..1.0).contains(&majority_fraction) {
            return Err(ValidationError::MajorityFraction(majority_fraction));
        }
        Ok(Self {
            min_depth,
            majority_fraction,
        })
    }

    /// Resolve a pileup column to a base.
    ///
    /// `N` when the site is uncovered or below `min_depth`, when any read has
    /// a deletion, skip or indel there, or when no base holds the required
    /// majority.
    #[must_use]
    pub fn resolve(&self, column: &PileupColumn) -> Base {
        let observed: u32 =
            column.base_counts.iter().sum::<u32>() + column.unknown + column.deletions;
        let depth = column.depth.max(observed);

        if depth == 0 || depth < self.min_depth || column.has_gap() {
            return Base::N;
        }

        match column.top_base() {
            Some((base, count)) if f64::from(count) > self.majority_fraction * f64::from(depth) => {
                base
            }
            _ => Base::N,
        }
    }

    #[must_use]
    pub fn observe(&self, column: &PileupColumn) -> Observation {
        if column.distinct_bases() > 1 {
            debug!(
                chromosome = %column.chromosome,
                position = column.position,
                counts = ?column.base_counts,
                "Mixed bases at site"
            );
        }
        Observation {
            base: self.resolve(column),
            depth: column.depth,
        }
    }
}

/// Match pileup columns to the typing sites.
///
/// Returns one observation per target in table order; sites the pileup did
/// not report are `N` with depth 0.
#[must_use]
pub fn observe_sites(
    columns: &[PileupColumn],
    targets: &TargetTable,
    policy: &CallPolicy,
) -> Vec<Observation> {
    let mut slots: Vec<Option<&PileupColumn>> = vec![None; targets.len()];

    for column in columns {
        match targets.index_of(&column.chromosome, column.position) {
            Some(i) if slots[i].is_none() => slots[i] = Some(column),
            Some(_) => debug!(
                chromosome = %column.chromosome,
                position = column.position,
                "Ignoring repeated pileup column"
            ),
            None => {}
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.map_or_else(Observation::no_data, |column| policy.observe(column)))
        .collect()
}

/// Read the base at every typing site of one alignment
///
/// # Errors
///
/// Propagates the pileup reader's `ToolError`; ambiguous sites are not
/// errors, they come back as `N`.
pub fn extract(
    reader: &dyn PileupReader,
    reference: &Path,
    alignment: &AlignmentHandle,
    targets: &TargetTable,
    policy: &CallPolicy,
    scratch: &Path,
    cancel: &CancelToken,
) -> Result<Vec<Observation>, ToolError> {
    let columns = reader.pileup(reference, alignment, targets, scratch, cancel)?;
    Ok(observe_sites(&columns, targets, policy))
}
