use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::Base;

/// One typing site: a diallelic SNP at a 1-based reference coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTarget {
    /// Reference sequence name, as used by the aligner
    pub chromosome: String,

    /// 1-based position on `chromosome`
    pub position: u64,

    pub reference_allele: Base,

    pub alternate_allele: Base,
}

impl VariantTarget {
    #[must_use]
    pub fn new(
        chromosome: impl Into<String>,
        position: u64,
        reference_allele: Base,
        alternate_allele: Base,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference_allele,
            alternate_allele,
        }
    }

    /// Site identifier used as a column name, e.g. `chr1:100`
    #[must_use]
    pub fn site_id(&self) -> String {
        format!("{}:{}", self.chromosome, self.position)
    }

    /// The site as a BED interval (0-based, half-open)
    #[must_use]
    pub fn bed_interval(&self) -> (u64, u64) {
        (self.position - 1, self.position)
    }
}

/// The ordered, immutable set of typing sites for a run.
///
/// Iteration order is the order the sites appeared in the variant file, and
/// defines the column order of every output row.
#[derive(Debug, Clone, Default)]
pub struct TargetTable {
    targets: Vec<VariantTarget>,
    by_site: HashMap<(String, u64), usize>,
}

impl TargetTable {
    /// Build a table from already-validated targets.
    ///
    /// Returns the duplicated target as the error if a `(chromosome, position)`
    /// pair repeats.
    pub fn new(targets: Vec<VariantTarget>) -> Result<Self, VariantTarget> {
        let mut by_site = HashMap::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            if by_site
                .insert((target.chromosome.clone(), target.position), i)
                .is_some()
            {
                return Err(target.clone());
            }
        }
        Ok(Self { targets, by_site })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariantTarget> {
        self.targets.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[VariantTarget] {
        &self.targets
    }

    /// Column index of the site at `chromosome:position`, if it is a target
    #[must_use]
    pub fn index_of(&self, chromosome: &str, position: u64) -> Option<usize> {
        self.by_site
            .get(&(chromosome.to_string(), position))
            .copied()
    }

    /// Render the sites as BED lines, in table order
    #[must_use]
    pub fn to_bed(&self) -> String {
        let mut bed = String::new();
        for target in &self.targets {
            let (start, end) = target.bed_interval();
            bed.push_str(&format!("{}\t{start}\t{end}\n", target.chromosome));
        }
        bed
    }
}

impl<'a> IntoIterator for &'a TargetTable {
    type Item = &'a VariantTarget;
    type IntoIter = std::slice::Iter<'a, VariantTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_preserves_order() {
        let table = TargetTable::new(vec![
            VariantTarget::new("chr1", 300, Base::A, Base::G),
            VariantTarget::new("chr1", 100, Base::C, Base::T),
        ])
        .unwrap();

        let positions: Vec<u64> = table.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![300, 100]);
        assert_eq!(table.index_of("chr1", 100), Some(1));
        assert_eq!(table.index_of("chr2", 100), None);
    }

    #[test]
    fn test_table_rejects_duplicate_site() {
        let result = TargetTable::new(vec![
            VariantTarget::new("chr1", 100, Base::A, Base::G),
            VariantTarget::new("chr1", 100, Base::C, Base::T),
        ]);
        let dup = result.unwrap_err();
        assert_eq!(dup.site_id(), "chr1:100");
    }

    #[test]
    fn test_same_position_on_other_chromosome_allowed() {
        let table = TargetTable::new(vec![
            VariantTarget::new("chr1", 100, Base::A, Base::G),
            VariantTarget::new("plasmid", 100, Base::C, Base::T),
        ])
        .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_to_bed_is_zero_based() {
        let table =
            TargetTable::new(vec![VariantTarget::new("chr1", 100, Base::A, Base::T)]).unwrap();
        assert_eq!(table.to_bed(), "chr1\t99\t100\n");
    }
}
