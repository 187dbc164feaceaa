use crate::core::assembly::SiteCall;
use crate::core::target::VariantTarget;
use crate::core::types::{Base, Category};
use crate::typing::extract::Observation;

/// Classify an observed base against a site's expected alleles.
///
/// Total over every `Base`: a third base is `Other`, never `NoData`, so
/// evidence of an unexpected allele stays distinguishable from missing data.
#[must_use]
pub fn classify(observed: Base, target: &VariantTarget) -> Category {
    if observed == Base::N {
        Category::NoData
    } else if observed == target.reference_allele {
        Category::Reference
    } else if observed == target.alternate_allele {
        Category::Alternate
    } else {
        Category::Other
    }
}

/// Build the call for one site from its observation
#[must_use]
pub fn call_site(observation: Observation, target: &VariantTarget) -> SiteCall {
    SiteCall {
        observed_base: observation.base,
        category: classify(observation.base, target),
        depth: observation.depth,
    }
}

/// Classify observations aligned with `targets`, preserving target order
#[must_use]
pub fn call_sites<'a>(
    observations: &[Observation],
    targets: impl IntoIterator<Item = &'a VariantTarget>,
) -> Vec<SiteCall> {
    observations
        .iter()
        .zip(targets)
        .map(|(&observation, target)| call_site(observation, target))
        .collect()
}
