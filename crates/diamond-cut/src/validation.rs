//! Selector disjointness checks
//!
//! Run before any transaction is built so that a collision surfaces as
//! [`CutError::SelectorCollision`] instead of an on-chain rejection.

use crate::error::CutError;
use crate::model::{Facet, ProtectedSet, RoutingTable};
use diamond_primitives::Selector;
use std::collections::HashMap;

/// Check that every desired selector is claimed exactly once
///
/// A facet listed twice claims its selectors twice and collides with itself.
///
/// # Errors
/// Returns [`CutError::SelectorCollision`] naming both facets
pub fn ensure_disjoint(facets: &[Facet]) -> Result<(), CutError> {
    let mut claims: HashMap<Selector, &Facet> = HashMap::new();
    for facet in facets {
        for selector in &facet.selectors {
            if let Some(owner) = claims.insert(*selector, facet) {
                return Err(CutError::SelectorCollision {
                    selector: *selector,
                    existing: owner.name.clone(),
                    incoming: facet.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Check that none of the desired selectors is still routed in `table`
///
/// Used between the removal and addition phases: after removal only
/// protected facets may remain, and they must not overlap the desired set.
///
/// # Errors
/// Returns [`CutError::SelectorCollision`] naming the facet still holding
/// the selector
pub fn ensure_unrouted(table: &RoutingTable, facets: &[Facet]) -> Result<(), CutError> {
    for facet in facets {
        for selector in &facet.selectors {
            if let Some(existing) = table.facet_of(selector) {
                return Err(CutError::SelectorCollision {
                    selector: *selector,
                    existing: existing.to_string(),
                    incoming: facet.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Addresses of entries that are routed but not protected
#[must_use]
pub fn unprotected_facets(table: &RoutingTable, protected: &ProtectedSet) -> Vec<diamond_primitives::Address> {
    table
        .facet_addresses()
        .filter(|facet| !protected.contains(facet))
        .collect()
}
