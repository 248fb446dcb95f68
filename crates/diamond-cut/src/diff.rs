//! Single-batch diff planning
//!
//! Alternative to the two-phase planner: selectors moving between
//! non-protected facets are rebound with `Replace`, new selectors are
//! `Add`ed, selectors no longer wanted are `Remove`d, and selectors already
//! routed to the desired facet are left alone. One transaction instead of
//! two, at the price of trusting the table read for identity.

use crate::error::CutError;
use crate::model::{Cut, CutBatch, Facet, ProtectedSet, RoutingTable};
use crate::validation::ensure_disjoint;
use diamond_primitives::{Address, Selector};
use indexmap::IndexMap;

/// Diffing planner emitting `Remove`, `Replace` and `Add` in one batch
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffPlanner;

impl DiffPlanner {
    /// Create new planner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plan the batch that turns `current` into protected entries plus `desired`
    ///
    /// Cuts are ordered: one `Remove` for every dropped selector, then one
    /// `Replace` per receiving facet, then one `Add` per receiving facet.
    ///
    /// # Errors
    /// [`CutError::SelectorCollision`] if desired facets overlap, or if a
    /// desired selector is currently served by a protected facet
    pub fn plan(
        &self,
        current: &RoutingTable,
        protected: &ProtectedSet,
        desired: &[Facet],
    ) -> Result<CutBatch, CutError> {
        ensure_disjoint(desired)?;

        let mut wanted: IndexMap<Selector, &Facet> = IndexMap::new();
        for facet in desired {
            for selector in &facet.selectors {
                wanted.insert(*selector, facet);
            }
        }

        let mut adds: IndexMap<Address, Vec<Selector>> = IndexMap::new();
        let mut replaces: IndexMap<Address, Vec<Selector>> = IndexMap::new();
        for (selector, facet) in &wanted {
            match current.facet_of(selector) {
                None => adds.entry(facet.address).or_default().push(*selector),
                Some(owner) if owner == facet.address => {}
                Some(owner) if protected.contains(&owner) => {
                    return Err(CutError::SelectorCollision {
                        selector: *selector,
                        existing: owner.to_string(),
                        incoming: facet.name.clone(),
                    });
                }
                Some(_) => replaces.entry(facet.address).or_default().push(*selector),
            }
        }

        let removed: Vec<Selector> = current
            .entries()
            .iter()
            .filter(|entry| !protected.contains(&entry.facet_address()))
            .flat_map(|entry| entry.selectors().iter().copied())
            .filter(|selector| !wanted.contains_key(selector))
            .collect();

        let mut batch = CutBatch::new();
        if !removed.is_empty() {
            batch.push(Cut::remove(removed)?);
        }
        for (facet, selectors) in replaces {
            batch.push(Cut::replace(facet, selectors)?);
        }
        for (facet, selectors) in adds {
            batch.push(Cut::add(facet, selectors)?);
        }
        Ok(batch)
    }
}
