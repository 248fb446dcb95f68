//! Two-phase cut planning
//!
//! The upgrade tears down every non-protected facet in one batch, then routes
//! the full desired set in a second batch. No selector is ever routed twice
//! mid-upgrade, and the planner never has to diff old and new facet identity.

use crate::error::CutError;
use crate::model::{Cut, CutBatch, Facet, ProtectedSet, RoutingTable};
use crate::validation::ensure_disjoint;

/// Remove-then-add planner
///
/// # Characteristics
/// - Protected facets are never targeted by a `Remove`
/// - Removal order follows table order
/// - Addition order follows the desired facet order, one `Add` per facet
/// - Desired facets are checked for pairwise disjointness before any cut is built
#[derive(Debug, Clone, Copy, Default)]
pub struct CutPlanner;

impl CutPlanner {
    /// Create new planner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// One `Remove` per routed facet outside `protected`
    #[must_use]
    pub fn plan_removal(&self, current: &RoutingTable, protected: &ProtectedSet) -> CutBatch {
        current
            .entries()
            .iter()
            .filter(|entry| !protected.contains(&entry.facet_address()))
            .map(Cut::unroute_entry)
            .collect()
    }

    /// One `Add` per desired facet carrying its full selector list
    ///
    /// # Errors
    /// - [`CutError::SelectorCollision`] if two desired facets share a selector
    /// - [`CutError::EmptySelectors`] if a facet exposes nothing to route
    pub fn plan_addition(&self, desired: &[Facet]) -> Result<CutBatch, CutError> {
        ensure_disjoint(desired)?;
        desired
            .iter()
            .map(|facet| Cut::add(facet.address, facet.selectors.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CutAction, RoutingEntry};
    use diamond_primitives::{Address, Selector};
    use pretty_assertions::assert_eq;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn sels(ns: &[u8]) -> Vec<Selector> {
        ns.iter().map(|n| Selector::new([*n, 0xaa, 0, 0])).collect()
    }

    fn scenario_table() -> RoutingTable {
        RoutingTable::from_entries(vec![
            RoutingEntry::new(addr(1), sels(&[1, 2])).unwrap(),
            RoutingEntry::new(addr(2), sels(&[3])).unwrap(),
            RoutingEntry::new(addr(3), sels(&[4, 5])).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn removal_skips_protected_entries() {
        let protected: ProtectedSet = std::iter::once(addr(1)).collect();
        let batch = CutPlanner::new().plan_removal(&scenario_table(), &protected);

        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|c| c.action() == CutAction::Remove));
        assert!(batch.iter().all(|c| c.facet_address().is_zero()));
        assert_eq!(batch.cuts()[0].selectors(), sels(&[3]).as_slice());
        assert_eq!(batch.cuts()[1].selectors(), sels(&[4, 5]).as_slice());
    }

    #[test]
    fn removal_with_everything_protected_is_empty() {
        let protected: ProtectedSet = [addr(1), addr(2), addr(3)].into_iter().collect();
        assert!(CutPlanner::new().plan_removal(&scenario_table(), &protected).is_empty());
    }

    #[test]
    fn removal_of_empty_table_is_empty() {
        let batch = CutPlanner::new().plan_removal(&RoutingTable::new(), &ProtectedSet::new());
        assert!(batch.is_empty());
    }

    #[test]
    fn protected_address_absent_from_table_is_harmless() {
        let protected: ProtectedSet = std::iter::once(addr(42)).collect();
        let batch = CutPlanner::new().plan_removal(&scenario_table(), &protected);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn addition_rejects_facet_listed_twice() {
        let facet = Facet::new("NewA", addr(7), sels(&[10, 11]));
        let err = CutPlanner::new().plan_addition(&[facet.clone(), facet]).unwrap_err();
        assert!(err.is_collision());
    }

    #[test]
    fn addition_emits_one_add_per_facet() {
        let desired = vec![
            Facet::new("NewA", addr(7), sels(&[10, 11])),
            Facet::new("NewB", addr(8), sels(&[12])),
        ];
        let batch = CutPlanner::new().plan_addition(&desired).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.cuts()[0].action().as_u8(), 0);
        assert_eq!(batch.cuts()[0].facet_address(), addr(7));
        assert_eq!(batch.cuts()[1].selectors(), sels(&[12]).as_slice());
    }

    #[test]
    fn addition_detects_collision_before_building() {
        let desired = vec![
            Facet::new("NewA", addr(7), sels(&[10, 11])),
            Facet::new("NewB", addr(8), sels(&[11])),
        ];
        let err = CutPlanner::new().plan_addition(&desired).unwrap_err();
        assert!(err.is_collision());
    }

    #[test]
    fn addition_rejects_facet_without_selectors() {
        let desired = vec![Facet::new("Empty", addr(7), vec![])];
        assert!(matches!(
            CutPlanner::new().plan_addition(&desired),
            Err(CutError::EmptySelectors { .. })
        ));
    }
}
