//! Property tests for cut planning
//!
//! Random routing tables and desired facet sets are run through both
//! planners and previewed with `RoutingTable::apply`.

use diamond_cut::{CutAction, CutPlanner, DiffPlanner, Facet, ProtectedSet, RoutingEntry, RoutingTable};
use diamond_primitives::{Address, Selector};
use proptest::prelude::*;
use std::collections::HashSet;

fn addr(n: u8) -> Address {
    Address::new([n; 20])
}

fn sel(n: u16) -> Selector {
    let [hi, lo] = n.to_be_bytes();
    Selector::new([0x5e, hi, lo, 0x01])
}

/// Splits a run of selectors across facets, keeping the table a partition
fn table_strategy() -> impl Strategy<Value = RoutingTable> {
    prop::collection::vec(1usize..4, 0..6).prop_map(|sizes| {
        let mut next = 0u16;
        let entries = sizes
            .into_iter()
            .enumerate()
            .map(|(i, size)| {
                let selectors = (0..size)
                    .map(|_| {
                        next += 1;
                        sel(next)
                    })
                    .collect();
                RoutingEntry::new(addr(u8::try_from(i + 1).unwrap()), selectors).unwrap()
            })
            .collect();
        RoutingTable::from_entries(entries).unwrap()
    })
}

/// Desired facets at addresses 100.. with selectors drawn from 200.., so
/// they never overlap whatever the table routes
fn desired_strategy() -> impl Strategy<Value = Vec<Facet>> {
    prop::collection::vec(1usize..4, 1..4).prop_map(|sizes| {
        let mut next = 200u16;
        sizes
            .into_iter()
            .enumerate()
            .map(|(i, size)| {
                let selectors = (0..size)
                    .map(|_| {
                        next += 1;
                        sel(next)
                    })
                    .collect();
                Facet::new(format!("Facet{i}"), addr(100 + u8::try_from(i).unwrap()), selectors)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn removal_never_targets_protected(table in table_strategy(), mask in prop::collection::vec(any::<bool>(), 6)) {
        let protected: ProtectedSet = table
            .facet_addresses()
            .zip(mask.iter())
            .filter(|(_, keep)| **keep)
            .map(|(a, _)| a)
            .collect();

        let batch = CutPlanner::new().plan_removal(&table, &protected);
        let after = table.apply(&batch).unwrap();

        for entry in table.entries() {
            let survives = after.entry(&entry.facet_address()).is_some();
            prop_assert_eq!(survives, protected.contains(&entry.facet_address()));
        }
        prop_assert!(batch.iter().all(|c| c.action() == CutAction::Remove));
    }

    #[test]
    fn two_phase_reaches_protected_plus_desired(table in table_strategy(), desired in desired_strategy()) {
        let protected: ProtectedSet = table.facet_addresses().take(1).collect();
        let planner = CutPlanner::new();

        let removed = table.apply(&planner.plan_removal(&table, &protected)).unwrap();
        diamond_cut::validation::ensure_unrouted(&removed, &desired).unwrap();
        let added = removed.apply(&planner.plan_addition(&desired).unwrap()).unwrap();

        let mut expected: HashSet<Selector> = desired.iter().flat_map(|f| f.selectors.iter().copied()).collect();
        for facet in protected.iter() {
            if let Some(entry) = table.entry(facet) {
                expected.extend(entry.selectors().iter().copied());
            }
        }
        prop_assert_eq!(added.selector_count(), expected.len());
        for facet in &desired {
            for selector in &facet.selectors {
                prop_assert_eq!(added.facet_of(selector), Some(facet.address));
            }
        }
    }

    #[test]
    fn diff_matches_two_phase_outcome(table in table_strategy(), desired in desired_strategy()) {
        let protected: ProtectedSet = table.facet_addresses().take(1).collect();
        let planner = CutPlanner::new();
        let two_phase = table
            .apply(&planner.plan_removal(&table, &protected))
            .and_then(|t| t.apply(&planner.plan_addition(&desired)?))
            .unwrap();
        let diffed = table.apply(&DiffPlanner::new().plan(&table, &protected, &desired).unwrap()).unwrap();

        for entry in two_phase.entries() {
            for selector in entry.selectors() {
                prop_assert_eq!(diffed.facet_of(selector), Some(entry.facet_address()));
            }
        }
        prop_assert_eq!(diffed.selector_count(), two_phase.selector_count());
    }
}
