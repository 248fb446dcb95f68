//! Component tests against the simulated ledger
//!
//! Registry, reader, planner and applier driven by hand, one step at a time.

use diamond_core::test_harness::SimulatedLedger;
use diamond_core::{
    CutApplier, FacetRegistry, FacetSpec, Ledger, LedgerError, RoutingTableReader, Signer, Timeouts,
    TransactionKind, UpgradeError,
};
use diamond_cut::{Cut, CutAction, CutBatch, CutPlanner, Facet, InitPayload, ProtectedSet, RoutingEntry, RoutingTable};
use diamond_primitives::abi::SelectorFilter;
use diamond_primitives::{Address, Selector};
use diamond_test_utils::{addr, artifact, deployer, fast_timeouts, rental_artifacts};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const CORE: u8 = 0xc0;
const OLD_A: u8 = 0xa1;
const OLD_B: u8 = 0xa2;
const NEW_A: u8 = 0xb1;
const DIAMOND: u8 = 0xd1;

fn sel(sig: &str) -> Selector {
    Selector::from_signature(sig)
}

fn scenario_table() -> RoutingTable {
    RoutingTable::from_entries(vec![
        RoutingEntry::new(addr(CORE), vec![sel("diamondCut()"), sel("facets()")]).unwrap(),
        RoutingEntry::new(addr(OLD_A), vec![sel("rent(uint256)"), sel("endRental(uint256)")]).unwrap(),
        RoutingEntry::new(addr(OLD_B), vec![sel("withdraw()")]).unwrap(),
    ])
    .unwrap()
}

fn scenario_ledger() -> Arc<SimulatedLedger> {
    Arc::new(
        SimulatedLedger::new()
            .with_finality_polls(2)
            .with_diamond(addr(DIAMOND), scenario_table())
            .with_contract(addr(NEW_A)),
    )
}

fn protected() -> ProtectedSet {
    std::iter::once(addr(CORE)).collect()
}

#[tokio::test]
async fn scenario_a_remove_then_add() {
    let ledger = scenario_ledger();
    let reader = RoutingTableReader::new(ledger.clone());
    let applier = CutApplier::new(ledger.clone(), fast_timeouts());
    let signer = Signer::new(deployer());
    let planner = CutPlanner::new();

    let table = reader.read(addr(DIAMOND)).await.unwrap();
    let removal = planner.plan_removal(&table, &protected());
    assert_eq!(removal.len(), 2);
    assert_eq!(removal.cuts()[0].selectors(), table.entry(&addr(OLD_A)).unwrap().selectors());
    assert_eq!(removal.cuts()[1].selectors(), table.entry(&addr(OLD_B)).unwrap().selectors());
    assert!(removal.iter().all(|c| c.action() == CutAction::Remove));

    applier.apply(addr(DIAMOND), &removal, None, &signer).await.unwrap();
    let after_removal = reader.read(addr(DIAMOND)).await.unwrap();
    assert_eq!(after_removal.facet_addresses().collect::<Vec<_>>(), vec![addr(CORE)]);

    let new_a = Facet::new("NewA", addr(NEW_A), vec![sel("rent(uint256,uint64)"), sel("endRental(uint256)")]);
    let addition = planner.plan_addition(std::slice::from_ref(&new_a)).unwrap();
    assert_eq!(addition.cuts(), &[Cut::add(addr(NEW_A), new_a.selectors.clone()).unwrap()]);

    applier.apply(addr(DIAMOND), &addition, None, &signer).await.unwrap();
    let after_addition = reader.read(addr(DIAMOND)).await.unwrap();
    assert_eq!(
        after_addition.facet_addresses().collect::<Vec<_>>(),
        vec![addr(CORE), addr(NEW_A)]
    );
    assert_eq!(after_addition.entry(&addr(NEW_A)).unwrap().selectors(), new_a.selectors.as_slice());
}

#[tokio::test]
async fn scenario_b_explicit_address_attaches() {
    let ledger = Arc::new(SimulatedLedger::new());
    let registry = FacetRegistry::new(ledger.clone(), rental_artifacts(), fast_timeouts());
    let signer = Signer::new(deployer());

    let spec = FacetSpec::new("RentalFacet").at(addr(0x77));
    let handle = registry.resolve(&spec, &signer).await.unwrap();

    assert_eq!(handle.address(), addr(0x77));
    assert_eq!(handle.name(), "RentalFacet");
    assert_eq!(handle.signer().address(), deployer());
    assert_eq!(ledger.deployment_count(), 0);
    assert!(ledger.submitted().is_empty());
}

#[tokio::test]
async fn missing_address_deploys_on_every_resolve() {
    let ledger = Arc::new(SimulatedLedger::new().with_finality_polls(1));
    let registry = FacetRegistry::new(ledger.clone(), rental_artifacts(), fast_timeouts());
    let signer = Signer::new(deployer());

    let spec = FacetSpec::new("RentalFacet");
    let first = registry.resolve(&spec, &signer).await.unwrap();
    let second = registry.resolve(&spec, &signer).await.unwrap();

    assert_ne!(first.address(), second.address());
    assert!(ledger.has_code(first.address()));
    assert!(ledger.has_code(second.address()));
    assert_eq!(ledger.deployment_count(), 2);
}

#[tokio::test]
async fn unknown_contract_and_undeployable_artifact() {
    let ledger = Arc::new(SimulatedLedger::new());
    let artifacts = rental_artifacts().with(diamond_core::ContractArtifact::new(
        "IRental",
        artifact("IRental", &["function rent(uint256)"]).abi,
        vec![],
    ));
    let registry = FacetRegistry::new(ledger.clone(), artifacts, fast_timeouts());
    let signer = Signer::new(deployer());

    let err = registry.resolve(&FacetSpec::new("Nope"), &signer).await.unwrap_err();
    assert!(matches!(err, UpgradeError::UnknownContract(ref n) if n == "Nope"));
    assert!(err.is_pre_submission());

    let err = registry.resolve(&FacetSpec::new("IRental"), &signer).await.unwrap_err();
    assert!(matches!(err, UpgradeError::DeploymentFailed { .. }));
    assert_eq!(ledger.deployment_count(), 0);
}

#[tokio::test]
async fn scenario_c_include_filter_through_handle() {
    let ledger = Arc::new(SimulatedLedger::new());
    let artifacts = rental_artifacts().with(artifact(
        "TokenFacet",
        &[
            "function mint(address to, uint256 id)",
            "function burn(uint256 id)",
            "function transfer(address to, uint256 id)",
        ],
    ));
    let registry = FacetRegistry::new(ledger, artifacts, fast_timeouts());
    let handle = registry
        .resolve(&FacetSpec::new("TokenFacet").at(addr(5)), &Signer::new(deployer()))
        .await
        .unwrap();

    let facet = handle.to_facet(&SelectorFilter::include(["mint"])).unwrap();
    assert_eq!(facet.selectors, vec![sel("mint(address,uint256)")]);

    let err = handle.to_facet(&SelectorFilter::include(["mintTo"])).unwrap_err();
    assert!(err.to_string().contains("mintTo"));
}

#[tokio::test]
async fn scenario_d_reverting_init_leaves_table_unchanged() {
    let ledger = scenario_ledger();
    ledger.revert_initializer(addr(NEW_A), "already initialized");
    let applier = CutApplier::new(ledger.clone(), fast_timeouts());
    let signer = Signer::new(deployer());

    let before = ledger.routing_table(addr(DIAMOND)).unwrap();
    let batch = CutPlanner::new().plan_removal(&before, &protected());
    let init = InitPayload::new(addr(NEW_A), vec![0xe1, 0xc7, 0x39, 0x2a]).unwrap();

    let err = applier
        .apply(addr(DIAMOND), &batch, Some(&init), &signer)
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::InitReverted { ref reason, .. } if reason == "already initialized"));
    assert_eq!(ledger.routing_table(addr(DIAMOND)).unwrap(), before);
    assert!(ledger.init_calls().is_empty());
}

#[tokio::test]
async fn rejected_batch_reports_the_batch() {
    let ledger = scenario_ledger();
    let applier = CutApplier::new(ledger.clone(), fast_timeouts());
    let signer = Signer::new(deployer());
    let before = ledger.routing_table(addr(DIAMOND)).unwrap();

    // Second cut tries to add a selector OldB still serves
    let batch: CutBatch = vec![
        Cut::remove(vec![sel("rent(uint256)")]).unwrap(),
        Cut::add(addr(NEW_A), vec![sel("withdraw()")]).unwrap(),
    ]
    .into_iter()
    .collect();

    match applier.apply(addr(DIAMOND), &batch, None, &signer).await {
        Err(UpgradeError::CutRejected { batch: rejected, reason, .. }) => {
            assert_eq!(*rejected, batch);
            assert!(reason.contains("cut #1"));
        }
        other => panic!("expected CutRejected, got {other:?}"),
    }
    assert_eq!(ledger.routing_table(addr(DIAMOND)).unwrap(), before);
}

#[tokio::test]
async fn applied_batch_carries_zero_init_sentinel() {
    let ledger = scenario_ledger();
    let applier = CutApplier::new(ledger.clone(), fast_timeouts());
    let batch = CutPlanner::new().plan_removal(&scenario_table(), &protected());
    applier
        .apply(addr(DIAMOND), &batch, None, &Signer::new(deployer()))
        .await
        .unwrap();

    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    match &submitted[0].kind {
        TransactionKind::DiamondCut {
            init_target,
            init_calldata,
            ..
        } => {
            assert_eq!(*init_target, Address::ZERO);
            assert!(init_calldata.is_empty());
        }
        other => panic!("unexpected transaction {other:?}"),
    }
}

#[tokio::test]
async fn routing_table_reads_are_idempotent() {
    let ledger = scenario_ledger();
    let reader = RoutingTableReader::new(ledger.clone());
    let first = reader.read(addr(DIAMOND)).await.unwrap();
    let second = reader.read(addr(DIAMOND)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(ledger.table_reads(), 2);
}

#[tokio::test]
async fn unconfirmed_transaction_times_out() {
    let ledger = Arc::new(
        SimulatedLedger::new()
            .with_finality_polls(u32::MAX)
            .with_diamond(addr(DIAMOND), scenario_table()),
    );
    let timeouts = Timeouts {
        confirmation_secs: 0,
        poll_interval_ms: 1,
    };
    let applier = CutApplier::new(ledger, timeouts);
    let batch = CutPlanner::new().plan_removal(&scenario_table(), &protected());

    let err = applier
        .apply(addr(DIAMOND), &batch, None, &Signer::new(deployer()))
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::Timeout { .. }));
}

#[tokio::test]
async fn concurrent_submissions_get_consecutive_nonces() {
    let ledger = Arc::new(SimulatedLedger::new());
    let signer = Signer::new(deployer());

    let tasks: Vec<_> = (0u8..8)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let signer = signer.clone();
            tokio::spawn(async move {
                signer
                    .submit(ledger.as_ref(), TransactionKind::Deploy { bytecode: vec![0x60, i] })
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let nonces: Vec<u64> = ledger.submitted().iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, (0..8).collect::<Vec<_>>());
    assert_eq!(ledger.transaction_count(deployer()).await.unwrap(), 8);
}

#[tokio::test]
async fn failed_submission_does_not_burn_a_nonce() {
    let ledger = Arc::new(SimulatedLedger::new());
    let signer = Signer::new(deployer());
    let deploy = || TransactionKind::Deploy { bytecode: vec![0x60] };

    signer.submit(ledger.as_ref(), deploy()).await.unwrap();
    ledger.set_transport_failure(true);
    assert!(matches!(
        signer.submit(ledger.as_ref(), deploy()).await,
        Err(LedgerError::Transport(_))
    ));
    ledger.set_transport_failure(false);
    signer.submit(ledger.as_ref(), deploy()).await.unwrap();

    let nonces: Vec<u64> = ledger.submitted().iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, vec![0, 1]);
}

#[tokio::test]
async fn nonce_mismatch_resyncs_from_ledger() {
    let ledger = Arc::new(SimulatedLedger::new());
    let signer = Signer::new(deployer());
    let outsider = Signer::new(deployer());
    let deploy = || TransactionKind::Deploy { bytecode: vec![0x60] };

    signer.submit(ledger.as_ref(), deploy()).await.unwrap();
    // Same account, separate sequence: takes nonce 1 behind the signer's back
    outsider.submit(ledger.as_ref(), deploy()).await.unwrap();

    assert!(matches!(
        signer.submit(ledger.as_ref(), deploy()).await,
        Err(LedgerError::NonceMismatch { expected: 2, got: 1, .. })
    ));
    signer.submit(ledger.as_ref(), deploy()).await.unwrap();

    let nonces: Vec<u64> = ledger.submitted().iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, vec![0, 1, 2]);
}
