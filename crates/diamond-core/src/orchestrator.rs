//! Upgrade orchestration
//!
//! Drives each target diamond through
//! `ResolveFacets -> PlanRemoval -> ApplyRemoval -> PlanAddition -> ApplyAddition -> Done`.
//! A stage only advances once the previous transaction finalized
//! successfully. There is no rollback: a failure after `ApplyRemoval`
//! leaves the diamond with its protected facets only, which
//! [`UpgradeMode::AdditionOnly`] repairs.
//!
//! Diamonds are processed one after another. A failing diamond does not
//! stop the run unless `continue_on_error` is off.

use crate::applier::CutApplier;
use crate::artifacts::ContractArtifacts;
use crate::config::{TargetDiamond, UpgradeConfig, UpgradeMode};
use crate::error::UpgradeError;
use crate::ledger::Ledger;
use crate::reader::RoutingTableReader;
use crate::registry::{FacetHandle, FacetRegistry};
use crate::signer::Signer;
use diamond_cut::validation::{ensure_disjoint, ensure_unrouted, unprotected_facets};
use diamond_cut::{CutAction, CutBatch, CutPlanner, DiffPlanner, Facet, InitPayload, ProtectedSet};
use diamond_primitives::{Address, TxHash};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Per-diamond upgrade stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStage {
    /// Facets and initializer are being resolved
    ResolveFacets,
    /// Routing table read, removal batch being planned
    PlanRemoval,
    /// Removal transaction submitted
    ApplyRemoval,
    /// Table re-read, addition batch being planned
    PlanAddition,
    /// Addition transaction submitted
    ApplyAddition,
    /// Upgrade finished
    Done,
}

impl UpgradeStage {
    /// Check if no further transition exists
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Stages reachable from `from`
///
/// `PlanRemoval -> PlanAddition` is taken when nothing is left to remove;
/// `ResolveFacets -> PlanAddition` by the single-batch modes;
/// `PlanAddition -> Done` when a diff finds the table already up to date.
#[must_use]
pub fn allowed_transitions(from: UpgradeStage) -> Vec<UpgradeStage> {
    use UpgradeStage::*;
    match from {
        ResolveFacets => vec![PlanRemoval, PlanAddition],
        PlanRemoval => vec![ApplyRemoval, PlanAddition],
        ApplyRemoval => vec![PlanAddition],
        PlanAddition => vec![ApplyAddition, Done],
        ApplyAddition => vec![Done],
        Done => vec![],
    }
}

/// Validate a stage transition
///
/// # Errors
/// Returns [`UpgradeError::InvalidTransition`] if `to` is not reachable
/// from `from`
pub fn validate_transition(from: UpgradeStage, to: UpgradeStage) -> Result<(), UpgradeError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(UpgradeError::InvalidTransition { from, to })
    }
}

/// Progress and result of one diamond
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiamondOutcome {
    /// Diamond address
    pub diamond: Address,
    /// Display name
    pub label: String,
    /// Last stage reached
    pub stage: UpgradeStage,
    /// Removal transaction, if one was sent
    pub removal_tx: Option<TxHash>,
    /// Addition (or diff) transaction, if one was sent
    pub addition_tx: Option<TxHash>,
    /// Selectors unrouted
    pub removed_selectors: usize,
    /// Selectors rebound to another facet
    pub replaced_selectors: usize,
    /// Selectors newly routed
    pub added_selectors: usize,
}

impl DiamondOutcome {
    fn start(target: &TargetDiamond) -> Self {
        Self {
            diamond: target.address,
            label: target.display_name(),
            stage: UpgradeStage::ResolveFacets,
            removal_tx: None,
            addition_tx: None,
            removed_selectors: 0,
            replaced_selectors: 0,
            added_selectors: 0,
        }
    }

    fn advance(&mut self, to: UpgradeStage) -> Result<(), UpgradeError> {
        validate_transition(self.stage, to)?;
        tracing::debug!("stage {:?} -> {:?}", self.stage, to);
        self.stage = to;
        Ok(())
    }

    fn count(&mut self, batch: &CutBatch) {
        for cut in batch {
            let n = cut.selectors().len();
            match cut.action() {
                CutAction::Add => self.added_selectors += n,
                CutAction::Replace => self.replaced_selectors += n,
                CutAction::Remove => self.removed_selectors += n,
            }
        }
    }
}

/// Report entry for one diamond
#[derive(Debug, Clone, Serialize)]
pub struct DiamondReport {
    /// How far the diamond got
    #[serde(flatten)]
    pub outcome: DiamondOutcome,
    /// Failure, if the diamond did not reach `Done`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiamondReport {
    /// Check if the diamond was upgraded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full run
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeReport {
    /// Processed diamonds, in order
    pub diamonds: Vec<DiamondReport>,
    /// Diamonds not attempted after a failure with `continue_on_error` off
    pub skipped: Vec<Address>,
}

impl UpgradeReport {
    /// Number of upgraded diamonds
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.diamonds.iter().filter(|d| d.is_success()).count()
    }

    /// Number of failed diamonds
    #[must_use]
    pub fn failed(&self) -> usize {
        self.diamonds.len() - self.succeeded()
    }

    /// Check if every target was upgraded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped.is_empty()
    }
}

/// Facets and initializer a run routes into every target
#[derive(Debug, Clone)]
pub struct ResolvedFacets {
    /// Desired facets with their filtered selectors
    pub facets: Vec<Facet>,
    initializer: Option<FacetHandle>,
}

impl ResolvedFacets {
    /// Initializer contract, if one is configured
    #[inline]
    #[must_use]
    pub fn initializer(&self) -> Option<&FacetHandle> {
        self.initializer.as_ref()
    }
}

/// Runs the upgrade of every configured target diamond
pub struct UpgradeOrchestrator {
    config: UpgradeConfig,
    protected: ProtectedSet,
    signer: Signer,
    registry: FacetRegistry,
    reader: RoutingTableReader,
    applier: CutApplier,
    planner: CutPlanner,
    differ: DiffPlanner,
}

impl std::fmt::Debug for UpgradeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeOrchestrator")
            .field("mode", &self.config.mode)
            .field("targets", &self.config.targets.len())
            .field("signer", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl UpgradeOrchestrator {
    /// Create orchestrator
    ///
    /// # Errors
    /// Returns [`UpgradeError::Config`] if the configuration is invalid
    pub fn new(
        config: UpgradeConfig,
        ledger: Arc<dyn Ledger>,
        artifacts: ContractArtifacts,
        signer: Signer,
    ) -> Result<Self, UpgradeError> {
        config.validate()?;
        Ok(Self {
            protected: config.protected_set(),
            registry: FacetRegistry::new(Arc::clone(&ledger), artifacts, config.timeouts),
            reader: RoutingTableReader::new(Arc::clone(&ledger)),
            applier: CutApplier::new(ledger, config.timeouts),
            planner: CutPlanner::new(),
            differ: DiffPlanner::new(),
            signer,
            config,
        })
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Facet registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    /// Resolve every configured facet and the initializer
    ///
    /// Facets without an address are deployed. The result is meant to be
    /// reused for every target of a run.
    ///
    /// # Errors
    /// Returns the first resolution failure
    pub async fn resolve(&self) -> Result<ResolvedFacets, UpgradeError> {
        let mut facets = Vec::with_capacity(self.config.facets.len());
        for spec in &self.config.facets {
            let handle = self.registry.resolve(spec, &self.signer).await?;
            facets.push(handle.to_facet(&spec.filter)?);
        }
        let initializer = match &self.config.initializer {
            Some(spec) => Some(self.registry.resolve(&spec.as_facet_spec(), &self.signer).await?),
            None => None,
        };
        Ok(ResolvedFacets { facets, initializer })
    }

    /// Upgrade every configured target
    ///
    /// Facets are resolved once, before the first diamond. If that fails no
    /// diamond is touched and each is reported as halted at `ResolveFacets`.
    pub async fn run(&self) -> UpgradeReport {
        let mut report = UpgradeReport::default();
        tracing::info!(
            "upgrading {} diamond(s) in {:?} mode",
            self.config.targets.len(),
            self.config.mode
        );

        let resolved = self.resolve().await.map_err(|e| {
            tracing::error!("facet resolution failed: {}", e);
            e.to_string()
        });

        let mut targets = self.config.targets.iter();
        for target in targets.by_ref() {
            let mut outcome = DiamondOutcome::start(target);
            let error = match &resolved {
                Ok(resolved) => self.drive(target, resolved, &mut outcome).await.err().map(|e| e.to_string()),
                Err(e) => Some(e.clone()),
            };
            let failed = error.is_some();
            report.diamonds.push(DiamondReport { outcome, error });
            if failed && !self.config.continue_on_error {
                break;
            }
        }
        report.skipped = targets.map(|t| t.address).collect();

        tracing::info!(
            "upgrade run finished: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped.len()
        );
        report
    }

    /// Upgrade one diamond, resolving facets for it alone
    ///
    /// # Errors
    /// Returns the first error; see the stage in [`run`](Self::run)'s report
    /// for where it halted
    pub async fn upgrade(&self, target: &TargetDiamond) -> Result<DiamondOutcome, UpgradeError> {
        let resolved = self.resolve().await?;
        self.upgrade_resolved(target, &resolved).await
    }

    /// Upgrade one diamond with facets from [`resolve`](Self::resolve)
    ///
    /// # Errors
    /// Returns the first error
    pub async fn upgrade_resolved(
        &self,
        target: &TargetDiamond,
        resolved: &ResolvedFacets,
    ) -> Result<DiamondOutcome, UpgradeError> {
        let mut outcome = DiamondOutcome::start(target);
        self.drive(target, resolved, &mut outcome).await?;
        Ok(outcome)
    }

    async fn drive(
        &self,
        target: &TargetDiamond,
        resolved: &ResolvedFacets,
        outcome: &mut DiamondOutcome,
    ) -> Result<(), UpgradeError> {
        let span = tracing::info_span!("diamond", address = %target.address, label = %outcome.label);
        let result = self.drive_stages(target, resolved, outcome).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(
                removed = outcome.removed_selectors,
                replaced = outcome.replaced_selectors,
                added = outcome.added_selectors,
                "upgrade complete"
            ),
            Err(e) => tracing::error!(stage = ?outcome.stage, "upgrade failed: {}", e),
        });
        result
    }

    async fn drive_stages(
        &self,
        target: &TargetDiamond,
        resolved: &ResolvedFacets,
        outcome: &mut DiamondOutcome,
    ) -> Result<(), UpgradeError> {
        let facets = &resolved.facets;
        let init = self.init_payload(target, resolved)?;

        match self.config.mode {
            UpgradeMode::TwoPhase => {
                outcome.advance(UpgradeStage::PlanRemoval)?;
                let table = self.reader.read(target.address).await?;
                let removal = self.planner.plan_removal(&table, &self.protected);
                // Whatever survives removal must not overlap the desired set
                ensure_disjoint(facets)?;
                ensure_unrouted(&table.apply(&removal)?, facets)?;
                if removal.is_empty() {
                    tracing::info!("nothing to remove");
                } else {
                    outcome.advance(UpgradeStage::ApplyRemoval)?;
                    let receipt = self
                        .applier
                        .apply(target.address, &removal, None, &self.signer)
                        .await?;
                    outcome.removal_tx = Some(receipt.tx_hash);
                    outcome.count(&removal);
                }
                outcome.advance(UpgradeStage::PlanAddition)?;
                self.verify_cleared(target.address, facets).await?;
                let addition = self.planner.plan_addition(facets)?;
                self.apply_addition(target.address, &addition, init.as_ref(), outcome).await
            }
            UpgradeMode::AdditionOnly => {
                outcome.advance(UpgradeStage::PlanAddition)?;
                self.verify_cleared(target.address, facets).await?;
                let addition = self.planner.plan_addition(facets)?;
                self.apply_addition(target.address, &addition, init.as_ref(), outcome).await
            }
            UpgradeMode::Diff => {
                outcome.advance(UpgradeStage::PlanAddition)?;
                let table = self.reader.read(target.address).await?;
                let batch = self.differ.plan(&table, &self.protected, facets)?;
                if batch.is_empty() && init.is_none() {
                    tracing::info!("routing table already up to date");
                    return outcome.advance(UpgradeStage::Done);
                }
                self.apply_addition(target.address, &batch, init.as_ref(), outcome).await
            }
        }
    }

    fn init_payload(&self, target: &TargetDiamond, resolved: &ResolvedFacets) -> Result<Option<InitPayload>, UpgradeError> {
        match (&self.config.initializer, &resolved.initializer) {
            (Some(spec), Some(handle)) => handle.init_payload(&spec.method, &target.init_args).map(Some),
            _ => Ok(None),
        }
    }

    /// Re-read the table and make sure no desired selector is still routed
    async fn verify_cleared(&self, diamond: Address, facets: &[Facet]) -> Result<(), UpgradeError> {
        let table = self.reader.read(diamond).await?;
        let strays = unprotected_facets(&table, &self.protected);
        if !strays.is_empty() {
            tracing::warn!("{} unprotected facet(s) still routed: {:?}", strays.len(), strays);
        }
        ensure_unrouted(&table, facets)?;
        Ok(())
    }

    async fn apply_addition(
        &self,
        diamond: Address,
        batch: &CutBatch,
        init: Option<&InitPayload>,
        outcome: &mut DiamondOutcome,
    ) -> Result<(), UpgradeError> {
        outcome.advance(UpgradeStage::ApplyAddition)?;
        let receipt = self.applier.apply(diamond, batch, init, &self.signer).await?;
        outcome.addition_tx = Some(receipt.tx_hash);
        outcome.count(batch);
        outcome.advance(UpgradeStage::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use UpgradeStage::*;

    #[test]
    fn two_phase_path_is_allowed() {
        let path = [ResolveFacets, PlanRemoval, ApplyRemoval, PlanAddition, ApplyAddition, Done];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{:?}", pair);
        }
    }

    #[test]
    fn addition_cannot_precede_removal_apply() {
        assert!(matches!(
            validate_transition(ApplyAddition, ApplyRemoval),
            Err(UpgradeError::InvalidTransition { .. })
        ));
        assert!(validate_transition(ResolveFacets, ApplyAddition).is_err());
        assert!(validate_transition(ApplyRemoval, Done).is_err());
    }

    #[test]
    fn done_is_terminal() {
        assert!(Done.is_terminal());
        assert!(allowed_transitions(Done).is_empty());
        assert!(!PlanAddition.is_terminal());
    }

    #[test]
    fn report_counts() {
        let outcome = DiamondOutcome::start(&TargetDiamond::new(Address::new([1; 20])).with_label("a"));
        let report = UpgradeReport {
            diamonds: vec![
                DiamondReport {
                    outcome: outcome.clone(),
                    error: None,
                },
                DiamondReport {
                    outcome,
                    error: Some("boom".to_string()),
                },
            ],
            skipped: vec![Address::new([2; 20])],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
    }
}
