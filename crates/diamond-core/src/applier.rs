//! Diamond cut application
//!
//! Submits one `diamondCut` transaction per batch and suspends until the
//! ledger reports it finalized. A revert voids the whole transaction, cuts
//! and initializer alike; the applier only classifies it.

use crate::config::Timeouts;
use crate::error::UpgradeError;
use crate::ledger::{Ledger, Receipt, RevertOrigin, TransactionKind, TxStatus};
use crate::signer::Signer;
use diamond_cut::{CutBatch, InitPayload};
use diamond_primitives::{Address, TxHash};
use std::sync::Arc;
use std::time::Instant;

/// Submits cut batches and awaits their receipts
#[derive(Clone)]
pub struct CutApplier {
    ledger: Arc<dyn Ledger>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for CutApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutApplier").field("timeouts", &self.timeouts).finish_non_exhaustive()
    }
}

impl CutApplier {
    /// Create applier over `ledger`
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, timeouts: Timeouts) -> Self {
        Self { ledger, timeouts }
    }

    /// Apply `batch` to `diamond`, then run `init` in the same transaction
    ///
    /// # Errors
    /// - [`UpgradeError::CutRejected`] if the diamond refused the batch
    /// - [`UpgradeError::InitReverted`] if the initializer reverted
    /// - [`UpgradeError::Timeout`] if no receipt arrived in time
    /// - [`UpgradeError::Ledger`] on submission failure
    pub async fn apply(
        &self,
        diamond: Address,
        batch: &CutBatch,
        init: Option<&InitPayload>,
        signer: &Signer,
    ) -> Result<Receipt, UpgradeError> {
        let kind = TransactionKind::diamond_cut(diamond, batch.clone(), init);
        let tx_hash = signer.submit(self.ledger.as_ref(), kind).await?;
        tracing::info!(
            diamond = %diamond,
            cuts = batch.len(),
            selectors = batch.selector_count(),
            init = init.is_some(),
            tx = %tx_hash,
            "diamondCut submitted"
        );

        let receipt = await_receipt(self.ledger.as_ref(), tx_hash, &self.timeouts).await?;
        match &receipt.status {
            TxStatus::Success => {
                tracing::info!(diamond = %diamond, block = receipt.block_number, "diamondCut finalized");
                Ok(receipt)
            }
            TxStatus::Reverted {
                origin: RevertOrigin::Initializer,
                reason,
            } => {
                tracing::error!(diamond = %diamond, tx = %tx_hash, "initializer reverted: {}", reason);
                Err(UpgradeError::InitReverted {
                    diamond,
                    tx_hash,
                    reason: reason.clone(),
                })
            }
            TxStatus::Reverted { reason, .. } => {
                tracing::error!(diamond = %diamond, tx = %tx_hash, "cut rejected: {}", reason);
                Err(UpgradeError::CutRejected {
                    diamond,
                    tx_hash,
                    reason: reason.clone(),
                    batch: Box::new(batch.clone()),
                })
            }
        }
    }
}

/// Poll for the receipt of `tx_hash` until it is finalized or the
/// confirmation deadline passes
///
/// # Errors
/// Returns [`UpgradeError::Timeout`] past the deadline, or the ledger error
/// of a failed poll
pub async fn await_receipt(ledger: &dyn Ledger, tx_hash: TxHash, timeouts: &Timeouts) -> Result<Receipt, UpgradeError> {
    let started = Instant::now();
    let poll = async {
        loop {
            if let Some(receipt) = ledger.receipt(tx_hash).await? {
                return Ok::<_, UpgradeError>(receipt);
            }
            tokio::time::sleep(timeouts.poll_interval()).await;
        }
    };

    match tokio::time::timeout(timeouts.confirmation(), poll).await {
        Ok(result) => result,
        Err(_) => {
            let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            tracing::warn!(tx = %tx_hash, waited_ms, "gave up waiting for receipt");
            Err(UpgradeError::Timeout { tx_hash, waited_ms })
        }
    }
}
