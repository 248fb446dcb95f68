//! Error types for diamond upgrades
//!
//! Covers the whole upgrade path:
//! - Selector extraction and call encoding ([`AbiError`])
//! - Cut planning and collision checks ([`CutError`])
//! - On-chain rejection of a cut batch or its initializer
//! - Ledger transport, deployment and confirmation failures
//! - Configuration and artifact loading

use crate::orchestrator::UpgradeStage;
use diamond_cut::{CutBatch, CutError};
use diamond_primitives::{AbiError, Address, TxHash};

/// Main upgrade error type
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Selector extraction or call encoding failed
    #[error("abi error: {0}")]
    Abi(#[from] AbiError),

    /// Cut construction or planning failed
    #[error("cut planning failed: {0}")]
    Cut(#[from] CutError),

    /// The diamond rejected the batch; nothing was applied
    #[error("cut batch rejected by diamond {diamond} (tx {tx_hash}): {reason}")]
    CutRejected {
        /// Target diamond
        diamond: Address,
        /// Failed transaction
        tx_hash: TxHash,
        /// Revert reason reported by the ledger
        reason: String,
        /// The batch that caused the rejection
        batch: Box<CutBatch>,
    },

    /// The initializer reverted; cuts of the same transaction were rolled back
    #[error("initializer reverted on diamond {diamond} (tx {tx_hash}): {reason}")]
    InitReverted {
        /// Target diamond
        diamond: Address,
        /// Failed transaction
        tx_hash: TxHash,
        /// Revert reason reported by the ledger
        reason: String,
    },

    /// No artifact registered under this contract name
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// Facet or initializer deployment did not produce a contract
    #[error("deployment of {contract} failed: {reason}")]
    DeploymentFailed {
        /// Contract name
        contract: String,
        /// Failure description
        reason: String,
    },

    /// Transaction was not confirmed in time
    #[error("transaction {tx_hash} not confirmed after {waited_ms}ms")]
    Timeout {
        /// Pending transaction
        tx_hash: TxHash,
        /// Time spent polling
        waited_ms: u64,
    },

    /// Ledger transport error
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Artifact file could not be read or parsed
    #[error("artifact {path}: {reason}")]
    Artifact {
        /// File the artifact was read from
        path: String,
        /// Failure description
        reason: String,
    },

    /// Orchestrator attempted a transition its state machine forbids
    #[error("invalid upgrade transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current stage
        from: UpgradeStage,
        /// Requested stage
        to: UpgradeStage,
    },
}

impl UpgradeError {
    /// Check if the failure happened before anything was submitted
    ///
    /// Planning, extraction and configuration errors leave every diamond
    /// untouched.
    #[inline]
    #[must_use]
    pub fn is_pre_submission(&self) -> bool {
        matches!(
            self,
            Self::Abi(_) | Self::Cut(_) | Self::UnknownContract(_) | Self::Config(_) | Self::Artifact { .. }
        )
    }

    /// Check if the diamond reverted the transaction
    #[inline]
    #[must_use]
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::CutRejected { .. } | Self::InitReverted { .. })
    }

    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Ledger collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Transport or node failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Nonce does not match the account's next sequence number
    #[error("nonce mismatch for {account}: expected {expected}, got {got}")]
    NonceMismatch {
        /// Sending account
        account: Address,
        /// Next valid nonce
        expected: u64,
        /// Submitted nonce
        got: u64,
    },

    /// Address has no diamond behind it
    #[error("no diamond at {0}")]
    NotADiamond(Address),

    /// Transaction was rejected before inclusion
    #[error("transaction rejected: {0}")]
    Rejected(String),
}
