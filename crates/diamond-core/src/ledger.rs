//! Ledger collaborator boundary
//!
//! Everything the upgrade needs from the chain goes through [`Ledger`]:
//! account sequence numbers, transaction submission, receipt lookup and the
//! diamond's introspection read. Finality and consensus are the
//! implementation's concern.

use crate::error::LedgerError;
use async_trait::async_trait;
use diamond_cut::{CutBatch, InitPayload, RoutingEntry};
use diamond_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

/// Chain access used by the registry, reader and applier
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Number of transactions sent from `account` (its next nonce)
    async fn transaction_count(&self, account: Address) -> Result<u64, LedgerError>;

    /// Submit a signed transaction and return its hash
    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, LedgerError>;

    /// Receipt of a finalized transaction, `None` while pending
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, LedgerError>;

    /// Introspection read of the diamond's full routing table
    async fn facets(&self, diamond: Address) -> Result<Vec<RoutingEntry>, LedgerError>;
}

/// Transaction ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Sending account
    pub from: Address,
    /// Account sequence number
    pub nonce: u64,
    /// Payload
    pub kind: TransactionKind,
}

/// Payload of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransactionKind {
    /// Contract creation
    Deploy {
        /// Creation bytecode
        #[serde(with = "hex_bytes")]
        bytecode: Vec<u8>,
    },
    /// `diamondCut(cuts, initTarget, initCalldata)`
    #[serde(rename_all = "camelCase")]
    DiamondCut {
        /// Target diamond
        diamond: Address,
        /// Ordered cut list
        cuts: CutBatch,
        /// Initializer target, zero for none
        init_target: Address,
        /// Initializer call data, empty for none
        #[serde(with = "hex_bytes")]
        init_calldata: Vec<u8>,
    },
}

impl TransactionKind {
    /// Build a `diamondCut` payload, using the zero sentinel without initializer
    #[must_use]
    pub fn diamond_cut(diamond: Address, cuts: CutBatch, init: Option<&InitPayload>) -> Self {
        let (init_target, init_calldata) = InitPayload::wire_parts(init);
        Self::DiamondCut {
            diamond,
            cuts,
            init_target,
            init_calldata: init_calldata.to_vec(),
        }
    }

    /// Short label for logs
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deploy { .. } => "deploy",
            Self::DiamondCut { .. } => "diamondCut",
        }
    }
}

/// Finalized transaction outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block that included it
    pub block_number: u64,
    /// Execution status
    pub status: TxStatus,
    /// Created contract, for deployments
    pub contract_address: Option<Address>,
}

impl Receipt {
    /// Check if execution succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, TxStatus::Success)
    }
}

/// Execution status of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TxStatus {
    /// All effects applied
    Success,
    /// No effect applied
    Reverted {
        /// Part of the transaction that reverted
        origin: RevertOrigin,
        /// Revert reason
        reason: String,
    },
}

/// Where a revert originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevertOrigin {
    /// Cut validation inside the diamond
    Cut,
    /// Post-cut initializer call
    Initializer,
    /// Contract creation
    Deployment,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
