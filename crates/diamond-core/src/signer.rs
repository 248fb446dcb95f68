//! Transaction signer with shared nonce sequencing
//!
//! Clones of a [`Signer`] share one sequence. Submission holds the sequence
//! lock until the ledger accepted the transaction, so concurrent callers get
//! consecutive nonces in submission order and a rejected submission does not
//! burn a nonce. A nonce mismatch (another sender used the account) drops
//! the sequence so the next submission re-reads the count.

use crate::error::LedgerError;
use crate::ledger::{Ledger, TransactionKind, TransactionRequest};
use diamond_primitives::{Address, TxHash};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Account that sends upgrade transactions
#[derive(Debug, Clone)]
pub struct Signer {
    address: Address,
    /// Next nonce, seeded from the ledger on first use
    next_nonce: Arc<Mutex<Option<u64>>>,
}

impl Signer {
    /// Create signer for `address`
    #[inline]
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            next_nonce: Arc::new(Mutex::new(None)),
        }
    }

    /// Sending account
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign and submit `kind` with the next nonce
    ///
    /// # Errors
    /// Returns the ledger error if the count lookup or the submission fails.
    /// The sequence is left untouched, except after
    /// [`LedgerError::NonceMismatch`] which forces a re-read.
    pub async fn submit(&self, ledger: &dyn Ledger, kind: TransactionKind) -> Result<TxHash, LedgerError> {
        let mut next = self.next_nonce.lock().await;
        let nonce = match *next {
            Some(nonce) => nonce,
            None => ledger.transaction_count(self.address).await?,
        };

        let label = kind.label();
        let sent = ledger
            .send_transaction(TransactionRequest {
                from: self.address,
                nonce,
                kind,
            })
            .await;
        let tx_hash = match sent {
            Ok(tx_hash) => tx_hash,
            Err(e @ LedgerError::NonceMismatch { .. }) => {
                tracing::warn!(signer = %self.address, nonce, "nonce out of sync, re-reading: {}", e);
                *next = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        *next = Some(nonce + 1);

        tracing::debug!(signer = %self.address, nonce, tx = %tx_hash, "submitted {}", label);
        Ok(tx_hash)
    }
}
