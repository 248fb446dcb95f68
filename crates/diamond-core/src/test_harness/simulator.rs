//! Simulated ledger
//!
//! In-memory [`Ledger`] with diamond semantics: cut batches are validated
//! with [`RoutingTable::apply`] and committed only if every cut and the
//! initializer succeed. Receipts become visible after a configurable number
//! of polls to exercise the applier's confirmation loop.

use crate::error::LedgerError;
use crate::ledger::{Ledger, Receipt, RevertOrigin, TransactionKind, TransactionRequest, TxStatus};
use async_trait::async_trait;
use diamond_cut::{CutBatch, RoutingEntry, RoutingTable};
use diamond_primitives::{keccak256, Address, TxHash};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Initializer call that was executed by a successful `diamondCut`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitCall {
    /// Diamond that delegated the call
    pub diamond: Address,
    /// Initializer contract
    pub target: Address,
    /// Call data
    pub calldata: Vec<u8>,
}

#[derive(Debug)]
struct PendingReceipt {
    receipt: Receipt,
    polls_left: u32,
}

#[derive(Debug, Default)]
struct State {
    block_number: u64,
    nonces: HashMap<Address, u64>,
    diamonds: HashMap<Address, RoutingTable>,
    contracts: HashSet<Address>,
    receipts: HashMap<TxHash, PendingReceipt>,
    reverting_inits: HashMap<Address, String>,
    submitted: Vec<TransactionRequest>,
    init_calls: Vec<InitCall>,
    deployments: usize,
    table_reads: usize,
}

/// In-memory ledger hosting diamonds and facet contracts
#[derive(Debug, Default)]
pub struct SimulatedLedger {
    state: Mutex<State>,
    finality_polls: u32,
    fail_transport: Mutex<bool>,
}

impl SimulatedLedger {
    /// Create empty ledger; receipts are final on the first poll
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report receipts as pending for `polls` polls before finalizing
    #[must_use]
    pub fn with_finality_polls(mut self, polls: u32) -> Self {
        self.finality_polls = polls;
        self
    }

    /// Host a diamond at `address` with an initial routing table
    ///
    /// The facets of the table are registered as deployed contracts.
    #[must_use]
    pub fn with_diamond(self, address: Address, table: RoutingTable) -> Self {
        {
            let mut state = self.state.lock();
            state.contracts.insert(address);
            state.contracts.extend(table.facet_addresses());
            state.diamonds.insert(address, table);
        }
        self
    }

    /// Register a contract already deployed at `address`
    #[must_use]
    pub fn with_contract(self, address: Address) -> Self {
        self.state.lock().contracts.insert(address);
        self
    }

    /// Make every initializer call to `target` revert with `reason`
    pub fn revert_initializer(&self, target: Address, reason: impl Into<String>) {
        self.state.lock().reverting_inits.insert(target, reason.into());
    }

    /// Undo [`revert_initializer`](Self::revert_initializer)
    pub fn allow_initializer(&self, target: Address) {
        self.state.lock().reverting_inits.remove(&target);
    }

    /// Make every following call fail with a transport error
    pub fn set_transport_failure(&self, failing: bool) {
        *self.fail_transport.lock() = failing;
    }

    /// Current routing table of `diamond`
    #[must_use]
    pub fn routing_table(&self, diamond: Address) -> Option<RoutingTable> {
        self.state.lock().diamonds.get(&diamond).cloned()
    }

    /// Number of contract creations executed
    #[must_use]
    pub fn deployment_count(&self) -> usize {
        self.state.lock().deployments
    }

    /// Number of introspection reads served
    #[must_use]
    pub fn table_reads(&self) -> usize {
        self.state.lock().table_reads
    }

    /// Every accepted transaction, in submission order
    #[must_use]
    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.state.lock().submitted.clone()
    }

    /// Cut batches submitted to `diamond`, in order
    #[must_use]
    pub fn cut_batches(&self, diamond: Address) -> Vec<CutBatch> {
        self.state
            .lock()
            .submitted
            .iter()
            .filter_map(|tx| match &tx.kind {
                TransactionKind::DiamondCut { diamond: d, cuts, .. } if *d == diamond => Some(cuts.clone()),
                _ => None,
            })
            .collect()
    }

    /// Initializer calls that took effect
    #[must_use]
    pub fn init_calls(&self) -> Vec<InitCall> {
        self.state.lock().init_calls.clone()
    }

    /// Check if a contract exists at `address`
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.state.lock().contracts.contains(&address)
    }

    fn check_transport(&self) -> Result<(), LedgerError> {
        if *self.fail_transport.lock() {
            Err(LedgerError::Transport("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

impl State {
    fn execute(&mut self, request: &TransactionRequest) -> (TxStatus, Option<Address>) {
        match &request.kind {
            TransactionKind::Deploy { bytecode } => {
                if bytecode.is_empty() {
                    return (reverted(RevertOrigin::Deployment, "empty bytecode"), None);
                }
                let address = create_address(request.from, request.nonce);
                self.contracts.insert(address);
                self.deployments += 1;
                (TxStatus::Success, Some(address))
            }
            TransactionKind::DiamondCut {
                diamond,
                cuts,
                init_target,
                init_calldata,
            } => {
                let Some(table) = self.diamonds.get(diamond) else {
                    return (reverted(RevertOrigin::Cut, "call to non-diamond"), None);
                };
                let next = match table.apply(cuts) {
                    Ok(next) => next,
                    Err(e) => return (reverted(RevertOrigin::Cut, &e.to_string()), None),
                };
                for cut in cuts {
                    if !cut.facet_address().is_zero() && !self.contracts.contains(&cut.facet_address()) {
                        return (reverted(RevertOrigin::Cut, "facet has no code"), None);
                    }
                }

                if init_target.is_zero() {
                    if !init_calldata.is_empty() {
                        return (reverted(RevertOrigin::Cut, "init is zero but calldata is not empty"), None);
                    }
                } else {
                    if init_calldata.is_empty() {
                        return (reverted(RevertOrigin::Cut, "calldata is empty but init is not zero"), None);
                    }
                    if !self.contracts.contains(init_target) {
                        return (reverted(RevertOrigin::Initializer, "init address has no code"), None);
                    }
                    if let Some(reason) = self.reverting_inits.get(init_target) {
                        return (reverted(RevertOrigin::Initializer, reason), None);
                    }
                    self.init_calls.push(InitCall {
                        diamond: *diamond,
                        target: *init_target,
                        calldata: init_calldata.clone(),
                    });
                }

                self.diamonds.insert(*diamond, next);
                (TxStatus::Success, None)
            }
        }
    }
}

fn reverted(origin: RevertOrigin, reason: &str) -> TxStatus {
    TxStatus::Reverted {
        origin,
        reason: reason.to_string(),
    }
}

/// Deterministic contract address from sender and nonce
fn create_address(from: Address, nonce: u64) -> Address {
    let mut preimage = from.into_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    let hash = keccak256(&preimage);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address::new(address)
}

fn tx_hash(request: &TransactionRequest) -> TxHash {
    let mut preimage = request.from.into_bytes().to_vec();
    preimage.extend_from_slice(&request.nonce.to_be_bytes());
    TxHash::compute(&preimage)
}

#[async_trait]
impl Ledger for SimulatedLedger {
    async fn transaction_count(&self, account: Address) -> Result<u64, LedgerError> {
        self.check_transport()?;
        Ok(self.state.lock().nonces.get(&account).copied().unwrap_or(0))
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, LedgerError> {
        self.check_transport()?;
        let mut state = self.state.lock();

        let expected = state.nonces.get(&request.from).copied().unwrap_or(0);
        if request.nonce != expected {
            return Err(LedgerError::NonceMismatch {
                account: request.from,
                expected,
                got: request.nonce,
            });
        }
        if let TransactionKind::DiamondCut { diamond, .. } = &request.kind {
            if !state.diamonds.contains_key(diamond) {
                return Err(LedgerError::NotADiamond(*diamond));
            }
        }

        state.nonces.insert(request.from, expected + 1);
        state.block_number += 1;
        let hash = tx_hash(&request);
        let (status, contract_address) = state.execute(&request);
        let receipt = Receipt {
            tx_hash: hash,
            block_number: state.block_number,
            status,
            contract_address,
        };
        state.receipts.insert(
            hash,
            PendingReceipt {
                receipt,
                polls_left: self.finality_polls,
            },
        );
        state.submitted.push(request);
        Ok(hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, LedgerError> {
        self.check_transport()?;
        let mut state = self.state.lock();
        let pending = state
            .receipts
            .get_mut(&tx_hash)
            .ok_or_else(|| LedgerError::Transport(format!("unknown transaction {tx_hash}")))?;
        if pending.polls_left > 0 {
            pending.polls_left -= 1;
            return Ok(None);
        }
        Ok(Some(pending.receipt.clone()))
    }

    async fn facets(&self, diamond: Address) -> Result<Vec<RoutingEntry>, LedgerError> {
        self.check_transport()?;
        let mut state = self.state.lock();
        state.table_reads += 1;
        state
            .diamonds
            .get(&diamond)
            .map(|table| table.entries().to_vec())
            .ok_or(LedgerError::NotADiamond(diamond))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diamond_cut::Cut;
    use diamond_primitives::Selector;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    fn table() -> RoutingTable {
        RoutingTable::from_entries(vec![RoutingEntry::new(addr(1), vec![Selector::new([1, 0, 0, 0])]).unwrap()])
            .unwrap()
    }

    fn cut_request(nonce: u64, cuts: CutBatch, init_target: Address, init_calldata: Vec<u8>) -> TransactionRequest {
        TransactionRequest {
            from: addr(0xee),
            nonce,
            kind: TransactionKind::DiamondCut {
                diamond: addr(0xd1),
                cuts,
                init_target,
                init_calldata,
            },
        }
    }

    #[tokio::test]
    async fn rejects_wrong_nonce() {
        let ledger = SimulatedLedger::new().with_diamond(addr(0xd1), table());
        let err = ledger
            .send_transaction(cut_request(3, CutBatch::new(), Address::ZERO, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NonceMismatch { expected: 0, got: 3, .. }));
        assert_eq!(ledger.transaction_count(addr(0xee)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn receipt_pending_until_final() {
        let ledger = SimulatedLedger::new().with_finality_polls(2).with_diamond(addr(0xd1), table());
        let hash = ledger
            .send_transaction(cut_request(0, CutBatch::new(), Address::ZERO, vec![]))
            .await
            .unwrap();
        assert!(ledger.receipt(hash).await.unwrap().is_none());
        assert!(ledger.receipt(hash).await.unwrap().is_none());
        assert!(ledger.receipt(hash).await.unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn reverting_init_rolls_back_cuts() {
        let ledger = SimulatedLedger::new()
            .with_diamond(addr(0xd1), table())
            .with_contract(addr(0x1a));
        ledger.revert_initializer(addr(0x1a), "already initialized");

        let batch: CutBatch = std::iter::once(Cut::remove(vec![Selector::new([1, 0, 0, 0])]).unwrap()).collect();
        let hash = ledger
            .send_transaction(cut_request(0, batch, addr(0x1a), vec![0xaa]))
            .await
            .unwrap();
        let receipt = ledger.receipt(hash).await.unwrap().unwrap();

        assert_eq!(
            receipt.status,
            TxStatus::Reverted {
                origin: RevertOrigin::Initializer,
                reason: "already initialized".to_string()
            }
        );
        assert_eq!(ledger.routing_table(addr(0xd1)), Some(table()));
        assert!(ledger.init_calls().is_empty());
    }

    #[tokio::test]
    async fn deploy_creates_distinct_contracts() {
        let ledger = SimulatedLedger::new();
        let mut created = HashSet::new();
        for nonce in 0..3 {
            let hash = ledger
                .send_transaction(TransactionRequest {
                    from: addr(0xee),
                    nonce,
                    kind: TransactionKind::Deploy { bytecode: vec![0x60] },
                })
                .await
                .unwrap();
            let address = ledger.receipt(hash).await.unwrap().unwrap().contract_address.unwrap();
            assert!(ledger.has_code(address));
            created.insert(address);
        }
        assert_eq!(created.len(), 3);
        assert_eq!(ledger.deployment_count(), 3);
    }

    #[tokio::test]
    async fn unknown_diamond_read_fails() {
        let ledger = SimulatedLedger::new();
        assert_eq!(ledger.facets(addr(9)).await, Err(LedgerError::NotADiamond(addr(9))));
    }
}
