//! Facet resolution
//!
//! A facet is named by contract. Resolution either attaches to a configured
//! address (no transaction) or deploys the artifact's bytecode and waits for
//! the contract address. Every unaddressed resolve deploys anew; callers that
//! touch several diamonds resolve once and reuse the handles.

use crate::applier::await_receipt;
use crate::artifacts::{ContractArtifact, ContractArtifacts};
use crate::config::{FacetSpec, Timeouts};
use crate::error::UpgradeError;
use crate::ledger::{Ledger, TransactionKind, TxStatus};
use crate::signer::Signer;
use diamond_cut::{Facet, InitPayload};
use diamond_primitives::abi::{Interface, SelectorFilter};
use diamond_primitives::{AbiError, Address};
use std::sync::Arc;

/// Deployed (or attached) contract bound to a signer
#[derive(Debug, Clone)]
pub struct FacetHandle {
    name: String,
    address: Address,
    artifact: Arc<ContractArtifact>,
    signer: Signer,
}

impl FacetHandle {
    /// Contract name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deployed address
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Callable interface
    #[inline]
    #[must_use]
    pub fn interface(&self) -> &Interface {
        &self.artifact.abi
    }

    /// Signer the handle sends with
    #[inline]
    #[must_use]
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Facet descriptor carrying the selectors `filter` picks
    ///
    /// # Errors
    /// Returns [`AbiError::UnresolvedSignature`] if a filter entry names no
    /// function of the interface
    pub fn to_facet(&self, filter: &SelectorFilter) -> Result<Facet, AbiError> {
        let selectors = self.interface().selectors(filter)?;
        Ok(Facet::new(self.name.clone(), self.address, selectors))
    }

    /// Initializer payload calling `method` with JSON `args`
    ///
    /// # Errors
    /// Returns [`UpgradeError::Abi`] if the call cannot be encoded
    pub fn init_payload(&self, method: &str, args: &serde_json::Value) -> Result<InitPayload, UpgradeError> {
        let calldata = self.interface().encode_call_json(method, args)?;
        Ok(InitPayload::new(self.address, calldata)?)
    }
}

/// Resolves facet specs to handles, deploying when no address is given
pub struct FacetRegistry {
    ledger: Arc<dyn Ledger>,
    artifacts: ContractArtifacts,
    timeouts: Timeouts,
}

impl std::fmt::Debug for FacetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetRegistry")
            .field("artifacts", &self.artifacts.len())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl FacetRegistry {
    /// Create registry
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, artifacts: ContractArtifacts, timeouts: Timeouts) -> Self {
        Self {
            ledger,
            artifacts,
            timeouts,
        }
    }

    /// Known artifacts
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &ContractArtifacts {
        &self.artifacts
    }

    /// Resolve `spec` to a handle bound to `signer`
    ///
    /// Attaches when `spec.address` is set, deploys otherwise.
    ///
    /// # Errors
    /// - [`UpgradeError::UnknownContract`] if no artifact has that name
    /// - [`UpgradeError::DeploymentFailed`] if deployment reverted or the
    ///   artifact carries no bytecode
    /// - [`UpgradeError::Timeout`] / [`UpgradeError::Ledger`] from the ledger
    pub async fn resolve(&self, spec: &FacetSpec, signer: &Signer) -> Result<FacetHandle, UpgradeError> {
        let artifact = self.artifacts.get(&spec.name)?;
        let address = match spec.address {
            Some(address) => {
                tracing::info!("attached {} at {}", spec.name, address);
                address
            }
            None => self.deploy(&artifact, signer).await?,
        };

        Ok(FacetHandle {
            name: spec.name.clone(),
            address,
            artifact,
            signer: signer.clone(),
        })
    }

    async fn deploy(&self, artifact: &ContractArtifact, signer: &Signer) -> Result<Address, UpgradeError> {
        let failed = |reason: String| UpgradeError::DeploymentFailed {
            contract: artifact.contract_name.clone(),
            reason,
        };
        if !artifact.is_deployable() {
            return Err(failed("artifact has no bytecode".to_string()));
        }

        let kind = TransactionKind::Deploy {
            bytecode: artifact.bytecode.clone(),
        };
        let tx_hash = signer.submit(self.ledger.as_ref(), kind).await?;
        tracing::info!(tx = %tx_hash, "deploying {}", artifact.contract_name);

        let receipt = await_receipt(self.ledger.as_ref(), tx_hash, &self.timeouts).await?;
        if let TxStatus::Reverted { reason, .. } = receipt.status {
            return Err(failed(reason));
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| failed("receipt carries no contract address".to_string()))?;

        tracing::info!("deployed {} at {}", artifact.contract_name, address);
        Ok(address)
    }
}
