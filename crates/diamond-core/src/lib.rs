//! Diamond Core - upgrade orchestration for diamond proxies
//!
//! Components, leaf-first:
//! - [`ContractArtifacts`]: compiled contracts by name
//! - [`FacetRegistry`]: attach to or deploy facets
//! - [`RoutingTableReader`]: fresh reads of a diamond's routing table
//! - [`CutApplier`]: atomic `diamondCut` submission and confirmation
//! - [`UpgradeOrchestrator`]: the per-diamond stage machine and run report
//!
//! All chain access goes through the [`Ledger`] trait;
//! [`test_harness::SimulatedLedger`] implements it in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_core::prelude::*;
//!
//! # async fn example(ledger: std::sync::Arc<dyn Ledger>) -> Result<(), UpgradeError> {
//! let config = UpgradeConfig::load("upgrade.toml".as_ref())?;
//! let mut artifacts = ContractArtifacts::new();
//! artifacts.load_dir("artifacts/contracts".as_ref())?;
//!
//! let orchestrator = UpgradeOrchestrator::new(config, ledger, artifacts, Signer::new(deployer))?;
//! let report = orchestrator.run().await;
//! println!("{} upgraded, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod applier;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod reader;
pub mod registry;
pub mod signer;
pub mod test_harness;

// Re-exports for convenience
pub use applier::{await_receipt, CutApplier};
pub use artifacts::{ContractArtifact, ContractArtifacts};
pub use config::{FacetSpec, InitializerSpec, TargetDiamond, Timeouts, UpgradeConfig, UpgradeMode};
pub use error::{LedgerError, UpgradeError};
pub use ledger::{Ledger, Receipt, RevertOrigin, TransactionKind, TransactionRequest, TxStatus};
pub use orchestrator::{
    allowed_transitions, validate_transition, DiamondOutcome, DiamondReport, ResolvedFacets, UpgradeOrchestrator,
    UpgradeReport, UpgradeStage,
};
pub use reader::RoutingTableReader;
pub use registry::{FacetHandle, FacetRegistry};
pub use signer::Signer;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running upgrades
    pub use crate::{
        ContractArtifacts, FacetSpec, InitializerSpec, Ledger, Signer, TargetDiamond, UpgradeConfig, UpgradeError,
        UpgradeMode, UpgradeOrchestrator, UpgradeReport,
    };
    pub use diamond_cut::{CutBatch, ProtectedSet, RoutingTable};
    pub use diamond_primitives::Address;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
