//! Upgrade configuration
//!
//! Passed explicitly to the orchestrator at construction. Loaded from TOML or
//! JSON, chosen by file extension:
//!
//! ```toml
//! protected = ["0x3CcAe8D3F0f59B1A50540d7fbed9a40Fd23ab719"]
//!
//! [[facets]]
//! name = "RentalFacet"
//!
//! [[facets]]
//! name = "ERC721URIStorage"
//! address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! exclude = ["supportsInterface"]
//!
//! [initializer]
//! contract = "ERC721Init"
//!
//! [[targets]]
//! address = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
//! init_args = { domainName = "Rentals", version = "1" }
//! ```

use crate::error::UpgradeError;
use diamond_cut::ProtectedSet;
use diamond_primitives::abi::SelectorFilter;
use diamond_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Facet to route, by contract name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSpec {
    /// Contract name, key into the artifacts
    pub name: String,
    /// Attach to this deployment instead of deploying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Selector include/exclude lists
    #[serde(flatten)]
    pub filter: SelectorFilter,
}

impl FacetSpec {
    /// Facet deployed fresh, routing every function
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            filter: SelectorFilter::all(),
        }
    }

    /// Attach to an existing deployment
    #[inline]
    #[must_use]
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the selector filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: SelectorFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Contract run after the addition cuts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializerSpec {
    /// Contract name, key into the artifacts
    pub contract: String,
    /// Attach to this deployment instead of deploying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Method called with each target's `init_args`
    #[serde(default = "default_init_method")]
    pub method: String,
}

fn default_init_method() -> String {
    "init".to_string()
}

impl InitializerSpec {
    /// Initializer calling `init`
    #[must_use]
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            address: None,
            method: default_init_method(),
        }
    }

    /// Attach to an existing deployment
    #[inline]
    #[must_use]
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Call `method` instead of `init`
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// The facet-spec view used to resolve it through the registry
    #[must_use]
    pub fn as_facet_spec(&self) -> FacetSpec {
        FacetSpec {
            name: self.contract.clone(),
            address: self.address,
            filter: SelectorFilter::all(),
        }
    }
}

/// One diamond to upgrade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDiamond {
    /// Diamond address
    pub address: Address,
    /// Display name for logs and reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Initializer arguments, tokenized against the initializer method
    #[serde(default)]
    pub init_args: serde_json::Value,
}

impl TargetDiamond {
    /// Target without label or init arguments
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            label: None,
            init_args: serde_json::Value::Null,
        }
    }

    /// Set the display name
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the initializer arguments
    #[inline]
    #[must_use]
    pub fn with_init_args(mut self, args: serde_json::Value) -> Self {
        self.init_args = args;
        self
    }

    /// Label, or the checksummed address
    #[must_use]
    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.address.to_checksum())
    }
}

/// Confirmation wait settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Give up waiting for a receipt after this long
    pub confirmation_secs: u64,
    /// Delay between receipt polls
    pub poll_interval_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            confirmation_secs: 600,
            poll_interval_ms: 500,
        }
    }
}

impl Timeouts {
    /// Confirmation deadline
    #[inline]
    #[must_use]
    pub fn confirmation(&self) -> Duration {
        Duration::from_secs(self.confirmation_secs)
    }

    /// Poll delay
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// How the routing table is reconciled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeMode {
    /// Remove every unprotected facet, then add the desired set
    #[default]
    TwoPhase,
    /// One batch of `Remove`/`Replace`/`Add`
    Diff,
    /// Skip removal; recovery after an interrupted two-phase run
    AdditionOnly,
}

/// Full upgrade configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Facets the diamonds should route, in cut order
    pub facets: Vec<FacetSpec>,
    /// Facet addresses never removed
    #[serde(default)]
    pub protected: Vec<Address>,
    /// Post-addition initializer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<InitializerSpec>,
    /// Diamonds to upgrade, processed in order
    #[serde(default)]
    pub targets: Vec<TargetDiamond>,
    /// Confirmation wait settings
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Reconciliation mode
    #[serde(default)]
    pub mode: UpgradeMode,
    /// Keep going after a diamond fails
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_continue_on_error() -> bool {
    true
}

impl UpgradeConfig {
    /// Configuration routing `facets`, with defaults elsewhere
    #[must_use]
    pub fn new(facets: Vec<FacetSpec>) -> Self {
        Self {
            facets,
            protected: Vec::new(),
            initializer: None,
            targets: Vec::new(),
            timeouts: Timeouts::default(),
            mode: UpgradeMode::default(),
            continue_on_error: default_continue_on_error(),
        }
    }

    /// Add protected facet addresses
    #[must_use]
    pub fn with_protected(mut self, protected: impl IntoIterator<Item = Address>) -> Self {
        self.protected.extend(protected);
        self
    }

    /// Set the initializer
    #[must_use]
    pub fn with_initializer(mut self, initializer: InitializerSpec) -> Self {
        self.initializer = Some(initializer);
        self
    }

    /// Add a target diamond
    #[must_use]
    pub fn with_target(mut self, target: TargetDiamond) -> Self {
        self.targets.push(target);
        self
    }

    /// Set the reconciliation mode
    #[must_use]
    pub fn with_mode(mut self, mode: UpgradeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set confirmation wait settings
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Stop at the first failing diamond
    #[must_use]
    pub fn stop_on_error(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    /// Protected addresses as a set
    #[must_use]
    pub fn protected_set(&self) -> ProtectedSet {
        self.protected.iter().copied().collect()
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns [`UpgradeError::Config`] on parse failure
    pub fn from_toml_str(s: &str) -> Result<Self, UpgradeError> {
        toml::from_str(s).map_err(|e| UpgradeError::config(e.to_string()))
    }

    /// Parse JSON
    ///
    /// # Errors
    /// Returns [`UpgradeError::Config`] on parse failure
    pub fn from_json_str(s: &str) -> Result<Self, UpgradeError> {
        serde_json::from_str(s).map_err(|e| UpgradeError::config(e.to_string()))
    }

    /// Load and validate a `.toml` or `.json` file
    ///
    /// # Errors
    /// Returns [`UpgradeError::Config`] on read, parse or validation failure
    pub fn load(path: &Path) -> Result<Self, UpgradeError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| UpgradeError::config(format!("{}: {e}", path.display())))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            other => {
                return Err(UpgradeError::config(format!(
                    "{}: unsupported config format {:?}",
                    path.display(),
                    other.unwrap_or("")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants
    ///
    /// # Errors
    /// Returns [`UpgradeError::Config`] for an empty facet list, duplicate
    /// facet names, a zero protected address or a zero target address
    pub fn validate(&self) -> Result<(), UpgradeError> {
        if self.facets.is_empty() {
            return Err(UpgradeError::config("no facets configured"));
        }

        let mut names = HashSet::new();
        for facet in &self.facets {
            if !names.insert(facet.name.as_str()) {
                return Err(UpgradeError::config(format!("facet {} listed twice", facet.name)));
            }
            if facet.address.is_some_and(|a| a.is_zero()) {
                return Err(UpgradeError::config(format!("facet {} has the zero address", facet.name)));
            }
        }

        if self.protected.iter().any(Address::is_zero) {
            return Err(UpgradeError::config("protected set contains the zero address"));
        }
        if let Some(target) = self.targets.iter().find(|t| t.address.is_zero()) {
            return Err(UpgradeError::config(format!(
                "target {} has the zero address",
                target.display_name()
            )));
        }
        if self.timeouts.confirmation_secs == 0 {
            return Err(UpgradeError::config("confirmation timeout must be positive"));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(UpgradeError::config("poll interval must be positive"));
        }
        Ok(())
    }
}
