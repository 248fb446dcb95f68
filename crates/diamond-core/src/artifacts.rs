//! Compiled contract artifacts
//!
//! Facets and initializers are referred to by contract name. The name maps to
//! an artifact carrying the ABI (used on attach) and the creation bytecode
//! (used on deploy), in the Hardhat artifact JSON layout:
//!
//! ```json
//! { "contractName": "RentalFacet", "abi": [ ... ], "bytecode": "0x6080..." }
//! ```

use crate::error::UpgradeError;
use diamond_primitives::abi::Interface;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// One compiled contract
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Contract name
    pub contract_name: String,
    /// Callable interface
    pub abi: Interface,
    /// Creation bytecode; empty for interfaces and abstract contracts
    #[serde(default, deserialize_with = "hex_bytecode")]
    pub bytecode: Vec<u8>,
}

impl ContractArtifact {
    /// Create artifact from parts
    #[must_use]
    pub fn new(contract_name: impl Into<String>, abi: Interface, bytecode: Vec<u8>) -> Self {
        Self {
            contract_name: contract_name.into(),
            abi,
            bytecode,
        }
    }

    /// Parse a Hardhat artifact
    ///
    /// # Errors
    /// Returns [`UpgradeError::Artifact`] if the JSON does not parse
    pub fn from_json(json: &str) -> Result<Self, UpgradeError> {
        serde_json::from_str(json).map_err(|e| UpgradeError::Artifact {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Check if the artifact can be deployed
    #[inline]
    #[must_use]
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

fn hex_bytecode<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
}

/// Name-indexed artifact collection
#[derive(Debug, Clone, Default)]
pub struct ContractArtifacts {
    by_name: IndexMap<String, Arc<ContractArtifact>>,
}

impl ContractArtifacts {
    /// Create empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact, replacing any previous one with the same name
    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.by_name
            .insert(artifact.contract_name.clone(), Arc::new(artifact));
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, artifact: ContractArtifact) -> Self {
        self.insert(artifact);
        self
    }

    /// Look up by contract name
    ///
    /// # Errors
    /// Returns [`UpgradeError::UnknownContract`] if nothing is registered
    pub fn get(&self, name: &str) -> Result<Arc<ContractArtifact>, UpgradeError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| UpgradeError::UnknownContract(name.to_string()))
    }

    /// Check if `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registered contract names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Load one artifact file
    ///
    /// # Errors
    /// Returns [`UpgradeError::Artifact`] on read or parse failure
    pub fn load_file(&mut self, path: &Path) -> Result<(), UpgradeError> {
        let artifact_error = |reason: String| UpgradeError::Artifact {
            path: path.display().to_string(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| artifact_error(e.to_string()))?;
        let artifact: ContractArtifact = serde_json::from_str(&json).map_err(|e| artifact_error(e.to_string()))?;
        tracing::debug!("loaded artifact {} from {}", artifact.contract_name, path.display());
        self.insert(artifact);
        Ok(())
    }

    /// Load every `*.json` artifact under `dir`, recursively
    ///
    /// Hardhat debug files (`*.dbg.json`) are skipped.
    ///
    /// # Errors
    /// Returns [`UpgradeError::Artifact`] on the first unreadable or
    /// unparsable file
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, UpgradeError> {
        let entries = std::fs::read_dir(dir).map_err(|e| UpgradeError::Artifact {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            if path.is_dir() {
                loaded += self.load_dir(&path)?;
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.ends_with(".json") && !name.ends_with(".dbg.json") {
                self.load_file(&path)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}

impl FromIterator<ContractArtifact> for ContractArtifacts {
    fn from_iter<I: IntoIterator<Item = ContractArtifact>>(iter: I) -> Self {
        let mut artifacts = Self::new();
        for artifact in iter {
            artifacts.insert(artifact);
        }
        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "CounterFacet",
        "sourceName": "contracts/CounterFacet.sol",
        "abi": [
            {"type": "function", "name": "increment", "inputs": [], "outputs": [], "stateMutability": "nonpayable"},
            {"type": "event", "name": "Incremented", "inputs": [], "anonymous": false}
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080"
    }"#;

    #[test]
    fn parses_hardhat_layout() {
        let artifact = ContractArtifact::from_json(ARTIFACT).unwrap();
        assert_eq!(artifact.contract_name, "CounterFacet");
        assert_eq!(artifact.abi.len(), 1);
        assert_eq!(artifact.bytecode, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
        assert!(artifact.is_deployable());
    }

    #[test]
    fn missing_bytecode_is_not_deployable() {
        let artifact = ContractArtifact::from_json(r#"{"contractName": "IFoo", "abi": []}"#).unwrap();
        assert!(!artifact.is_deployable());
    }

    #[test]
    fn unknown_name_errors() {
        let artifacts = ContractArtifacts::new();
        assert!(matches!(artifacts.get("Nope"), Err(UpgradeError::UnknownContract(name)) if name == "Nope"));
    }

    #[test]
    fn load_dir_skips_debug_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("CounterFacet.sol");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("CounterFacet.json"), ARTIFACT).unwrap();
        std::fs::write(nested.join("CounterFacet.dbg.json"), r#"{"buildInfo": "x"}"#).unwrap();

        let mut artifacts = ContractArtifacts::new();
        assert_eq!(artifacts.load_dir(dir.path()).unwrap(), 1);
        assert!(artifacts.contains("CounterFacet"));
    }

    #[test]
    fn bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ContractArtifacts::new().load_file(&path).unwrap_err();
        assert!(err.to_string().contains("Broken.json"));
    }
}
