//! The build-artifact registry: a name-indexed store of compiled contract
//! bytecode + ABI, populated by an external compilation step.
//!
//! The registry is loaded and validated once at startup so that an unknown
//! contract name fails before any transaction is broadcast.

use std::{collections::BTreeMap, fs, path::Path};

use ethers::{abi::Abi, types::Bytes};
use serde::Deserialize;

use crate::{
    constants::{ARTIFACT_EXTENSION, DEBUG_ARTIFACT_SUFFIX},
    errors::ScriptError,
};

/// A contract factory handle: the compiled form of one named contract
#[derive(Clone, Debug)]
pub struct ContractArtifact {
    /// The contract's name, as emitted by the compiler
    pub contract_name: String,
    /// The source file the contract was compiled from
    pub source_name: String,
    /// The contract's ABI
    pub abi: Abi,
    /// The contract's creation bytecode
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// The `source.sol:Name` path hint used by explorer verification
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// The on-disk shape of a compilation artifact file
#[derive(Deserialize)]
struct RawArtifact {
    /// The contract's name
    #[serde(rename = "contractName")]
    contract_name: String,
    /// The source file the contract was compiled from
    #[serde(rename = "sourceName", default)]
    source_name: String,
    /// The contract's ABI
    abi: Abi,
    /// The contract's creation bytecode, hex-encoded
    bytecode: String,
}

/// A name-indexed store of contract artifacts
#[derive(Clone, Debug, Default)]
pub struct ArtifactRegistry {
    /// The parsed artifacts, keyed by contract name
    artifacts: BTreeMap<String, ContractArtifact>,
}

impl ArtifactRegistry {
    /// Load every artifact under the given directory, failing fast on any
    /// file that does not parse
    pub fn load(dir: &Path) -> Result<Self, ScriptError> {
        let mut registry = Self::default();
        registry.load_dir(dir)?;
        Ok(registry)
    }

    /// Resolve a contract name to its artifact.
    ///
    /// Interface-only artifacts carry no bytecode and cannot be deployed, so
    /// they are rejected here rather than at broadcast time.
    pub fn resolve(&self, name: &str) -> Result<&ContractArtifact, ScriptError> {
        let artifact = self.artifacts.get(name).ok_or_else(|| {
            ScriptError::Resolution(format!("no artifact for contract `{}`", name))
        })?;

        if artifact.bytecode.is_empty() {
            return Err(ScriptError::Resolution(format!(
                "artifact for `{}` has no bytecode",
                name
            )));
        }

        Ok(artifact)
    }

    /// The names of all loaded artifacts
    pub fn contract_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(String::as_str)
    }

    /// Recursively load artifacts from a directory
    fn load_dir(&mut self, dir: &Path) -> Result<(), ScriptError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?
                .path();

            if path.is_dir() {
                self.load_dir(&path)?;
            } else if is_artifact_file(&path) {
                self.load_file(&path)?;
            }
        }

        Ok(())
    }

    /// Parse a single artifact file into the registry
    fn load_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e))
        })?;

        let raw: RawArtifact = serde_json::from_str(&contents).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e))
        })?;

        let bytecode = hex::decode(raw.bytecode.trim_start_matches("0x")).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{}: invalid bytecode hex: {}", path.display(), e))
        })?;

        self.artifacts.insert(
            raw.contract_name.clone(),
            ContractArtifact {
                contract_name: raw.contract_name,
                source_name: raw.source_name,
                abi: raw.abi,
                bytecode: Bytes::from(bytecode),
            },
        );

        Ok(())
    }
}

/// Whether the given path names a loadable artifact file
fn is_artifact_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };

    path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION)
        && !name.ends_with(DEBUG_ARTIFACT_SUFFIX)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    /// A Hardhat-style artifact for a minimal vault contract
    const VAULT_ARTIFACT: &str = r#"{
        "contractName": "ExampleVault",
        "sourceName": "contracts/ExampleVault.sol",
        "abi": [
            {
                "type": "function",
                "name": "initialize",
                "inputs": [],
                "outputs": [],
                "stateMutability": "nonpayable"
            }
        ],
        "bytecode": "0x6080604052348015600e575f5ffd5b50607b80601a5f395ff3fe"
    }"#;

    /// An interface artifact: valid JSON, no deployable bytecode
    const INTERFACE_ARTIFACT: &str = r#"{
        "contractName": "IVault",
        "sourceName": "contracts/IVault.sol",
        "abi": [],
        "bytecode": "0x"
    }"#;

    #[test]
    fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("contracts").join("ExampleVault.sol");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("ExampleVault.json"), VAULT_ARTIFACT).unwrap();
        fs::write(
            nested.join("ExampleVault.dbg.json"),
            r#"{"not": "an artifact"}"#,
        )
        .unwrap();

        let registry = ArtifactRegistry::load(dir.path()).unwrap();
        let artifact = registry.resolve("ExampleVault").unwrap();

        assert_eq!(artifact.contract_name, "ExampleVault");
        assert_eq!(
            artifact.fully_qualified_name(),
            "contracts/ExampleVault.sol:ExampleVault"
        );
        assert!(!artifact.bytecode.is_empty());
        assert!(artifact.abi.function("initialize").is_ok());
    }

    #[test]
    fn test_unknown_name_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::load(dir.path()).unwrap();

        assert!(matches!(
            registry.resolve("NoSuchVault"),
            Err(ScriptError::Resolution(_))
        ));
    }

    #[test]
    fn test_interface_artifact_rejected_at_resolution() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("IVault.json"), INTERFACE_ARTIFACT).unwrap();

        let registry = ArtifactRegistry::load(dir.path()).unwrap();
        assert!(matches!(
            registry.resolve("IVault"),
            Err(ScriptError::Resolution(_))
        ));
    }

    #[test]
    fn test_malformed_artifact_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Broken.json"), "{").unwrap();

        assert!(matches!(
            ArtifactRegistry::load(dir.path()),
            Err(ScriptError::ArtifactParsing(_))
        ));
    }
}
