//! Loading of compiled contract artifacts
//!
//! Artifacts are the JSON files Hardhat writes under
//! `build/artifacts/contracts/**/<Name>.sol/<Name>.json`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    constants::{DEBUG_ARTIFACT_SUFFIX, RECORD_EXTENSION},
    errors::ScriptError,
};

/// A compiled contract
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The name of the contract
    pub contract_name: String,
    /// The contract ABI
    #[serde(default)]
    pub abi: Value,
    /// The creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

/// Locates and parses artifacts below a root directory
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    /// The root of the artifacts tree
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store over the given root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the artifact of the given contract
    pub fn load(&self, contract_name: &str) -> Result<Artifact, ScriptError> {
        let path = find_artifact(&self.root, contract_name)?.ok_or_else(|| {
            ScriptError::ArtifactParsing(format!(
                "no artifact for {contract_name} under {}",
                self.root.display()
            ))
        })?;

        let content = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;
        let artifact: Artifact = serde_json::from_str(&content)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;

        if artifact.bytecode.is_empty() {
            return Err(ScriptError::ArtifactParsing(format!(
                "{contract_name} has no bytecode (abstract contract or interface?)"
            )));
        }

        Ok(artifact)
    }
}

/// Depth-first search for `<contract_name>.json`, skipping debug artifacts
fn find_artifact(dir: &Path, contract_name: &str) -> Result<Option<PathBuf>, ScriptError> {
    let file_name = format!("{contract_name}.{RECORD_EXTENSION}");
    let entries = fs::read_dir(dir)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", dir.display())))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?
            .path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name == file_name && !name.ends_with(DEBUG_ARTIFACT_SUFFIX) {
            return Ok(Some(path));
        }
    }

    // Visit subdirectories in a stable order so duplicates resolve deterministically
    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_artifact(&subdir, contract_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_artifact(root: &Path, source: &str, name: &str, bytecode: &str) {
        let dir = root.join("contracts").join(source).join(format!("{name}.sol"));
        fs::create_dir_all(&dir).unwrap();
        let json = format!(r#"{{ "contractName": "{name}", "abi": [], "bytecode": "{bytecode}" }}"#);
        fs::write(dir.join(format!("{name}.json")), json).unwrap();
        fs::write(dir.join(format!("{name}.dbg.json")), "{}").unwrap();
    }

    #[test]
    fn test_load_nested_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(root.path(), "verifiers", "TEEVerifier", "0x6080");

        let artifact = ArtifactStore::new(root.path()).load("TEEVerifier").unwrap();
        assert_eq!(artifact.contract_name, "TEEVerifier");
        assert_eq!(artifact.bytecode, Bytes::from(vec![0x60, 0x80]));
    }

    #[test]
    fn test_missing_artifact() {
        let root = TempDir::new().unwrap();
        write_artifact(root.path(), "verifiers", "TEEVerifier", "0x6080");

        let res = ArtifactStore::new(root.path()).load("AgentMarket");
        assert!(matches!(res, Err(ScriptError::ArtifactParsing(_))));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let root = TempDir::new().unwrap();
        write_artifact(root.path(), "interfaces", "IAgentNFT", "0x");

        let res = ArtifactStore::new(root.path()).load("IAgentNFT");
        assert!(matches!(res, Err(ScriptError::ArtifactParsing(_))));
    }
}
