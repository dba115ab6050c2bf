//! Persisted deployment records, one JSON file per contract per network
//!
//! The records follow the layout `hardhat-deploy` writes, so the same
//! directory can be shared with other tooling: keys we do not model are
//! carried through rewrites untouched.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, B256};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    constants::{
        BEACON_RECORD_SUFFIX, IMPL_RECORD_SUFFIX, RECORD_EXTENSION, RECORD_SCHEMA_VERSION,
    },
    errors::ScriptError,
};

/// The persisted description of a deployed contract
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The schema version the record was written with
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The address of the deployed contract (the proxy, for proxied contracts)
    pub address: Address,
    /// The constructor arguments the contract was deployed with
    #[serde(default)]
    pub args: Vec<Value>,
    /// The hash of the deployment transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// The contract ABI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
    /// The current implementation behind the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// The most recent upgrade applied to the contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_upgrade: Option<LastUpgrade>,
    /// Keys written by other tooling, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The schema version assumed for records that do not carry one
fn default_schema_version() -> u32 {
    RECORD_SCHEMA_VERSION
}

impl DeploymentRecord {
    /// Create a record for a freshly deployed contract
    pub fn new(address: Address) -> Self {
        Self {
            schema_version: RECORD_SCHEMA_VERSION,
            address,
            args: Vec::new(),
            transaction_hash: None,
            abi: None,
            implementation: None,
            last_upgrade: None,
            extra: Map::new(),
        }
    }
}

/// A description of the latest upgrade applied to a contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpgrade {
    /// When the upgrade was recorded, in ISO-8601
    pub timestamp: String,
    /// The hash of the upgrade transaction
    pub transaction_hash: B256,
    /// The implementation the beacon pointed at before the upgrade
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_implementation: Option<Address>,
    /// The implementation the beacon points at after the upgrade
    pub new_implementation: Address,
}

impl LastUpgrade {
    /// Describe an upgrade that happened just now
    pub fn now(
        transaction_hash: B256,
        previous_implementation: Option<Address>,
        new_implementation: Address,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            transaction_hash,
            previous_implementation,
            new_implementation,
        }
    }
}

/// Reads and writes the deployment records of a single network
///
/// There is no in-memory cache: every read goes to disk, so a record
/// persisted earlier in the run (or by an earlier run) is always observed.
#[derive(Clone, Debug)]
pub struct DeploymentRecordStore {
    /// The directory holding this network's records
    dir: PathBuf,
}

impl DeploymentRecordStore {
    /// Create a store over the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path of the record with the given name
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    /// Read a record, returning `None` if it does not exist
    ///
    /// Unreadable or malformed records are logged and treated as absent.
    /// Use [`Self::read`] where absence leads to a chain write.
    pub fn get_or_null(&self, name: &str) -> Option<DeploymentRecord> {
        match self.read(name) {
            Ok(record) => record,
            Err(e) => {
                error!(record = name, "{e}");
                None
            }
        }
    }

    /// Read a record that must exist
    pub fn get(&self, name: &str) -> Result<DeploymentRecord, ScriptError> {
        self.read(name)?.ok_or_else(|| {
            ScriptError::RecordNotFound(format!(
                "{} ({})",
                name,
                self.record_path(name).display()
            ))
        })
    }

    /// Read a record, distinguishing absence from read failures
    pub fn read(&self, name: &str) -> Result<Option<DeploymentRecord>, ScriptError> {
        let path = self.record_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "deployment file not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(ScriptError::RecordRead(format!("{}: {e}", path.display())));
            }
        };

        let record: DeploymentRecord = serde_json::from_str(&content)
            .map_err(|e| ScriptError::RecordSchema(format!("{}: {e}", path.display())))?;
        if record.schema_version > RECORD_SCHEMA_VERSION {
            return Err(ScriptError::RecordSchema(format!(
                "{}: unsupported schema version {}",
                path.display(),
                record.schema_version
            )));
        }

        Ok(Some(record))
    }

    /// Read the record (or start from an empty one), apply `mutator`, and
    /// write the result back atomically
    ///
    /// The address of an existing proxy record is immutable; a mutator that
    /// changes it is rejected. `<Name>Impl` and `<Name>Beacon` records may
    /// move, since a stale implementation or beacon is redeployed.
    pub fn persist<F>(&self, name: &str, mutator: F) -> Result<DeploymentRecord, ScriptError>
    where
        F: FnOnce(&mut DeploymentRecord),
    {
        let existing = self.read(name)?;
        let mut record = existing
            .clone()
            .unwrap_or_else(|| DeploymentRecord::new(Address::ZERO));
        mutator(&mut record);

        if let Some(existing) = existing {
            let pinned = !name.ends_with(IMPL_RECORD_SUFFIX)
                && !name.ends_with(BEACON_RECORD_SUFFIX)
                && !existing.address.is_zero();
            if pinned && existing.address != record.address {
                return Err(ScriptError::RecordWrite(format!(
                    "refusing to move {name} from {} to {}",
                    existing.address, record.address
                )));
            }
        }
        record.schema_version = RECORD_SCHEMA_VERSION;

        self.write(name, &record)?;
        Ok(record)
    }

    /// Write a record via a temporary sibling file and a rename
    fn write(&self, name: &str, record: &DeploymentRecord) -> Result<(), ScriptError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ScriptError::RecordWrite(format!("{}: {e}", self.dir.display())))?;

        let path = self.record_path(name);
        let tmp_path = self.dir.join(format!(".{name}.{RECORD_EXTENSION}.tmp"));
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| ScriptError::RecordWrite(format!("{name}: {e}")))?;

        fs::write(&tmp_path, content)
            .map_err(|e| ScriptError::RecordWrite(format!("{}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path)
            .map_err(|e| ScriptError::RecordWrite(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "wrote deployment record");
        Ok(())
    }

    /// Record a completed beacon upgrade
    ///
    /// The `<Name>Impl` record is moved to the new implementation (and
    /// created if missing); the proxy record, if present, gets its
    /// `implementation` and `lastUpgrade` fields updated. Both writes are
    /// attempted even if the first fails.
    pub fn record_implementation_upgrade(
        &self,
        contract: &str,
        new_implementation: Address,
        transaction_hash: B256,
        previous_implementation: Option<Address>,
    ) -> Result<(), ScriptError> {
        let upgrade = LastUpgrade::now(
            transaction_hash,
            previous_implementation,
            new_implementation,
        );

        let impl_name = format!("{contract}{IMPL_RECORD_SUFFIX}");
        let impl_res = self.persist(&impl_name, |record| {
            record.address = new_implementation;
            record.transaction_hash = Some(transaction_hash);
            record.last_upgrade = Some(upgrade.clone());
        });
        match &impl_res {
            Ok(_) => info!(
                path = %self.record_path(&impl_name).display(),
                previous = ?previous_implementation,
                new = %new_implementation,
                "updated implementation record"
            ),
            Err(e) => error!(record = %impl_name, "{e}"),
        }

        let proxy_res = match self.read(contract) {
            Ok(Some(_)) => self
                .persist(contract, |record| {
                    record.implementation = Some(new_implementation);
                    record.last_upgrade = Some(upgrade.clone());
                })
                .map(|_| ()),
            Ok(None) => {
                warn!(record = contract, "no proxy record to update");
                Ok(())
            }
            Err(e) => Err(e),
        };
        match &proxy_res {
            Ok(_) => info!(path = %self.record_path(contract).display(), "updated proxy record"),
            Err(e) => error!(record = contract, "{e}"),
        }

        impl_res.and(proxy_res)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use tempfile::TempDir;

    use super::*;

    /// A proxy address used across the tests
    const PROXY: Address = address!("0x1000000000000000000000000000000000000001");
    /// An implementation address used across the tests
    const IMPL_A: Address = address!("0x2000000000000000000000000000000000000002");
    /// A second implementation address
    const IMPL_B: Address = address!("0x3000000000000000000000000000000000000003");

    fn store() -> (TempDir, DeploymentRecordStore) {
        let dir = TempDir::new().unwrap();
        // Nest one level down so directory creation is exercised
        let store = DeploymentRecordStore::new(dir.path().join("zgTestnet"));
        (dir, store)
    }

    #[test]
    fn test_absent_record() {
        let (_dir, store) = store();
        assert!(store.get_or_null("AgentNFT").is_none());
        assert!(matches!(
            store.get("AgentNFT"),
            Err(ScriptError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_persist_then_read() {
        let (_dir, store) = store();
        store
            .persist("AgentNFT", |r| {
                r.address = PROXY;
                r.implementation = Some(IMPL_A);
                r.args = vec![Value::String("0xabc".to_string())];
            })
            .unwrap();

        let record = store.get("AgentNFT").unwrap();
        assert_eq!(record.address, PROXY);
        assert_eq!(record.implementation, Some(IMPL_A));
        assert_eq!(record.args.len(), 1);
        assert_eq!(record.schema_version, RECORD_SCHEMA_VERSION);
    }

    #[test]
    fn test_reads_hardhat_deploy_layout() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let raw = r#"{
            "address": "0x1000000000000000000000000000000000000001",
            "abi": [],
            "args": ["0x2000000000000000000000000000000000000002", "0x"],
            "numDeployments": 1,
            "receipt": { "status": 1 }
        }"#;
        fs::write(store.record_path("Verifier"), raw).unwrap();

        let record = store.get("Verifier").unwrap();
        assert_eq!(record.address, PROXY);
        assert_eq!(record.schema_version, RECORD_SCHEMA_VERSION);
        assert!(record.implementation.is_none());
        assert_eq!(record.extra["numDeployments"], Value::from(1));

        // Unknown keys survive a rewrite
        store
            .persist("Verifier", |r| r.implementation = Some(IMPL_A))
            .unwrap();
        let content = fs::read_to_string(store.record_path("Verifier")).unwrap();
        let json: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["receipt"]["status"], Value::from(1));
        assert_eq!(json["numDeployments"], Value::from(1));
    }

    #[test]
    fn test_malformed_record_is_absent_but_get_fails() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.record_path("AgentMarket"), "{ not json").unwrap();

        assert!(store.get_or_null("AgentMarket").is_none());
        assert!(matches!(
            store.get("AgentMarket"),
            Err(ScriptError::RecordSchema(_))
        ));
    }

    #[test]
    fn test_future_schema_rejected() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        let raw = r#"{ "schemaVersion": 99, "address": "0x1000000000000000000000000000000000000001" }"#;
        fs::write(store.record_path("AgentNFT"), raw).unwrap();

        assert!(matches!(
            store.read("AgentNFT"),
            Err(ScriptError::RecordSchema(_))
        ));
    }

    #[test]
    fn test_proxy_address_is_pinned() {
        let (_dir, store) = store();
        store.persist("AgentNFT", |r| r.address = PROXY).unwrap();

        let res = store.persist("AgentNFT", |r| r.address = IMPL_A);
        assert!(matches!(res, Err(ScriptError::RecordWrite(_))));
        assert_eq!(store.get("AgentNFT").unwrap().address, PROXY);

        // Implementation records follow the live implementation
        store.persist("AgentNFTImpl", |r| r.address = IMPL_A).unwrap();
        store.persist("AgentNFTImpl", |r| r.address = IMPL_B).unwrap();
        assert_eq!(store.get("AgentNFTImpl").unwrap().address, IMPL_B);
    }

    #[test]
    fn test_record_implementation_upgrade() {
        let (_dir, store) = store();
        store
            .persist("AgentNFT", |r| {
                r.address = PROXY;
                r.implementation = Some(IMPL_A);
            })
            .unwrap();

        let tx = B256::repeat_byte(0xab);
        store
            .record_implementation_upgrade("AgentNFT", IMPL_B, tx, Some(IMPL_A))
            .unwrap();

        let proxy = store.get("AgentNFT").unwrap();
        assert_eq!(proxy.address, PROXY);
        assert_eq!(proxy.implementation, Some(IMPL_B));
        let upgrade = proxy.last_upgrade.unwrap();
        assert_eq!(upgrade.new_implementation, IMPL_B);
        assert_eq!(upgrade.previous_implementation, Some(IMPL_A));
        assert_eq!(upgrade.transaction_hash, tx);
        assert!(upgrade.timestamp.ends_with('Z'));

        let implementation = store.get("AgentNFTImpl").unwrap();
        assert_eq!(implementation.address, IMPL_B);
        assert_eq!(implementation.transaction_hash, Some(tx));
    }

    #[test]
    fn test_upgrade_without_proxy_record_only_writes_impl() {
        let (_dir, store) = store();
        let tx = B256::repeat_byte(0x01);
        store
            .record_implementation_upgrade("Verifier", IMPL_B, tx, None)
            .unwrap();

        assert!(store.get_or_null("Verifier").is_none());
        let implementation = store.get("VerifierImpl").unwrap();
        assert_eq!(implementation.address, IMPL_B);
        assert!(implementation
            .last_upgrade
            .unwrap()
            .previous_implementation
            .is_none());
    }
}
