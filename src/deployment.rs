use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Testnet,
    Local,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Testnet => "testnet",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Testnet => "Monad Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// Where a slot-machine contract was found for one environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub contract_address: String,
    pub rpc_url: String,
    pub chain_id: u64,
}

impl DeploymentRecord {
    pub fn new(contract_address: Address, rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address: contract_address.to_checksum(None),
            rpc_url: rpc_url.into(),
            chain_id,
        }
    }

    pub fn address(&self) -> Result<Address> {
        self.contract_address
            .parse()
            .wrap_err_with(|| format!("Invalid contract address {}", self.contract_address))
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    /// Store under `.deployments/` in the working directory.
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::new_in(DEPLOYMENTS_ROOT, env)
    }

    pub fn new_in(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    /// Most recently appended record whose chain id matches.
    pub fn latest_for_chain(&self, chain_id: u64) -> Result<Option<DeploymentRecord>> {
        Ok(self
            .load()?
            .into_iter()
            .rev()
            .find(|record| record.chain_id == chain_id))
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        if record.address().is_err() {
            return Err(eyre!(
                "Refusing to record invalid contract address {}",
                record.contract_address
            ));
        }
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        fs::write(&file_path, b"[]").wrap_err_with(|| {
            format!(
                "Failed to initialize deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
    }

    Ok(file_path)
}

fn read_records(path: &Path) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")
}

fn write_records(path: &Path, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path, json).wrap_err("Failed to write deployment records")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn new_in__fresh_root__creates_empty_store() {
        // given
        let root = TempDir::new("deployments").unwrap();

        // when
        let store = DeploymentStore::new_in(root.path(), DeploymentEnv::Local).unwrap();

        // then
        assert_eq!(store.path(), root.path().join("local").join("deployments.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn latest_for_chain__picks_newest_record_on_that_chain() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new_in(root.path(), DeploymentEnv::Testnet).unwrap();
        let first = Address::with_last_byte(1);
        let second = Address::with_last_byte(2);
        let other_chain = Address::with_last_byte(3);
        store
            .append(DeploymentRecord::new(first, "https://a", 10143))
            .unwrap();
        store
            .append(DeploymentRecord::new(second, "https://b", 10143))
            .unwrap();
        store
            .append(DeploymentRecord::new(other_chain, "http://c", 31337))
            .unwrap();

        // when
        let latest = store.latest_for_chain(10143).unwrap().unwrap();

        // then
        assert_eq!(latest.address().unwrap(), second);
        assert_eq!(latest.rpc_url, "https://b");
    }

    #[test]
    fn latest_for_chain__no_match__is_none() {
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new_in(root.path(), DeploymentEnv::Testnet).unwrap();
        assert_eq!(store.latest_for_chain(10143).unwrap(), None);
    }

    #[test]
    fn load__records_use_snake_case_fields() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new_in(root.path(), DeploymentEnv::Local).unwrap();
        let json = r#"[{
            "recorded_at": "2025-01-01T00:00:00+00:00",
            "contract_address": "0x000000000000000000000000000000000000005c",
            "rpc_url": "http://localhost:8545",
            "chain_id": 31337
        }]"#;
        fs::write(store.path(), json).unwrap();

        // when
        let records = store.load().unwrap();

        // then
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address().unwrap(), Address::with_last_byte(0x5c));
    }

    #[test]
    fn append__invalid_address__is_rejected() {
        // given
        let root = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::new_in(root.path(), DeploymentEnv::Local).unwrap();
        let record = DeploymentRecord {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address: "not-an-address".to_string(),
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 31337,
        };

        // when
        let result = store.append(record);

        // then
        assert!(result.is_err());
        assert!(store.load().unwrap().is_empty());
    }
}
