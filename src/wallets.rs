use crate::{
    error::WalletRequestError,
    network::AddChainParams,
    rpc::RpcReader,
    wallet::{
        SpinTransaction,
        WalletProvider,
    },
};
use alloy::{
    network::{
        EthereumWallet,
        TransactionBuilder,
    },
    primitives::{
        Address,
        TxHash,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        PoisonError,
        RwLock,
    },
};
use tracing::{
    info,
    warn,
};
use url::Url;

/// JSON-RPC "invalid params", used when a chain registration points at the
/// wrong chain.
const INVALID_PARAMS_CODE: i64 = -32602;

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

/// Keystores are plain files named after the account, as `cast wallet
/// import` writes them. Hidden files are ignored.
pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        let name = name
            .strip_suffix(".json")
            .map(str::to_owned)
            .unwrap_or(name);
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    unlock_with_password(descriptor, &password)
}

pub fn unlock_with_password(
    descriptor: &WalletDescriptor,
    password: &str,
) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        eyre!(
            "Wallet '{}' contained unsupported key material",
            descriptor.name
        )
    })
}

/// Builds the providers for an RPC URL.
type Connector = Box<dyn Fn(Url, &PrivateKeySigner) -> Endpoint + Send + Sync>;

#[derive(Clone)]
struct Endpoint {
    url: Url,
    reader: RpcReader,
    signing: DynProvider,
}

impl Endpoint {
    fn bind(url: Url, signer: &PrivateKeySigner) -> Self {
        let signing = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(url.clone())
            .erased();
        Self {
            reader: RpcReader::connect(url.clone()),
            url,
            signing,
        }
    }
}

/// Wallet backed by an unlocked local key talking to an HTTP endpoint.
///
/// There is no wallet UI to switch networks, so "switching" checks that the
/// endpoint already serves the requested chain and "adding" rebinds to the
/// registered RPC URL.
pub struct LocalWallet {
    signer: PrivateKeySigner,
    endpoint: RwLock<Endpoint>,
    connector: Connector,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner, rpc_url: Url) -> Self {
        Self::with_connector(signer, rpc_url, Box::new(Endpoint::bind))
    }

    fn with_connector(signer: PrivateKeySigner, rpc_url: Url, connector: Connector) -> Self {
        let endpoint = connector(rpc_url, &signer);
        Self {
            signer,
            endpoint: RwLock::new(endpoint),
            connector,
        }
    }

    pub fn rpc_url(&self) -> Url {
        self.current().url
    }

    fn current(&self) -> Endpoint {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl WalletProvider for LocalWallet {
    type Reader = RpcReader;

    fn reader(&self) -> RpcReader {
        self.current().reader
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), WalletRequestError> {
        let endpoint = self.current();
        let served = endpoint
            .reader
            .chain_id()
            .await
            .map_err(|err| WalletRequestError::new(None, err.to_string()))?;
        if format!("{served:#x}") == chain_id_hex {
            Ok(())
        } else {
            warn!(
                url = %endpoint.url,
                served = %format!("{served:#x}"),
                requested = chain_id_hex,
                "endpoint serves a different chain"
            );
            Err(WalletRequestError::unrecognized_chain(chain_id_hex))
        }
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletRequestError> {
        let raw = params.rpc_urls.first().ok_or_else(|| {
            WalletRequestError::new(Some(INVALID_PARAMS_CODE), "no rpc url to register")
        })?;
        let url = Url::parse(raw).map_err(|err| {
            WalletRequestError::new(Some(INVALID_PARAMS_CODE), format!("invalid rpc url {raw}: {err}"))
        })?;
        let candidate = (self.connector)(url, &self.signer);
        let served = candidate
            .reader
            .chain_id()
            .await
            .map_err(|err| WalletRequestError::new(None, err.to_string()))?;
        if format!("{served:#x}") != params.chain_id {
            return Err(WalletRequestError::new(
                Some(INVALID_PARAMS_CODE),
                format!(
                    "rpc url {raw} serves chain {served:#x}, expected {}",
                    params.chain_id
                ),
            ));
        }
        info!(url = %candidate.url, chain = %params.chain_name, "wallet rebound to network");
        *self
            .endpoint
            .write()
            .unwrap_or_else(PoisonError::into_inner) = candidate;
        Ok(())
    }

    async fn address(&self) -> Result<Address, WalletRequestError> {
        Ok(self.signer.address())
    }

    async fn send_transaction(
        &self,
        transaction: &SpinTransaction,
    ) -> Result<TxHash, WalletRequestError> {
        let request = TransactionRequest::default()
            .with_from(self.signer.address())
            .with_to(transaction.to)
            .with_input(transaction.data.clone())
            .with_value(transaction.value)
            .with_gas_limit(transaction.gas_limit)
            .with_max_fee_per_gas(transaction.max_fee_per_gas)
            .with_max_priority_fee_per_gas(transaction.max_priority_fee_per_gas);
        let pending = self.current().signing.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }
}
