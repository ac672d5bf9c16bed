use crate::gas::GasPolicy;
use alloy::primitives::{
    Address,
    TxHash,
};
use serde::Serialize;

pub const MONAD_TESTNET_CHAIN_ID: u64 = 10143;
pub const MONAD_TESTNET_RPC_URL: &str = "https://testnet-rpc.monad.xyz";
pub const MONAD_TESTNET_EXPLORER_URL: &str = "https://testnet.monadexplorer.com";
pub const LOCAL_CHAIN_ID: u64 = 31337;
pub const LOCAL_RPC_URL: &str = "http://localhost:8545";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn mon() -> Self {
        Self {
            name: "MON".to_string(),
            symbol: "MON".to_string(),
            decimals: 18,
        }
    }

    pub fn eth() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// Everything the orchestrator needs to know about the chain it plays on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_url: String,
    /// Read-only endpoint used while waiting for receipts. Kept separate from
    /// the wallet's endpoint so a lagging replica behind the wallet cannot
    /// report a mined transaction as missing.
    pub confirm_rpc_url: String,
    pub currency: NativeCurrency,
    pub explorer_url: String,
    pub contract_address: Address,
    pub gas: GasPolicy,
}

impl NetworkConfig {
    pub fn monad_testnet(contract_address: Address) -> Self {
        Self {
            chain_id: MONAD_TESTNET_CHAIN_ID,
            name: "Monad Testnet".to_string(),
            rpc_url: MONAD_TESTNET_RPC_URL.to_string(),
            confirm_rpc_url: MONAD_TESTNET_RPC_URL.to_string(),
            currency: NativeCurrency::mon(),
            explorer_url: MONAD_TESTNET_EXPLORER_URL.to_string(),
            contract_address,
            gas: GasPolicy::monad_testnet(),
        }
    }

    pub fn local(rpc_url: impl Into<String>, contract_address: Address) -> Self {
        let rpc_url = rpc_url.into();
        Self {
            chain_id: LOCAL_CHAIN_ID,
            name: "Local Anvil".to_string(),
            confirm_rpc_url: rpc_url.clone(),
            rpc_url,
            currency: NativeCurrency::eth(),
            explorer_url: "http://localhost".to_string(),
            contract_address,
            gas: GasPolicy::local(),
        }
    }

    /// Chain id as wallets expect it in switch/add requests, e.g. `0x279f`.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    pub fn explorer_tx_url(&self, tx_hash: &TxHash) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn add_chain_params(&self) -> AddChainParams {
        AddChainParams {
            chain_id: self.chain_id_hex(),
            chain_name: self.name.clone(),
            native_currency: self.currency.clone(),
            rpc_urls: vec![self.rpc_url.clone()],
            block_explorer_urls: vec![self.explorer_url.clone()],
        }
    }
}

/// Payload of a `wallet_addEthereumChain` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn chain_id_hex__monad_testnet__is_lowercase_prefixed_hex() {
        // given
        let network = NetworkConfig::monad_testnet(Address::ZERO);

        // when
        let hex = network.chain_id_hex();

        // then
        assert_eq!(hex, "0x279f");
    }

    #[test]
    fn explorer_tx_url__appends_tx_path_to_explorer_base() {
        // given
        let mut network = NetworkConfig::monad_testnet(Address::ZERO);
        network.explorer_url = "https://testnet.monadexplorer.com/".to_string();
        let tx_hash = TxHash::with_last_byte(0xab);

        // when
        let url = network.explorer_tx_url(&tx_hash);

        // then
        assert_eq!(
            url,
            format!("https://testnet.monadexplorer.com/tx/{tx_hash}")
        );
    }

    #[test]
    fn add_chain_params__serializes_with_wallet_field_names() {
        // given
        let network = NetworkConfig::monad_testnet(Address::ZERO);

        // when
        let json = serde_json::to_value(network.add_chain_params()).unwrap();

        // then
        assert_eq!(json["chainId"], "0x279f");
        assert_eq!(json["chainName"], "Monad Testnet");
        assert_eq!(json["nativeCurrency"]["symbol"], "MON");
        assert_eq!(json["nativeCurrency"]["decimals"], 18);
        assert_eq!(json["rpcUrls"][0], MONAD_TESTNET_RPC_URL);
        assert_eq!(json["blockExplorerUrls"][0], MONAD_TESTNET_EXPLORER_URL);
    }
}
