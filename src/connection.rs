use crate::{
    error::ConnectionError,
    network::NetworkConfig,
    reader::SlotMachine,
    wallet::WalletProvider,
};
use alloy::primitives::Address;
use tracing::{
    info,
    warn,
};

/// Live binding between one authenticated wallet and the target network.
pub struct ConnectionContext<W: WalletProvider> {
    network: NetworkConfig,
    address: Address,
    contract: SlotMachine<W::Reader>,
    wallet: W,
}

impl<W: WalletProvider> ConnectionContext<W> {
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract(&self) -> &SlotMachine<W::Reader> {
        &self.contract
    }

    pub fn reader(&self) -> &W::Reader {
        self.contract.reader()
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionManager {
    network: NetworkConfig,
}

impl ConnectionManager {
    pub fn new(network: NetworkConfig) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Puts `wallet` on the target chain, registering the chain first if the
    /// wallet has never seen it, and binds the contract handle.
    pub async fn connect<W: WalletProvider>(
        &self,
        wallet: W,
    ) -> Result<ConnectionContext<W>, ConnectionError> {
        let chain_id_hex = self.network.chain_id_hex();
        if let Err(err) = wallet.switch_chain(&chain_id_hex).await {
            if !err.is_unrecognized_chain() {
                return Err(ConnectionError::SwitchNetwork {
                    chain_id_hex,
                    source: err,
                });
            }
            warn!(chain = %chain_id_hex, "wallet does not know the network, registering it");
            wallet
                .add_chain(&self.network.add_chain_params())
                .await
                .map_err(|source| ConnectionError::AddNetwork {
                    chain_id_hex: chain_id_hex.clone(),
                    source,
                })?;
            wallet.switch_chain(&chain_id_hex).await.map_err(|source| {
                ConnectionError::SwitchNetwork {
                    chain_id_hex: chain_id_hex.clone(),
                    source,
                }
            })?;
        }

        let address = wallet.address().await.map_err(ConnectionError::Address)?;
        let contract = SlotMachine::new(self.network.contract_address, wallet.reader());
        info!(
            %address,
            contract = %self.network.contract_address,
            network = %self.network.name,
            "wallet connected"
        );
        Ok(ConnectionContext {
            network: self.network.clone(),
            address,
            contract,
            wallet,
        })
    }
}
