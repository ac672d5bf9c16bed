use crate::{
    error::WalletRequestError,
    network::AddChainParams,
    reader::ChainReader,
};
use alloy::primitives::{
    Address,
    Bytes,
    TxHash,
    U256,
};

/// Fully specified EIP-1559 transaction handed to the wallet for signing and
/// broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Signing capability supplied by the wallet/identity provider.
///
/// Shaped after an EIP-1193 provider: chain switching and registration are
/// keyed by hex chain ids and failures carry the wallet's numeric code.
pub trait WalletProvider {
    type Reader: ChainReader;

    /// Read capability backed by the wallet's own endpoint.
    fn reader(&self) -> Self::Reader;

    fn switch_chain(
        &self,
        chain_id_hex: &str,
    ) -> impl Future<Output = Result<(), WalletRequestError>>;

    fn add_chain(
        &self,
        params: &AddChainParams,
    ) -> impl Future<Output = Result<(), WalletRequestError>>;

    fn address(&self) -> impl Future<Output = Result<Address, WalletRequestError>>;

    /// Signs and broadcasts. Resolves once the node accepted the transaction,
    /// not when it is mined.
    fn send_transaction(
        &self,
        transaction: &SpinTransaction,
    ) -> impl Future<Output = Result<TxHash, WalletRequestError>>;
}
