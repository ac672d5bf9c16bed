use crate::{
    confirm::{
        ConfirmationWaiter,
        Receipt,
    },
    error::ReadError,
    reader::{
        ChainReader,
        FeeData,
    },
};
use alloy::{
    eips::eip1559::Eip1559Estimation,
    network::TransactionBuilder,
    primitives::{
        Address,
        Bytes,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::types::{
        TransactionReceipt,
        TransactionRequest,
    },
    transports::TransportError,
};
use futures::join;
use std::time::Duration;
use tracing::{
    debug,
    error,
    trace,
    warn,
};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Read-only JSON-RPC client over HTTP.
#[derive(Clone)]
pub struct RpcReader {
    provider: DynProvider,
}

impl RpcReader {
    pub fn connect(url: Url) -> Self {
        Self::from_provider(ProviderBuilder::new().connect_http(url).erased())
    }

    pub fn from_provider(provider: DynProvider) -> Self {
        Self { provider }
    }

    pub async fn chain_id(&self) -> Result<u64, ReadError> {
        Ok(self.provider.get_chain_id().await?)
    }
}

impl ChainReader for RpcReader {
    async fn balance(&self, address: Address) -> Result<U256, ReadError> {
        Ok(self.provider.get_balance(address).await?)
    }

    /// Mirrors what browser wallets report: the EIP-1559 estimate and the
    /// legacy gas price are fetched independently and either may be absent.
    async fn fee_data(&self) -> Result<FeeData, ReadError> {
        let (estimate, gas_price) = join!(
            self.provider.estimate_eip1559_fees(),
            self.provider.get_gas_price()
        );
        merge_fee_data(estimate, gas_price)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ReadError> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        Ok(self.provider.call(request).await?)
    }
}

fn merge_fee_data(
    estimate: Result<Eip1559Estimation, TransportError>,
    gas_price: Result<u128, TransportError>,
) -> Result<FeeData, ReadError> {
    match (estimate, gas_price) {
        (Err(err), Err(_)) => Err(err.into()),
        (estimate, gas_price) => {
            if let Err(err) = &estimate {
                debug!(error = %err, "eip-1559 fee estimate unavailable");
            }
            if let Err(err) = &gas_price {
                debug!(error = %err, "legacy gas price unavailable");
            }
            let estimate = estimate.ok();
            Ok(FeeData {
                gas_price: gas_price.ok(),
                max_fee_per_gas: estimate.as_ref().map(|e| e.max_fee_per_gas),
                max_priority_fee_per_gas: estimate.as_ref().map(|e| e.max_priority_fee_per_gas),
            })
        }
    }
}

/// Polls a dedicated endpoint for a receipt until the transaction is in a
/// block.
///
/// Gives up only after `max_consecutive_failures` transport errors in a row;
/// a receipt that is simply not there yet keeps the loop going.
#[derive(Clone)]
pub struct RpcConfirmationWaiter {
    provider: DynProvider,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl RpcConfirmationWaiter {
    pub fn connect(url: Url) -> Self {
        Self::from_provider(ProviderBuilder::new().connect_http(url).erased())
    }

    pub fn from_provider(provider: DynProvider) -> Self {
        Self {
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }
}

impl ConfirmationWaiter for RpcConfirmationWaiter {
    async fn await_confirmation(&self, tx_hash: TxHash) -> Option<Receipt> {
        let mut failures = 0u32;
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.block_number.is_some() => {
                    debug!(%tx_hash, block = ?receipt.block_number, "receipt observed");
                    return Some(to_receipt(receipt));
                }
                Ok(_) => {
                    failures = 0;
                    trace!(%tx_hash, "transaction not mined yet");
                }
                Err(err) => {
                    failures += 1;
                    warn!(%tx_hash, failures, error = %err, "receipt poll failed");
                    if failures >= self.max_consecutive_failures {
                        error!(%tx_hash, "giving up on receipt, outcome unknown");
                        return None;
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn to_receipt(receipt: TransactionReceipt) -> Receipt {
    Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: receipt.status(),
        logs: receipt
            .inner
            .logs()
            .iter()
            .map(|log| log.inner.clone())
            .collect(),
    }
}
