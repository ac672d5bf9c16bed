use crate::{
    connection::ConnectionContext,
    error::{
        SubmissionError,
        SubmissionErrorKind,
        USER_REJECTED_CODE,
        WalletRequestError,
    },
    gas::GasBid,
    reader::SlotMachine,
    wallet::{
        SpinTransaction,
        WalletProvider,
    },
};
use alloy::primitives::{
    TxHash,
    U256,
};
use tracing::{
    error,
    info,
};

const USER_REJECTED_MARKERS: [&str; 3] = ["user rejected", "user denied", "action_rejected"];
const INSUFFICIENT_FUNDS_MARKERS: [&str; 2] = ["insufficient funds", "insufficient balance"];

pub fn spin_transaction<W: WalletProvider>(
    context: &ConnectionContext<W>,
    bid: &GasBid,
    cost: U256,
) -> SpinTransaction {
    SpinTransaction {
        to: context.contract().address(),
        data: SlotMachine::<W::Reader>::spin_calldata(),
        value: cost,
        gas_limit: bid.gas_limit,
        max_fee_per_gas: bid.max_fee_per_gas,
        max_priority_fee_per_gas: bid.max_priority_fee_per_gas,
    }
}

/// Broadcasts one `spin()` call. A failure is final for this attempt; a
/// retry is a new attempt with its own nonce.
pub async fn submit<W: WalletProvider>(
    context: &ConnectionContext<W>,
    bid: &GasBid,
    cost: U256,
) -> Result<TxHash, SubmissionError> {
    let transaction = spin_transaction(context, bid, cost);
    match context.wallet().send_transaction(&transaction).await {
        Ok(tx_hash) => {
            info!(%tx_hash, value = %cost, "spin transaction broadcast");
            Ok(tx_hash)
        }
        Err(source) => {
            let kind = classify(&source);
            if source.message.to_ascii_lowercase().contains("execution reverted") {
                error!(error = %source, "spin call reverted during submission");
            } else {
                error!(%kind, error = %source, "spin submission failed");
            }
            Err(SubmissionError { kind, source })
        }
    }
}

pub fn classify(err: &WalletRequestError) -> SubmissionErrorKind {
    let message = err.message.to_ascii_lowercase();
    if err.code == Some(USER_REJECTED_CODE)
        || USER_REJECTED_MARKERS.iter().any(|m| message.contains(m))
    {
        SubmissionErrorKind::UserRejected
    } else if INSUFFICIENT_FUNDS_MARKERS.iter().any(|m| message.contains(m)) {
        SubmissionErrorKind::InsufficientFunds
    } else {
        SubmissionErrorKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        abi::ISlotMachine,
        connection::ConnectionManager,
        test_helpers::{
            FakeChain,
            FakeWallet,
            mon,
            test_network,
            test_player,
        },
        units::GWEI,
    };
    use alloy::sol_types::SolCall;

    fn bid() -> GasBid {
        GasBid {
            gas_limit: 200_000,
            max_fee_per_gas: 160 * GWEI,
            max_priority_fee_per_gas: 30 * GWEI,
        }
    }

    #[test]
    fn classify__code_4001__is_user_rejected() {
        let err = WalletRequestError::new(Some(4001), "Request rejected");
        assert_eq!(classify(&err), SubmissionErrorKind::UserRejected);
    }

    #[test]
    fn classify__rejection_message_without_code__is_user_rejected() {
        let err = WalletRequestError::new(None, "User denied transaction signature");
        assert_eq!(classify(&err), SubmissionErrorKind::UserRejected);
    }

    #[test]
    fn classify__node_reports_insufficient_funds__is_insufficient_funds() {
        let err = WalletRequestError::new(
            Some(-32000),
            "Insufficient funds for gas * price + value",
        );
        assert_eq!(classify(&err), SubmissionErrorKind::InsufficientFunds);

        let err = WalletRequestError::new(Some(-32003), "insufficient balance for transfer");
        assert_eq!(classify(&err), SubmissionErrorKind::InsufficientFunds);
    }

    #[test]
    fn classify__other_failures__are_unknown() {
        let err = WalletRequestError::new(Some(-32000), "nonce too low");
        assert_eq!(classify(&err), SubmissionErrorKind::Unknown);

        let err = WalletRequestError::new(Some(3), "execution reverted");
        assert_eq!(classify(&err), SubmissionErrorKind::Unknown);
    }

    #[tokio::test]
    async fn submit__sends_single_spin_call_with_cost_and_bid() {
        // given
        let network = test_network();
        let chain = FakeChain::new();
        chain.set_balance(test_player(), mon(1));
        let wallet = FakeWallet::new(chain.clone()).with_known_chain(network.chain_id);
        let context = ConnectionManager::new(network.clone())
            .connect(wallet.clone())
            .await
            .unwrap();
        let cost = U256::from(10_000_000_000_000_000u128);

        // when
        let tx_hash = submit(&context, &bid(), cost).await.unwrap();

        // then
        let sent = wallet.sent_transactions();
        assert_eq!(sent.len(), 1);
        let (hash, transaction) = &sent[0];
        assert_eq!(*hash, tx_hash);
        assert_eq!(transaction.to, network.contract_address);
        assert_eq!(transaction.value, cost);
        assert_eq!(transaction.data.as_ref(), ISlotMachine::spinCall::SELECTOR.as_slice());
        assert_eq!(transaction.gas_limit, 200_000);
        assert_eq!(transaction.max_fee_per_gas, 160 * GWEI);
        assert_eq!(transaction.max_priority_fee_per_gas, 30 * GWEI);
        assert_eq!(chain.balance_of(test_player()), mon(1) - cost);
    }

    #[tokio::test]
    async fn submit__wallet_rejects__returns_classified_error_without_retry() {
        // given
        let network = test_network();
        let wallet = FakeWallet::new(FakeChain::new())
            .with_known_chain(network.chain_id)
            .with_send_error(WalletRequestError::new(Some(4001), "User rejected"));
        let context = ConnectionManager::new(network)
            .connect(wallet.clone())
            .await
            .unwrap();

        // when
        let result = submit(&context, &bid(), U256::ZERO).await;

        // then
        let err = result.unwrap_err();
        assert_eq!(err.kind, SubmissionErrorKind::UserRejected);
        assert_eq!(wallet.send_attempts(), 1);
        assert!(wallet.sent_transactions().is_empty());
    }
}
