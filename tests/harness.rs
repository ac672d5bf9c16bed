#![allow(non_snake_case)]

use alloy::primitives::U256;
use slot_spin::{
    AttemptStatus,
    Phase,
    PlayerState,
    SpinCost,
    SpinEvent,
    SpinOrchestrator,
    error::{
        SpinFailure,
        SubmissionErrorKind,
        WalletRequestError,
    },
    test_helpers::{
        FakeChain,
        FakeConfirmations,
        FakeWallet,
        SpinOutcome,
        WalletRequest,
        mon,
        test_network,
    },
};
use tokio::sync::broadcast;

struct TestContext {
    chain: FakeChain,
    wallet: FakeWallet,
    confirmations: FakeConfirmations,
    orchestrator: SpinOrchestrator<FakeWallet, FakeConfirmations>,
}

impl TestContext {
    async fn new() -> Self {
        Self::new_with_wallet(|wallet| wallet).await
    }

    /// Funds the player with 1 MON, lets `configure` adjust the wallet and
    /// connects.
    async fn new_with_wallet(configure: impl FnOnce(FakeWallet) -> FakeWallet) -> Self {
        let network = test_network();
        let chain = FakeChain::new();
        let wallet = configure(FakeWallet::new(chain.clone()).with_known_chain(network.chain_id));
        chain.set_balance(wallet.player(), mon(1));
        chain.set_reward_pool(mon(100));
        let confirmations = FakeConfirmations::new();
        let orchestrator = SpinOrchestrator::new(network, confirmations.clone());
        orchestrator.connect(wallet.clone()).await.unwrap();
        Self {
            chain,
            wallet,
            confirmations,
            orchestrator,
        }
    }
}

fn drain(events: &mut broadcast::Receiver<SpinEvent>) -> Vec<SpinEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test]
async fn request_spin__happy_path__balance_and_hash_match_chain() {
    // given
    let ctx = TestContext::new().await;
    let mut events = ctx.orchestrator.subscribe();
    ctx.confirmations.push_outcome(&SpinOutcome {
        combination: "CHERRY|APPLE|LEMON".to_string(),
        mon_reward: U256::from(100_000_000_000_000_000u128),
        extra_spins: U256::from(2u8),
        ..SpinOutcome::default()
    });

    // when
    let result = ctx.orchestrator.request_spin().await.unwrap();

    // then
    let sent = ctx.wallet.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(result.transaction_hash, sent[0].0);
    assert_eq!(result.symbol_combination, vec!["CHERRY", "APPLE", "LEMON"]);
    assert_eq!(result.reward_amount, "0.1");
    assert_eq!(result.extra_spins_granted, 2);
    assert_eq!(
        ctx.orchestrator.player_state().native_balance,
        "0.9",
        "balance is the refreshed on-chain value"
    );
    assert_eq!(ctx.chain.balance_of(ctx.wallet.player()), mon(1) - SpinCost::Standard.amount());
    assert_eq!(ctx.orchestrator.reward_pool(), "100.1");
    assert_eq!(ctx.confirmations.awaited(), vec![result.transaction_hash]);
    assert_eq!(
        drain(&mut events),
        vec![
            SpinEvent::Started {
                cost: SpinCost::Standard
            },
            SpinEvent::Submitted {
                tx_hash: result.transaction_hash
            },
            SpinEvent::Committed(result.clone()),
        ]
    );
}

#[tokio::test]
async fn request_spin__successive_spins__price_follows_cost_tiers() {
    // given
    let ctx = TestContext::new().await;
    let player = ctx.wallet.player();
    ctx.chain.set_free_spins(player, 1);
    ctx.chain.set_discounted_spins(player, 1);
    ctx.chain.set_has_discount(player, true);
    ctx.orchestrator.refresh_state().await;
    for _ in 0..3 {
        ctx.confirmations.push_outcome(&SpinOutcome::losing());
    }

    // when
    let mut costs = Vec::new();
    for _ in 0..3 {
        costs.push(ctx.orchestrator.spin_cost());
        ctx.orchestrator.request_spin().await.unwrap();
    }

    // then
    assert_eq!(
        costs,
        vec![SpinCost::Free, SpinCost::Discounted, SpinCost::Standard]
    );
    let values: Vec<U256> = ctx
        .wallet
        .sent_transactions()
        .into_iter()
        .map(|(_, transaction)| transaction.value)
        .collect();
    assert_eq!(
        values,
        vec![
            U256::ZERO,
            U256::from(10_000_000_000_000_000u128),
            U256::from(100_000_000_000_000_000u128),
        ]
    );
    assert_eq!(ctx.orchestrator.player_state().native_balance, "0.89");
}

#[tokio::test]
async fn request_spin__user_rejected__state_identical_and_retry_is_new_attempt() {
    // given
    let ctx = TestContext::new_with_wallet(|wallet| {
        wallet.with_send_error(WalletRequestError::new(Some(4001), "User rejected the request."))
    })
    .await;
    let before = ctx.orchestrator.player_state();
    let mut events = ctx.orchestrator.subscribe();

    // when
    let rejected = ctx.orchestrator.request_spin().await;

    // then
    assert!(rejected.is_none());
    assert_eq!(ctx.orchestrator.player_state(), before);
    assert_eq!(ctx.orchestrator.phase(), Phase::Idle);
    assert!(drain(&mut events).iter().any(|event| matches!(
        event,
        SpinEvent::RolledBack(SpinFailure::Submission(err))
            if err.kind == SubmissionErrorKind::UserRejected
    )));

    // when
    ctx.confirmations.push_outcome(&SpinOutcome::losing());
    let retried = ctx.orchestrator.request_spin().await;

    // then
    assert!(retried.is_some());
    assert_eq!(ctx.wallet.send_attempts(), 2);
    assert_eq!(ctx.wallet.sent_transactions().len(), 1);
}

#[tokio::test]
async fn request_spin__balance_below_cost__signals_insufficient_funds() {
    // given
    let ctx = TestContext::new().await;
    ctx.chain
        .set_balance(ctx.wallet.player(), U256::from(5_000_000_000_000_000u128));
    ctx.orchestrator.refresh_state().await;
    let before = ctx.orchestrator.player_state();
    let mut events = ctx.orchestrator.subscribe();

    // when
    let result = ctx.orchestrator.request_spin().await;

    // then
    assert!(result.is_none());
    assert_eq!(ctx.orchestrator.player_state(), before);
    let received = drain(&mut events);
    assert!(received.contains(&SpinEvent::InsufficientFunds));
    let failure = received
        .iter()
        .find_map(|event| match event {
            SpinEvent::RolledBack(failure) => Some(failure.clone()),
            _ => None,
        })
        .unwrap();
    assert!(failure.is_insufficient_funds());
}

#[tokio::test]
async fn request_spin__reverted_receipt_without_outcome__rolls_back() {
    // given
    let ctx = TestContext::new().await;
    let before = ctx.orchestrator.player_state();
    ctx.confirmations.push_reverted();

    // when
    let result = ctx.orchestrator.request_spin().await;

    // then
    assert!(result.is_none());
    assert_eq!(ctx.orchestrator.player_state(), before);
    let attempt = ctx.orchestrator.last_attempt().unwrap();
    assert_eq!(attempt.status(), AttemptStatus::RolledBack);
    assert_eq!(attempt.snapshot(), &before);
}

#[tokio::test]
async fn request_spin__confirmation_unknown__rolls_back_and_reports_hash() {
    // given
    let ctx = TestContext::new().await;
    let before = ctx.orchestrator.player_state();
    ctx.confirmations.push_unconfirmed();

    // when
    let result = ctx.orchestrator.request_spin().await;

    // then
    assert!(result.is_none());
    assert_eq!(ctx.orchestrator.player_state(), before);
    let (tx_hash, _) = ctx.wallet.sent_transactions()[0].clone();
    assert_eq!(ctx.orchestrator.unresolved_transaction(), Some(tx_hash));
    assert_eq!(
        ctx.orchestrator.last_attempt().unwrap().tx_hash(),
        Some(tx_hash)
    );
}

#[tokio::test]
async fn request_spin__second_request_during_attempt__does_not_broadcast() {
    // given
    let ctx = TestContext::new_with_wallet(FakeWallet::with_send_gate).await;
    ctx.confirmations.push_outcome(&SpinOutcome::losing());
    ctx.confirmations.push_outcome(&SpinOutcome::losing());

    // when
    let (first, second) = tokio::join!(ctx.orchestrator.request_spin(), async {
        ctx.wallet.send_started().await;
        let second = ctx.orchestrator.request_spin().await;
        ctx.wallet.release_send();
        second
    });

    // then
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(ctx.wallet.send_attempts(), 1);
    assert_eq!(ctx.confirmations.awaited().len(), 1);
}

#[tokio::test]
async fn connect__wallet_without_chain__registers_chain_then_plays() {
    // given
    let network = test_network();
    let chain = FakeChain::new();
    let wallet = FakeWallet::new(chain.clone());
    chain.set_balance(wallet.player(), mon(2));
    let confirmations = FakeConfirmations::new();
    confirmations.push_outcome(&SpinOutcome::losing());
    let orchestrator = SpinOrchestrator::new(network.clone(), confirmations);

    // when
    orchestrator.connect(wallet.clone()).await.unwrap();
    let result = orchestrator.request_spin().await;

    // then
    assert!(result.is_some());
    assert_eq!(
        wallet.requests(),
        vec![
            WalletRequest::SwitchChain("0x279f".to_string()),
            WalletRequest::AddChain(network.add_chain_params()),
            WalletRequest::SwitchChain("0x279f".to_string()),
        ]
    );
    assert_eq!(orchestrator.player_state().native_balance, "1.9");
}

#[tokio::test]
async fn disconnect__then_spin__is_ignored() {
    // given
    let ctx = TestContext::new().await;

    // when
    ctx.orchestrator.disconnect();
    let result = ctx.orchestrator.request_spin().await;

    // then
    assert!(result.is_none());
    assert_eq!(ctx.orchestrator.player_state(), PlayerState::default());
    assert_eq!(ctx.wallet.send_attempts(), 0);
}
