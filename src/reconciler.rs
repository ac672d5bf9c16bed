use crate::{
    confirm::ConfirmationWaiter,
    connection::{
        ConnectionContext,
        ConnectionManager,
    },
    decode::{
        SpinResult,
        decode,
    },
    error::{
        ConnectionError,
        SpinFailure,
    },
    gas::GasStrategy,
    network::NetworkConfig,
    reader::PlayerReads,
    state::{
        AttemptStatus,
        PlayerState,
        SpinAttempt,
        SpinCost,
    },
    submit::submit,
    units::format_native,
    wallet::WalletProvider,
};
use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tokio::sync::broadcast;
use tracing::{
    debug,
    error,
    info,
    warn,
};

const EVENT_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attempting,
    Committing,
    RollingBack,
}

/// Lifecycle notifications for whoever presents the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpinEvent {
    Started { cost: SpinCost },
    Submitted { tx_hash: TxHash },
    Committed(SpinResult),
    RolledBack(SpinFailure),
    Unconfirmed { tx_hash: TxHash, explorer_url: String },
    InsufficientFunds,
}

struct Ledger {
    /// Bumped whenever the wallet connection changes.
    generation: u64,
    /// Generation the in-flight or last attempt started under.
    attempt_generation: u64,
    phase: Phase,
    player: PlayerState,
    reward_pool: String,
    attempt: Option<SpinAttempt>,
    network_degraded: bool,
    unresolved: Option<TxHash>,
}

impl Ledger {
    fn attempt_is_current(&self) -> bool {
        self.attempt_generation == self.generation
    }

    fn begin_connection(&mut self) {
        self.generation += 1;
        self.player = PlayerState::default();
        self.reward_pool = format_native(U256::ZERO);
    }

    fn apply_reads(&mut self, reads: &PlayerReads) {
        self.player.apply_reads(reads);
        match &reads.reward_pool {
            Ok(pool) => self.reward_pool = format_native(*pool),
            Err(err) => warn!(error = %err, "getRewardPool read failed"),
        }
        self.network_degraded = reads.balance.is_err();
    }

    fn advance_attempt(&mut self, status: AttemptStatus) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.advance(status);
        }
    }
}

/// Drives spin attempts against one network and owns the player's view of
/// the chain.
///
/// Only one attempt runs at a time. A request made while an attempt is in
/// flight is rejected, never queued.
pub struct SpinOrchestrator<W: WalletProvider, C: ConfirmationWaiter> {
    manager: ConnectionManager,
    gas: GasStrategy,
    confirmations: C,
    connection: Mutex<Option<Arc<ConnectionContext<W>>>>,
    ledger: Mutex<Ledger>,
    events: broadcast::Sender<SpinEvent>,
}

impl<W: WalletProvider, C: ConfirmationWaiter> SpinOrchestrator<W, C> {
    pub fn new(network: NetworkConfig, confirmations: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gas: GasStrategy::new(network.gas),
            manager: ConnectionManager::new(network),
            confirmations,
            connection: Mutex::new(None),
            ledger: Mutex::new(Ledger {
                generation: 0,
                attempt_generation: 0,
                phase: Phase::Idle,
                player: PlayerState::default(),
                reward_pool: format_native(U256::ZERO),
                attempt: None,
                network_degraded: false,
                unresolved: None,
            }),
            events,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        self.manager.network()
    }

    /// Binds `wallet`, replacing any previous connection, and loads the
    /// player's on-chain state.
    pub async fn connect(&self, wallet: W) -> Result<(), ConnectionError> {
        match self.manager.connect(wallet).await {
            Ok(context) => {
                {
                    let mut ledger = self.lock_ledger();
                    *self.lock_connection() = Some(Arc::new(context));
                    ledger.begin_connection();
                    ledger.network_degraded = false;
                }
                self.refresh_state().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "could not connect wallet");
                self.lock_ledger().network_degraded = true;
                Err(err)
            }
        }
    }

    /// Drops the connection and clears the player's view. An attempt already
    /// in flight finishes on the context it started with but no longer writes
    /// player state.
    pub fn disconnect(&self) {
        let mut ledger = self.lock_ledger();
        let previous = self.lock_connection().take();
        if let Some(context) = previous {
            info!(address = %context.address(), "wallet disconnected");
        }
        ledger.begin_connection();
    }

    pub fn address(&self) -> Option<Address> {
        self.lock_connection()
            .as_ref()
            .map(|context| context.address())
    }

    /// Re-reads balance, spin counts, discount flag and reward pool. The
    /// result is dropped if an attempt started in the meantime.
    pub async fn refresh_state(&self) {
        let (context, generation) = {
            let ledger = self.lock_ledger();
            (self.current_connection(), ledger.generation)
        };
        let Some(context) = context else {
            debug!("refresh skipped, no wallet connected");
            return;
        };
        let reads = context.contract().read_player(context.address()).await;
        let mut ledger = self.lock_ledger();
        if ledger.generation != generation {
            debug!("wallet changed during refresh, discarding refreshed state");
            return;
        }
        if ledger.phase != Phase::Idle && ledger.attempt_is_current() {
            ledger.network_degraded = reads.balance.is_err();
            debug!(phase = ?ledger.phase, "spin in flight, discarding refreshed state");
            return;
        }
        ledger.apply_reads(&reads);
        if ledger.network_degraded {
            warn!("balance unavailable, network marked degraded");
        }
    }

    /// Runs one complete spin: submit, confirm, decode, then commit or roll
    /// back. `None` covers every outcome other than a decoded result.
    pub async fn request_spin(&self) -> Option<SpinResult> {
        let (context, cost) = {
            let mut ledger = self.lock_ledger();
            let Some(context) = self.current_connection() else {
                warn!("spin requested without a connected wallet");
                return None;
            };
            if ledger.phase != Phase::Idle {
                info!(phase = ?ledger.phase, "spin already in progress, request ignored");
                return None;
            }
            if ledger.network_degraded {
                warn!("network degraded, spin request ignored");
                return None;
            }
            let attempt = SpinAttempt::new(ledger.player.clone());
            let cost = attempt.cost();
            ledger.attempt = Some(attempt);
            ledger.attempt_generation = ledger.generation;
            ledger.phase = Phase::Attempting;
            (context, cost)
        };
        info!(
            cost = %cost.label(&self.network().currency.symbol),
            player = %context.address(),
            "spin started"
        );
        self.emit(SpinEvent::Started { cost });

        match self.attempt(&context, cost).await {
            Ok(result) => {
                self.commit(&context, cost, &result).await;
                Some(result)
            }
            Err(failure) => {
                self.roll_back(failure);
                None
            }
        }
    }

    async fn attempt(
        &self,
        context: &ConnectionContext<W>,
        cost: SpinCost,
    ) -> Result<SpinResult, SpinFailure> {
        self.lock_ledger().advance_attempt(AttemptStatus::Submitted);
        let bid = self.gas.compute_bid(context.reader()).await;
        let tx_hash = submit(context, &bid, cost.amount()).await?;
        if let Some(attempt) = self.lock_ledger().attempt.as_mut() {
            attempt.record_tx_hash(tx_hash);
        }
        self.emit(SpinEvent::Submitted { tx_hash });

        let receipt = self
            .confirmations
            .await_confirmation(tx_hash)
            .await
            .ok_or(SpinFailure::Unconfirmed { tx_hash })?;
        if !receipt.success {
            warn!(
                %tx_hash,
                block = ?receipt.block_number,
                "spin transaction reverted on-chain"
            );
        }
        decode(&receipt).map_err(|source| SpinFailure::Decode { tx_hash, source })
    }

    async fn commit(&self, context: &ConnectionContext<W>, cost: SpinCost, result: &SpinResult) {
        let current = {
            let mut ledger = self.lock_ledger();
            ledger.phase = Phase::Committing;
            let current = ledger.attempt_is_current();
            if current {
                ledger.player.apply_result(cost, result);
            }
            current
        };
        let reads = if current {
            Some(context.contract().read_player(context.address()).await)
        } else {
            None
        };
        {
            let mut ledger = self.lock_ledger();
            match reads {
                Some(reads) if ledger.attempt_is_current() => ledger.apply_reads(&reads),
                _ => debug!(
                    tx_hash = %result.transaction_hash,
                    "wallet changed during spin, result not applied to player state"
                ),
            }
            ledger.advance_attempt(AttemptStatus::Confirmed);
            ledger.phase = Phase::Idle;
        }
        info!(
            tx_hash = %result.transaction_hash,
            combination = %result.symbol_combination.join("|"),
            reward = %result.reward_amount,
            extra_spins = result.extra_spins_granted,
            explorer = %self.network().explorer_tx_url(&result.transaction_hash),
            "spin committed"
        );
        self.emit(SpinEvent::Committed(result.clone()));
    }

    fn roll_back(&self, failure: SpinFailure) {
        {
            let mut guard = self.lock_ledger();
            let ledger = &mut *guard;
            ledger.phase = Phase::RollingBack;
            match ledger.attempt.as_ref() {
                Some(attempt) if ledger.attempt_generation == ledger.generation => {
                    ledger.player = attempt.snapshot().clone();
                }
                _ => debug!("wallet changed during spin, snapshot not restored"),
            }
            ledger.advance_attempt(AttemptStatus::Failed);
            ledger.advance_attempt(AttemptStatus::RolledBack);
            if let SpinFailure::Unconfirmed { tx_hash } = &failure {
                ledger.unresolved = Some(*tx_hash);
            }
            ledger.phase = Phase::Idle;
        }

        match &failure {
            SpinFailure::Submission(err) => {
                error!(kind = %err.kind, error = %err.source, "spin rolled back");
            }
            SpinFailure::Unconfirmed { tx_hash } => {
                let explorer_url = self.network().explorer_tx_url(tx_hash);
                error!(
                    %tx_hash,
                    explorer = %explorer_url,
                    "no receipt observed, spin rolled back; transaction may still land"
                );
                self.emit(SpinEvent::Unconfirmed {
                    tx_hash: *tx_hash,
                    explorer_url,
                });
            }
            SpinFailure::Decode { tx_hash, source } => {
                error!(
                    %tx_hash,
                    error = %source,
                    explorer = %self.network().explorer_tx_url(tx_hash),
                    "confirmed spin could not be decoded, rolled back"
                );
            }
        }
        if failure.is_insufficient_funds() {
            self.emit(SpinEvent::InsufficientFunds);
        }
        self.emit(SpinEvent::RolledBack(failure));
    }

    pub fn player_state(&self) -> PlayerState {
        self.lock_ledger().player.clone()
    }

    pub fn reward_pool(&self) -> String {
        self.lock_ledger().reward_pool.clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock_ledger().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn network_degraded(&self) -> bool {
        self.lock_ledger().network_degraded
    }

    pub fn spin_cost(&self) -> SpinCost {
        self.lock_ledger().player.spin_cost()
    }

    pub fn last_attempt(&self) -> Option<SpinAttempt> {
        self.lock_ledger().attempt.clone()
    }

    /// Hash of the most recent broadcast whose receipt never arrived.
    pub fn unresolved_transaction(&self) -> Option<TxHash> {
        self.lock_ledger().unresolved
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpinEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SpinEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn current_connection(&self) -> Option<Arc<ConnectionContext<W>>> {
        self.lock_connection().clone()
    }

    fn lock_connection(&self) -> MutexGuard<'_, Option<Arc<ConnectionContext<W>>>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
