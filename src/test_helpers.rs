use crate::{
    abi::ISlotMachine,
    confirm::{
        ConfirmationWaiter,
        Receipt,
    },
    error::{
        ReadError,
        WalletRequestError,
    },
    network::{
        AddChainParams,
        NetworkConfig,
    },
    reader::{
        ChainReader,
        FeeData,
    },
    units::GWEI,
    wallet::{
        SpinTransaction,
        WalletProvider,
    },
};
use alloy::{
    primitives::{
        Address,
        B256,
        Bytes,
        Log,
        LogData,
        TxHash,
        U256,
        keccak256,
    },
    sol_types::{
        SolCall,
        SolEvent,
        SolValue,
    },
};
use std::{
    collections::{
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::Notify;

pub fn test_player() -> Address {
    Address::with_last_byte(0x42)
}

pub fn test_contract() -> Address {
    Address::with_last_byte(0x5c)
}

pub fn test_network() -> NetworkConfig {
    NetworkConfig::monad_testnet(test_contract())
}

pub fn mon(amount: u64) -> U256 {
    U256::from(amount) * U256::from(crate::units::WEI_PER_UNIT)
}

struct ChainState {
    balances: HashMap<Address, U256>,
    free_spins: HashMap<Address, u64>,
    discounted_spins: HashMap<Address, u64>,
    has_discount: HashMap<Address, bool>,
    reward_pool: U256,
    fee_data: Result<FeeData, ReadError>,
    balance_error: Option<ReadError>,
    call_error: Option<ReadError>,
}

/// In-memory node plus slot-machine contract.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                balances: HashMap::new(),
                free_spins: HashMap::new(),
                discounted_spins: HashMap::new(),
                has_discount: HashMap::new(),
                reward_pool: U256::ZERO,
                fee_data: Ok(FeeData {
                    gas_price: Some(50 * GWEI),
                    max_fee_per_gas: Some(60 * GWEI),
                    max_priority_fee_per_gas: Some(2 * GWEI),
                }),
                balance_error: None,
                call_error: None,
            })),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_free_spins(&self, address: Address, count: u64) {
        self.state.lock().unwrap().free_spins.insert(address, count);
    }

    pub fn set_discounted_spins(&self, address: Address, count: u64) {
        self.state
            .lock()
            .unwrap()
            .discounted_spins
            .insert(address, count);
    }

    pub fn set_has_discount(&self, address: Address, flag: bool) {
        self.state.lock().unwrap().has_discount.insert(address, flag);
    }

    pub fn set_reward_pool(&self, amount: U256) {
        self.state.lock().unwrap().reward_pool = amount;
    }

    pub fn set_fee_data(&self, fee_data: Result<FeeData, ReadError>) {
        self.state.lock().unwrap().fee_data = fee_data;
    }

    /// `Some` makes every balance read fail until cleared with `None`.
    pub fn set_balance_error(&self, error: Option<ReadError>) {
        self.state.lock().unwrap().balance_error = error;
    }

    /// `Some` makes every contract read fail until cleared with `None`.
    pub fn set_call_error(&self, error: Option<ReadError>) {
        self.state.lock().unwrap().call_error = error;
    }

    /// Applies a mined `spin()`: charges the value, consumes a free or
    /// discounted spin the way the contract does and funds the pool.
    fn execute_spin(&self, player: Address, value: U256) -> Result<(), WalletRequestError> {
        let mut state = self.state.lock().unwrap();
        let balance = state.balances.get(&player).copied().unwrap_or_default();
        if balance < value {
            return Err(WalletRequestError::new(
                Some(-32000),
                "insufficient funds for gas * price + value",
            ));
        }
        state.balances.insert(player, balance - value);
        state.reward_pool += value;
        let free = state.free_spins.get(&player).copied().unwrap_or_default();
        let discounted = state
            .discounted_spins
            .get(&player)
            .copied()
            .unwrap_or_default();
        let has_discount = state.has_discount.get(&player).copied().unwrap_or_default();
        if free > 0 {
            state.free_spins.insert(player, free - 1);
        } else if has_discount && discounted > 0 {
            state.discounted_spins.insert(player, discounted - 1);
        }
        Ok(())
    }

    fn answer_call(&self, to: Address, data: &[u8]) -> Result<Bytes, ReadError> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.call_error {
            return Err(err.clone());
        }
        if to != test_contract() {
            return Ok(Bytes::new());
        }
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| ReadError::Transport("calldata too short".to_string()))?;
        let encoded = if selector == ISlotMachine::freeSpinsCall::SELECTOR {
            let call = ISlotMachine::freeSpinsCall::abi_decode(data)
                .map_err(|e| ReadError::Transport(e.to_string()))?;
            let count = state.free_spins.get(&call.player).copied().unwrap_or_default();
            U256::from(count).abi_encode()
        } else if selector == ISlotMachine::discountedSpinsCall::SELECTOR {
            let call = ISlotMachine::discountedSpinsCall::abi_decode(data)
                .map_err(|e| ReadError::Transport(e.to_string()))?;
            let count = state
                .discounted_spins
                .get(&call.player)
                .copied()
                .unwrap_or_default();
            U256::from(count).abi_encode()
        } else if selector == ISlotMachine::hasDiscountCall::SELECTOR {
            let call = ISlotMachine::hasDiscountCall::abi_decode(data)
                .map_err(|e| ReadError::Transport(e.to_string()))?;
            state
                .has_discount
                .get(&call.player)
                .copied()
                .unwrap_or_default()
                .abi_encode()
        } else if selector == ISlotMachine::getRewardPoolCall::SELECTOR {
            state.reward_pool.abi_encode()
        } else {
            return Err(ReadError::Transport("execution reverted".to_string()));
        };
        Ok(encoded.into())
    }
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainReader for FakeChain {
    async fn balance(&self, address: Address) -> Result<U256, ReadError> {
        let state = self.state.lock().unwrap();
        match &state.balance_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.balances.get(&address).copied().unwrap_or_default()),
        }
    }

    async fn fee_data(&self) -> Result<FeeData, ReadError> {
        self.state.lock().unwrap().fee_data.clone()
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ReadError> {
        self.answer_call(to, &data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletRequest {
    SwitchChain(String),
    AddChain(AddChainParams),
}

/// Pauses `send_transaction` until the test releases it.
#[derive(Default)]
pub struct SendGate {
    started: Notify,
    release: Notify,
}

struct WalletState {
    known_chains: HashSet<String>,
    switch_error: Option<WalletRequestError>,
    add_chain_error: Option<WalletRequestError>,
    send_errors: VecDeque<WalletRequestError>,
    requests: Vec<WalletRequest>,
    sent: Vec<(TxHash, SpinTransaction)>,
    send_attempts: usize,
}

/// Wallet bound to a [`FakeChain`]. Clones share state so a test can keep a
/// handle after moving one into the code under test.
#[derive(Clone)]
pub struct FakeWallet {
    chain: FakeChain,
    player: Address,
    gate: Option<Arc<SendGate>>,
    state: Arc<Mutex<WalletState>>,
}

impl FakeWallet {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            chain,
            player: test_player(),
            gate: None,
            state: Arc::new(Mutex::new(WalletState {
                known_chains: HashSet::new(),
                switch_error: None,
                add_chain_error: None,
                send_errors: VecDeque::new(),
                requests: Vec::new(),
                sent: Vec::new(),
                send_attempts: 0,
            })),
        }
    }

    pub fn with_known_chain(self, chain_id: u64) -> Self {
        self.state
            .lock()
            .unwrap()
            .known_chains
            .insert(format!("{chain_id:#x}"));
        self
    }

    pub fn with_switch_error(self, error: WalletRequestError) -> Self {
        self.state.lock().unwrap().switch_error = Some(error);
        self
    }

    pub fn with_add_chain_error(self, error: WalletRequestError) -> Self {
        self.state.lock().unwrap().add_chain_error = Some(error);
        self
    }

    /// Queues a failure for the next send. Later sends succeed again.
    pub fn with_send_error(self, error: WalletRequestError) -> Self {
        self.state.lock().unwrap().send_errors.push_back(error);
        self
    }

    pub fn with_player(mut self, player: Address) -> Self {
        self.player = player;
        self
    }

    pub fn with_send_gate(mut self) -> Self {
        self.gate = Some(Arc::new(SendGate::default()));
        self
    }

    /// Resolves once a gated send is in flight.
    pub async fn send_started(&self) {
        if let Some(gate) = &self.gate {
            gate.started.notified().await;
        }
    }

    pub fn release_send(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    pub fn player(&self) -> Address {
        self.player
    }

    pub fn chain(&self) -> &FakeChain {
        &self.chain
    }

    pub fn requests(&self) -> Vec<WalletRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Transactions the wallet accepted and broadcast.
    pub fn sent_transactions(&self) -> Vec<(TxHash, SpinTransaction)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.state.lock().unwrap().send_attempts
    }
}

impl WalletProvider for FakeWallet {
    type Reader = FakeChain;

    fn reader(&self) -> FakeChain {
        self.chain.clone()
    }

    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), WalletRequestError> {
        let mut state = self.state.lock().unwrap();
        state
            .requests
            .push(WalletRequest::SwitchChain(chain_id_hex.to_string()));
        if let Some(err) = &state.switch_error {
            return Err(err.clone());
        }
        if state.known_chains.contains(chain_id_hex) {
            Ok(())
        } else {
            Err(WalletRequestError::unrecognized_chain(chain_id_hex))
        }
    }

    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletRequestError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(WalletRequest::AddChain(params.clone()));
        if let Some(err) = &state.add_chain_error {
            return Err(err.clone());
        }
        state.known_chains.insert(params.chain_id.clone());
        Ok(())
    }

    async fn address(&self) -> Result<Address, WalletRequestError> {
        Ok(self.player)
    }

    async fn send_transaction(
        &self,
        transaction: &SpinTransaction,
    ) -> Result<TxHash, WalletRequestError> {
        let attempt = {
            let mut state = self.state.lock().unwrap();
            state.send_attempts += 1;
            state.send_attempts
        };
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if let Some(err) = self.state.lock().unwrap().send_errors.pop_front() {
            return Err(err);
        }
        self.chain.execute_spin(self.player, transaction.value)?;
        let tx_hash = fake_tx_hash(attempt);
        self.state
            .lock()
            .unwrap()
            .sent
            .push((tx_hash, transaction.clone()));
        Ok(tx_hash)
    }
}

pub fn fake_tx_hash(attempt: usize) -> TxHash {
    TxHash::from(U256::from(0xc0de_0000usize + attempt).to_be_bytes::<32>())
}

/// Field values of one `SpinResult` event.
#[derive(Clone, Debug, Default)]
pub struct SpinOutcome {
    pub combination: String,
    pub mon_reward: U256,
    pub extra_spins: U256,
    pub poppies_nft_won: bool,
    pub rarest_pending: bool,
    pub discount_applied: bool,
    pub new_discount_granted: bool,
}

impl SpinOutcome {
    pub fn losing() -> Self {
        Self {
            combination: "CHERRY|APPLE|LEMON".to_string(),
            ..Self::default()
        }
    }
}

pub fn spin_outcome_log(outcome: &SpinOutcome) -> Log {
    let event = ISlotMachine::SpinResult {
        player: test_player(),
        combination: outcome.combination.clone(),
        monReward: outcome.mon_reward,
        extraSpins: outcome.extra_spins,
        poppiesNftWon: outcome.poppies_nft_won,
        rarestPending: outcome.rarest_pending,
        discountApplied: outcome.discount_applied,
        newDiscountGranted: outcome.new_discount_granted,
    };
    Log {
        address: test_contract(),
        data: event.encode_log_data(),
    }
}

/// An ERC-20 style `Transfer` log from another contract.
pub fn unrelated_log() -> Log {
    let topic = keccak256("Transfer(address,address,uint256)");
    Log {
        address: Address::with_last_byte(0x99),
        data: LogData::new_unchecked(
            vec![topic, B256::ZERO, B256::ZERO],
            Bytes::from(U256::from(1u8).to_be_bytes::<32>().to_vec()),
        ),
    }
}

/// Carries the `SpinResult` signature but a truncated payload.
pub fn garbage_spin_log() -> Log {
    Log {
        address: test_contract(),
        data: LogData::new_unchecked(
            vec![ISlotMachine::SpinResult::SIGNATURE_HASH, B256::ZERO],
            Bytes::from(vec![0xff; 7]),
        ),
    }
}

pub fn receipt_with_logs(transaction_hash: TxHash, logs: Vec<Log>) -> Receipt {
    Receipt {
        transaction_hash,
        block_number: Some(1),
        success: true,
        logs,
    }
}

enum Confirmation {
    Mined { success: bool, logs: Vec<Log> },
    Unknown,
}

/// Confirmation waiter answering from a queue, one entry per awaited
/// transaction. An empty queue answers "unknown".
#[derive(Clone, Default)]
pub struct FakeConfirmations {
    queue: Arc<Mutex<VecDeque<Confirmation>>>,
    awaited: Arc<Mutex<Vec<TxHash>>>,
}

impl FakeConfirmations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&self, outcome: &SpinOutcome) {
        self.push_logs(vec![unrelated_log(), spin_outcome_log(outcome)]);
    }

    pub fn push_logs(&self, logs: Vec<Log>) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Confirmation::Mined {
                success: true,
                logs,
            });
    }

    pub fn push_reverted(&self) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Confirmation::Mined {
                success: false,
                logs: Vec::new(),
            });
    }

    pub fn push_unconfirmed(&self) {
        self.queue.lock().unwrap().push_back(Confirmation::Unknown);
    }

    pub fn awaited(&self) -> Vec<TxHash> {
        self.awaited.lock().unwrap().clone()
    }
}

impl ConfirmationWaiter for FakeConfirmations {
    async fn await_confirmation(&self, tx_hash: TxHash) -> Option<Receipt> {
        self.awaited.lock().unwrap().push(tx_hash);
        match self.queue.lock().unwrap().pop_front()? {
            Confirmation::Mined { success, logs } => Some(Receipt {
                transaction_hash: tx_hash,
                block_number: Some(1),
                success,
                logs,
            }),
            Confirmation::Unknown => None,
        }
    }
}
