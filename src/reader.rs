use crate::{
    abi::ISlotMachine,
    error::ReadError,
};
use alloy::{
    primitives::{
        Address,
        Bytes,
        U256,
    },
    sol_types::{
        SolCall,
        SolValue,
    },
};
use futures::join;

/// EIP-1559 fee suggestion from the node. Every field may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Read-only access to the chain.
pub trait ChainReader {
    fn balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, ReadError>>;

    fn fee_data(&self) -> impl Future<Output = Result<FeeData, ReadError>>;

    /// `eth_call` against `to` with raw calldata.
    fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> impl Future<Output = Result<Bytes, ReadError>>;
}

/// Result of one refresh round. Each read fails on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerReads {
    pub balance: Result<U256, ReadError>,
    pub free_spins: Result<u64, ReadError>,
    pub discounted_spins: Result<u64, ReadError>,
    pub has_discount: Result<bool, ReadError>,
    pub reward_pool: Result<U256, ReadError>,
}

/// Typed handle to the slot-machine contract at a fixed address.
#[derive(Clone, Debug)]
pub struct SlotMachine<R> {
    address: Address,
    reader: R,
}

impl<R: ChainReader> SlotMachine<R> {
    pub fn new(address: Address, reader: R) -> Self {
        Self { address, reader }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn spin_calldata() -> Bytes {
        ISlotMachine::spinCall {}.abi_encode().into()
    }

    pub async fn free_spins(&self, player: Address) -> Result<u64, ReadError> {
        let raw = self
            .read::<U256>(ISlotMachine::freeSpinsCall { player }.abi_encode())
            .await?;
        to_count(raw)
    }

    pub async fn discounted_spins(&self, player: Address) -> Result<u64, ReadError> {
        let raw = self
            .read::<U256>(ISlotMachine::discountedSpinsCall { player }.abi_encode())
            .await?;
        to_count(raw)
    }

    pub async fn has_discount(&self, player: Address) -> Result<bool, ReadError> {
        self.read::<bool>(ISlotMachine::hasDiscountCall { player }.abi_encode())
            .await
    }

    pub async fn reward_pool(&self) -> Result<U256, ReadError> {
        self.read::<U256>(ISlotMachine::getRewardPoolCall {}.abi_encode())
            .await
    }

    /// Issues the balance read and all contract reads concurrently.
    pub async fn read_player(&self, player: Address) -> PlayerReads {
        let (balance, free_spins, discounted_spins, has_discount, reward_pool) = join!(
            self.reader.balance(player),
            self.free_spins(player),
            self.discounted_spins(player),
            self.has_discount(player),
            self.reward_pool(),
        );
        PlayerReads {
            balance,
            free_spins,
            discounted_spins,
            has_discount,
            reward_pool,
        }
    }

    async fn read<T>(&self, calldata: Vec<u8>) -> Result<T, ReadError>
    where
        T: SolValue + From<<T::SolType as alloy::sol_types::SolType>::RustType>,
    {
        let output = self.reader.call(self.address, calldata.into()).await?;
        T::abi_decode(&output).map_err(|e| ReadError::Decode(e.to_string()))
    }
}

fn to_count(raw: U256) -> Result<u64, ReadError> {
    u64::try_from(raw).map_err(|_| ReadError::Decode(format!("count {raw} exceeds u64")))
}
