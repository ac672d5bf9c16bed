use crate::{
    reader::{
        ChainReader,
        FeeData,
    },
    units::{
        GWEI,
        format_gwei,
    },
};
use tracing::{
    debug,
    warn,
};

/// Per-network fee constants. The bid is tuned for fast inclusion rather
/// than cheap inclusion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasPolicy {
    pub gas_limit: u64,
    pub fallback_max_fee_per_gas: u128,
    pub fallback_max_priority_fee_per_gas: u128,
    pub min_max_fee_per_gas: u128,
    pub min_max_priority_fee_per_gas: u128,
    pub max_fee_multiplier: u128,
    pub priority_fee_multiplier: u128,
}

impl GasPolicy {
    pub fn monad_testnet() -> Self {
        Self {
            gas_limit: 200_000,
            fallback_max_fee_per_gas: 150 * GWEI,
            fallback_max_priority_fee_per_gas: 20 * GWEI,
            min_max_fee_per_gas: 100 * GWEI,
            min_max_priority_fee_per_gas: 15 * GWEI,
            max_fee_multiplier: 2,
            priority_fee_multiplier: 3,
        }
    }

    pub fn local() -> Self {
        Self {
            gas_limit: 200_000,
            fallback_max_fee_per_gas: 10 * GWEI,
            fallback_max_priority_fee_per_gas: 2 * GWEI,
            min_max_fee_per_gas: GWEI,
            min_max_priority_fee_per_gas: GWEI / 10,
            max_fee_multiplier: 2,
            priority_fee_multiplier: 3,
        }
    }

    pub fn fallback_bid(&self) -> GasBid {
        GasBid {
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.fallback_max_fee_per_gas,
            max_priority_fee_per_gas: self.fallback_max_priority_fee_per_gas,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasBid {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Clone, Copy, Debug)]
pub struct GasStrategy {
    policy: GasPolicy,
}

impl GasStrategy {
    pub fn new(policy: GasPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GasPolicy {
        &self.policy
    }

    /// Never fails: an unreadable fee market yields the fallback bid.
    pub async fn compute_bid<R: ChainReader>(&self, reader: &R) -> GasBid {
        let bid = match reader.fee_data().await {
            Ok(fee_data) => {
                debug!(
                    gas_price = ?fee_data.gas_price,
                    max_fee = ?fee_data.max_fee_per_gas,
                    priority_fee = ?fee_data.max_priority_fee_per_gas,
                    "network fee data"
                );
                self.bid_from_fee_data(&fee_data)
            }
            Err(err) => {
                warn!(error = %err, "fee data unavailable, using fallback gas bid");
                self.policy.fallback_bid()
            }
        };
        debug!(
            gas_limit = bid.gas_limit,
            max_fee = %format_gwei(bid.max_fee_per_gas),
            priority_fee = %format_gwei(bid.max_priority_fee_per_gas),
            "computed gas bid"
        );
        bid
    }

    pub fn bid_from_fee_data(&self, fee_data: &FeeData) -> GasBid {
        let policy = &self.policy;
        let max_fee = fee_data
            .max_fee_per_gas
            .map(|fee| fee.saturating_mul(policy.max_fee_multiplier))
            .unwrap_or(policy.fallback_max_fee_per_gas)
            .max(policy.min_max_fee_per_gas);
        let priority_fee = fee_data
            .max_priority_fee_per_gas
            .map(|fee| fee.saturating_mul(policy.priority_fee_multiplier))
            .unwrap_or(policy.fallback_max_priority_fee_per_gas)
            .max(policy.min_max_priority_fee_per_gas);
        GasBid {
            gas_limit: policy.gas_limit,
            // nodes reject a tip above the fee cap
            max_fee_per_gas: max_fee.max(priority_fee),
            max_priority_fee_per_gas: priority_fee,
        }
    }
}
