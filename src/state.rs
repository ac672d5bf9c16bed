use crate::{
    decode::SpinResult,
    reader::PlayerReads,
    units::format_native,
};
use alloy::primitives::{
    TxHash,
    U256,
};
use std::fmt;
use tracing::warn;

pub const STANDARD_SPIN_COST_WEI: u128 = 100_000_000_000_000_000;
pub const DISCOUNTED_SPIN_COST_WEI: u128 = 10_000_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerState {
    pub free_spins_remaining: u64,
    pub discounted_spins_remaining: u64,
    pub has_discount: bool,
    pub native_balance: String,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            free_spins_remaining: 0,
            discounted_spins_remaining: 0,
            has_discount: false,
            native_balance: "0.0".to_string(),
        }
    }
}

impl PlayerState {
    pub fn spin_cost(&self) -> SpinCost {
        if self.free_spins_remaining > 0 {
            SpinCost::Free
        } else if self.has_discount && self.discounted_spins_remaining > 0 {
            SpinCost::Discounted
        } else {
            SpinCost::Standard
        }
    }

    /// Local bookkeeping for a confirmed spin, before on-chain values are
    /// read back.
    pub fn apply_result(&mut self, cost: SpinCost, result: &SpinResult) {
        if cost == SpinCost::Free {
            self.free_spins_remaining = self.free_spins_remaining.saturating_sub(1);
        }
        if result.discount_applied {
            self.discounted_spins_remaining =
                self.discounted_spins_remaining.saturating_sub(1);
        }
        self.free_spins_remaining = self
            .free_spins_remaining
            .saturating_add(result.extra_spins_granted);
        if result.new_discount_granted {
            self.has_discount = true;
        }
    }

    /// Overwrites every field whose read succeeded. Failed reads keep the
    /// current value.
    pub fn apply_reads(&mut self, reads: &PlayerReads) {
        match &reads.balance {
            Ok(balance) => self.native_balance = format_native(*balance),
            Err(err) => warn!(error = %err, "balance read failed"),
        }
        match &reads.free_spins {
            Ok(count) => self.free_spins_remaining = *count,
            Err(err) => warn!(error = %err, "freeSpins read failed"),
        }
        match &reads.discounted_spins {
            Ok(count) => self.discounted_spins_remaining = *count,
            Err(err) => warn!(error = %err, "discountedSpins read failed"),
        }
        match &reads.has_discount {
            Ok(flag) => self.has_discount = *flag,
            Err(err) => warn!(error = %err, "hasDiscount read failed"),
        }
    }
}

/// Price tier of the next spin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinCost {
    Free,
    Discounted,
    Standard,
}

impl SpinCost {
    pub fn amount(self) -> U256 {
        match self {
            SpinCost::Free => U256::ZERO,
            SpinCost::Discounted => U256::from(DISCOUNTED_SPIN_COST_WEI),
            SpinCost::Standard => U256::from(STANDARD_SPIN_COST_WEI),
        }
    }

    pub fn label(self, symbol: &str) -> String {
        match self {
            SpinCost::Free => "Free".to_string(),
            _ => format!("{} {symbol}", trim_display(&format_native(self.amount()))),
        }
    }
}

fn trim_display(amount: &str) -> &str {
    amount.strip_suffix(".0").unwrap_or(amount)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
    RolledBack,
}

impl AttemptStatus {
    pub fn can_advance_to(self, next: AttemptStatus) -> bool {
        use AttemptStatus::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, Confirmed)
                | (Submitted, Failed)
                | (Failed, RolledBack)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Confirmed | AttemptStatus::RolledBack)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Confirmed => "confirmed",
            AttemptStatus::Failed => "failed",
            AttemptStatus::RolledBack => "rolled_back",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinAttempt {
    cost: SpinCost,
    snapshot: PlayerState,
    status: AttemptStatus,
    tx_hash: Option<TxHash>,
}

impl SpinAttempt {
    pub fn new(snapshot: PlayerState) -> Self {
        Self {
            cost: snapshot.spin_cost(),
            snapshot,
            status: AttemptStatus::Pending,
            tx_hash: None,
        }
    }

    pub fn cost(&self) -> SpinCost {
        self.cost
    }

    pub fn snapshot(&self) -> &PlayerState {
        &self.snapshot
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    pub fn record_tx_hash(&mut self, tx_hash: TxHash) {
        self.tx_hash = Some(tx_hash);
    }

    /// Moves the attempt forward. Backward or skipping moves are refused and
    /// leave the status untouched.
    pub fn advance(&mut self, next: AttemptStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            warn!(from = %self.status, to = %next, "refused spin attempt transition");
            false
        }
    }
}
