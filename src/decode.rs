use crate::{
    abi::ISlotMachine,
    confirm::Receipt,
    error::DecodeError,
    units::format_native,
};
use alloy::{
    primitives::{
        Log,
        TxHash,
    },
    sol_types::SolEvent,
};
use tracing::{
    debug,
    trace,
};

pub const REEL_COUNT: usize = 3;
pub const SYMBOL_DELIMITER: char = '|';

/// Decoded outcome of one confirmed spin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinResult {
    pub symbol_combination: Vec<String>,
    pub reward_amount: String,
    pub extra_spins_granted: u64,
    pub rare_item_won: bool,
    pub rare_ticket_pending: bool,
    pub discount_applied: bool,
    pub new_discount_granted: bool,
    pub transaction_hash: TxHash,
}

/// Uses the first log that decodes as a `SpinResult` event. Logs from other
/// events, or that fail to decode, are skipped.
pub fn decode(receipt: &Receipt) -> Result<SpinResult, DecodeError> {
    let event = receipt
        .logs
        .iter()
        .enumerate()
        .find_map(|(index, log)| {
            let decoded = spin_outcome(log);
            if decoded.is_none() {
                trace!(index, address = %log.address, "log is not a spin outcome");
            }
            decoded
        })
        .ok_or_else(|| {
            debug!(
                tx_hash = %receipt.transaction_hash,
                logs = receipt.logs.len(),
                "no SpinResult event in receipt"
            );
            DecodeError::NoEventFound
        })?;
    spin_result(event, receipt.transaction_hash)
}

fn spin_outcome(log: &Log) -> Option<ISlotMachine::SpinResult> {
    if log.topics().first() != Some(&ISlotMachine::SpinResult::SIGNATURE_HASH) {
        return None;
    }
    match ISlotMachine::SpinResult::decode_log_data(&log.data) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, "SpinResult topic with undecodable payload");
            None
        }
    }
}

fn spin_result(
    event: ISlotMachine::SpinResult,
    transaction_hash: TxHash,
) -> Result<SpinResult, DecodeError> {
    let symbol_combination = split_combination(&event.combination)?;
    let extra_spins_granted = u64::try_from(event.extraSpins).map_err(|_| {
        DecodeError::MalformedFields(format!(
            "extraSpins {} does not fit in u64",
            event.extraSpins
        ))
    })?;
    Ok(SpinResult {
        symbol_combination,
        reward_amount: format_native(event.monReward),
        extra_spins_granted,
        rare_item_won: event.poppiesNftWon,
        rare_ticket_pending: event.rarestPending,
        discount_applied: event.discountApplied,
        new_discount_granted: event.newDiscountGranted,
        transaction_hash,
    })
}

fn split_combination(combination: &str) -> Result<Vec<String>, DecodeError> {
    let symbols: Vec<String> = combination
        .split(SYMBOL_DELIMITER)
        .map(|symbol| symbol.trim().to_string())
        .collect();
    if symbols.len() != REEL_COUNT || symbols.iter().any(String::is_empty) {
        return Err(DecodeError::MalformedFields(format!(
            "combination {combination:?} does not name {REEL_COUNT} symbols"
        )));
    }
    Ok(symbols)
}
