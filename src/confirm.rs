use alloy::primitives::{
    Log,
    TxHash,
};

/// The parts of a mined transaction's receipt the orchestrator looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
    pub logs: Vec<Log>,
}

pub trait ConfirmationWaiter {
    /// Resolves once `tx_hash` is included in a block.
    ///
    /// `None` means the outcome is unknown: no receipt was ever observed.
    /// The transaction may still be mined later.
    fn await_confirmation(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Option<Receipt>>;
}
