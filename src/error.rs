use alloy::primitives::TxHash;
use std::fmt;
use thiserror::Error;

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;

/// EIP-1193/EIP-3085 code for a chain the wallet does not know about.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Raw failure reported by the wallet capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wallet request failed (code {code:?}): {message}")]
pub struct WalletRequestError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletRequestError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::new(
            Some(UNRECOGNIZED_CHAIN_CODE),
            format!("Unrecognized chain ID \"{chain_id_hex}\""),
        )
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == Some(UNRECOGNIZED_CHAIN_CODE)
    }
}

impl From<alloy::transports::TransportError> for WalletRequestError {
    fn from(err: alloy::transports::TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::new(Some(payload.code), payload.message.to_string()),
            None => Self::new(None, err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("wallet refused to switch to chain {chain_id_hex}: {source}")]
    SwitchNetwork {
        chain_id_hex: String,
        #[source]
        source: WalletRequestError,
    },
    #[error("wallet could not register chain {chain_id_hex}: {source}")]
    AddNetwork {
        chain_id_hex: String,
        #[source]
        source: WalletRequestError,
    },
    #[error("wallet did not expose an address: {0}")]
    Address(#[source] WalletRequestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionErrorKind {
    InsufficientFunds,
    UserRejected,
    Unknown,
}

impl fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionErrorKind::InsufficientFunds => "insufficient_funds",
            SubmissionErrorKind::UserRejected => "user_rejected",
            SubmissionErrorKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("spin submission failed ({kind}): {source}")]
pub struct SubmissionError {
    pub kind: SubmissionErrorKind,
    #[source]
    pub source: WalletRequestError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no SpinResult event found in receipt logs")]
    NoEventFound,
    #[error("malformed SpinResult fields: {0}")]
    MalformedFields(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("rpc read failed: {0}")]
    Transport(String),
    #[error("could not decode contract return data: {0}")]
    Decode(String),
}

impl From<alloy::transports::TransportError> for ReadError {
    fn from(err: alloy::transports::TransportError) -> Self {
        ReadError::Transport(err.to_string())
    }
}

/// Why a spin attempt was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpinFailure {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    /// Broadcast succeeded but no receipt was observed. The transaction may
    /// still land later.
    #[error("no receipt observed for {tx_hash}")]
    Unconfirmed { tx_hash: TxHash },
    #[error("transaction {tx_hash} confirmed but could not be decoded: {source}")]
    Decode {
        tx_hash: TxHash,
        #[source]
        source: DecodeError,
    },
}

impl SpinFailure {
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            SpinFailure::Submission(SubmissionError {
                kind: SubmissionErrorKind::InsufficientFunds,
                ..
            })
        )
    }
}
