pub mod abi;
pub mod confirm;
pub mod connection;
pub mod decode;
pub mod deployment;
pub mod error;
pub mod gas;
pub mod logging;
pub mod network;
pub mod reader;
pub mod reconciler;
pub mod rpc;
pub mod state;
pub mod submit;
pub mod units;
pub mod wallet;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use confirm::{
    ConfirmationWaiter,
    Receipt,
};
pub use decode::SpinResult;
pub use network::NetworkConfig;
pub use reconciler::{
    Phase,
    SpinEvent,
    SpinOrchestrator,
};
pub use state::{
    AttemptStatus,
    PlayerState,
    SpinAttempt,
    SpinCost,
};
pub use wallet::WalletProvider;
