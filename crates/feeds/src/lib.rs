//! Chain event subscriptions.
//!
//! One [`ChainSubscriber`] per configured chain holds a persistent
//! websocket JSON-RPC subscription to the watched token contract's
//! Transfer logs, reconnecting with exponential backoff until stopped.
//!
//! ## Architecture
//!
//! - `rpc` - JSON-RPC request building and stream message parsing
//! - `transfer` - Transfer log decoding into [`TransferEvent`]
//! - `subscriber` - connection state machine, backoff, cancellation

pub mod error;
pub mod rpc;
pub mod subscriber;
pub mod transfer;

pub use error::*;
pub use rpc::{RawLog, TRANSFER_TOPIC};
pub use subscriber::*;
pub use transfer::*;
