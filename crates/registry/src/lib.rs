//! Durable registry of monitored scanners and wallets.
//!
//! The registry is the single owner of all scanner/wallet entries and
//! of the persisted SLA threshold. Every successful mutation rewrites
//! the whole JSON document at the configured path (write-through); a
//! failed write leaves the in-memory state untouched and surfaces the
//! error to the caller.

pub mod registry;
pub mod store;

pub use registry::*;
pub use store::*;

use sentinel_core::AddressError;
use thiserror::Error;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("registry document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("entry already exists: {0}")]
    DuplicateKey(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("threshold must be within (0, 1), got {0}")]
    InvalidThreshold(f64),
}

impl RegistryError {
    /// True for user-input failures that leave no trace in the
    /// registry; false for storage-level errors.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, RegistryError::Storage(_) | RegistryError::Corrupt(_))
    }
}
