//! Chat transport abstraction.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("chat delivery failed: {0}")]
    Delivery(String),
}

/// Outbound chat transport the dispatcher forwards accepted alerts to.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}
