//! Error types for subscription operations.

use thiserror::Error;

/// Errors that can occur while maintaining a chain subscription.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("websocket disconnected")]
    Disconnected,

    #[error("subscription rejected: {0}")]
    SubscriptionFailed(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("failed to decode event: {0}")]
    Decode(String),

    #[error("event channel closed")]
    ChannelClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is connection-scoped and the
    /// subscriber should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionFailed(_)
                | FeedError::Disconnected
                | FeedError::Timeout(_)
                | FeedError::SubscriptionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FeedError::Disconnected.is_transient());
        assert!(FeedError::Timeout("connect".into()).is_transient());
        assert!(!FeedError::Decode("bad topic".into()).is_transient());
        assert!(!FeedError::ChannelClosed.is_transient());
    }
}
