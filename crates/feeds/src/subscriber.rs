//! Per-chain subscription task with reconnect and cancellation.

use crate::rpc::{self, Inbound};
use crate::{FeedError, TransferEvent};
use compact_str::CompactString;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use sentinel_core::Address;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// A connection that survived this long resets the backoff counter.
const STABLE_CONNECTION: Duration = Duration::from_secs(60);

/// How long to wait for the node to acknowledge the subscription.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for one chain subscription.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Chain identifier (e.g. "eth", "matic").
    pub chain: CompactString,
    /// Websocket endpoint.
    pub ws_url: String,
    /// Token contract whose Transfer logs are watched.
    pub token: Address,
    /// Bound on the websocket connect handshake.
    pub connect_timeout: Duration,
    /// Keep-alive ping cadence.
    pub ping_interval: Duration,
    /// First reconnect delay.
    pub reconnect_base: Duration,
    /// Ceiling for reconnect delays.
    pub reconnect_cap: Duration,
}

impl SubscriberConfig {
    pub fn new(chain: impl Into<CompactString>, ws_url: impl Into<String>, token: Address) -> Self {
        Self {
            chain: chain.into(),
            ws_url: ws_url.into(),
            token,
            connect_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(60),
            reconnect_base: Duration::from_secs(1),
            reconnect_cap: Duration::from_secs(60),
        }
    }
}

/// Lifecycle of one subscription task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Subscribed,
    Stopped,
}

/// Holds one persistent log subscription, emitting decoded transfers
/// into a channel. Reconnects forever with capped exponential backoff
/// until the shutdown signal flips.
pub struct ChainSubscriber {
    config: SubscriberConfig,
    events: mpsc::Sender<TransferEvent>,
    shutdown: watch::Receiver<bool>,
    state: SubscriberState,
    request_id: u64,
}

impl ChainSubscriber {
    pub fn new(
        config: SubscriberConfig,
        events: mpsc::Sender<TransferEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            events,
            shutdown,
            state: SubscriberState::Disconnected,
            request_id: 0,
        }
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    /// Drive the subscription until stopped. Every connection-class
    /// failure is retried; only an explicit stop (or the consumer
    /// going away) ends the task.
    pub async fn run(mut self) {
        let mut shutdown = self.shutdown.clone();
        let mut attempt = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.state = SubscriberState::Connecting;
            let connected_at = Instant::now();

            match self.connect_and_stream(&mut shutdown).await {
                Ok(()) => break,
                Err(FeedError::ChannelClosed) => {
                    debug!(chain = %self.config.chain, "event consumer gone, stopping");
                    break;
                }
                Err(e) => {
                    self.state = SubscriberState::Disconnected;
                    if connected_at.elapsed() > STABLE_CONNECTION {
                        attempt = 0;
                    }
                    attempt = attempt.saturating_add(1);
                    let delay = jittered(backoff_delay(
                        attempt,
                        self.config.reconnect_base,
                        self.config.reconnect_cap,
                    ));
                    warn!(
                        chain = %self.config.chain,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "subscription lost, reconnecting"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        self.state = SubscriberState::Stopped;
        info!(chain = %self.config.chain, "subscriber stopped");
    }

    async fn connect_and_stream(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), FeedError> {
        debug!(chain = %self.config.chain, url = %self.config.ws_url, "connecting");

        let connect =
            tokio::time::timeout(self.config.connect_timeout, connect_async(&self.config.ws_url));
        let (ws_stream, _response) = tokio::select! {
            result = connect => result.map_err(|_| FeedError::Timeout("websocket connect".into()))??,
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
                return Err(FeedError::Disconnected);
            }
        };
        let (mut write, mut read) = ws_stream.split();

        self.request_id += 1;
        let request = rpc::subscribe_logs_request(self.request_id, &self.config.token);
        write.send(Message::Text(request)).await?;

        // the stream is not live until the node acknowledges the subscription
        let subscription = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
            loop {
                match read.next().await {
                    Some(Ok(Message::Text(text))) => match rpc::parse_message(&text)? {
                        Inbound::SubscriptionAck { subscription, .. } => return Ok(subscription),
                        Inbound::RpcError { message, .. } => {
                            return Err(FeedError::SubscriptionFailed(message))
                        }
                        _ => continue,
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(FeedError::Disconnected),
                }
            }
        })
        .await
        .map_err(|_| FeedError::Timeout("subscription ack".into()))??;

        self.state = SubscriberState::Subscribed;
        info!(
            chain = %self.config.chain,
            subscription = %subscription,
            "subscribed to transfer logs"
        );

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                _ = ping.tick() => {
                    write.send(Message::Ping(Vec::new())).await?;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text).await?,
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        debug!(chain = %self.config.chain, ?frame, "server closed the stream");
                        return Err(FeedError::Disconnected);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(FeedError::Disconnected),
                }
            }
        }
    }

    /// Decode one text frame. Malformed frames are logged and skipped;
    /// they never bring the subscription down.
    async fn handle_text(&mut self, text: &str) -> Result<(), FeedError> {
        let log = match rpc::parse_message(text) {
            Ok(Inbound::Log(log)) => log,
            Ok(_) => return Ok(()),
            Err(e) => {
                warn!(chain = %self.config.chain, error = %e, "unreadable stream message, skipping");
                return Ok(());
            }
        };
        let event = match TransferEvent::decode(&log) {
            Ok(event) => event,
            Err(e) => {
                warn!(chain = %self.config.chain, error = %e, "undecodable transfer log, skipping");
                return Ok(());
            }
        };
        if event.removed {
            debug!(chain = %self.config.chain, tx = %event.tx_hash, "reorged transfer dropped");
            return Ok(());
        }
        self.events
            .send(event)
            .await
            .map_err(|_| FeedError::ChannelClosed)
    }
}

/// Deterministic part of the reconnect schedule: `base * 2^(n-1)`,
/// capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exp).min(cap)
}

/// Spread reconnects out by up to 25% so restarted subscribers do not
/// hammer an endpoint in lockstep.
pub fn jittered(delay: Duration) -> Duration {
    let extra = rand::thread_rng().gen_range(Duration::ZERO..=delay / 4);
    delay + extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> SubscriberConfig {
        let token = "0x41545f8b9472d758bb671ea8a61499854269fa1a".parse().unwrap();
        SubscriberConfig::new("eth", "wss://mainnet.example/ws", token)
    }

    #[test]
    fn backoff_grows_until_capped() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(60);

        let mut previous = Duration::ZERO;
        for attempt in 1..=6 {
            let delay = backoff_delay(attempt, base, cap);
            assert!(delay > previous, "attempt {attempt} did not grow");
            previous = delay;
        }
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(1));
        assert_eq!(backoff_delay(4, base, cap), Duration::from_secs(8));
        assert_eq!(backoff_delay(7, base, cap), cap);
        assert_eq!(backoff_delay(1000, base, cap), cap);
    }

    #[test]
    fn jitter_is_bounded() {
        let delay = Duration::from_secs(8);
        for _ in 0..100 {
            let spread = jittered(delay);
            assert!(spread >= delay);
            assert!(spread <= delay + delay / 4);
        }
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn subscriber_starts_disconnected() {
        let (events, _rx) = mpsc::channel(8);
        let (_tx, shutdown) = watch::channel(false);
        let subscriber = ChainSubscriber::new(config(), events, shutdown);
        assert_eq!(subscriber.state(), SubscriberState::Disconnected);
    }

    #[tokio::test]
    async fn run_exits_immediately_when_already_stopped() {
        let (events, _rx) = mpsc::channel(8);
        let (tx, shutdown) = watch::channel(true);
        let subscriber = ChainSubscriber::new(config(), events, shutdown);
        // no connection attempt is made against the (unreachable) endpoint
        tokio::time::timeout(Duration::from_millis(100), subscriber.run())
            .await
            .expect("run should return without connecting");
        drop(tx);
    }
}
