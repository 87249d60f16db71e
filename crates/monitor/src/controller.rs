//! Monitoring lifecycle supervision.

use crate::{PollerConfig, SlaClient, SlaPoller};
use compact_str::{format_compact, CompactString};
use sentinel_alerts::Dispatcher;
use sentinel_core::{Alert, ChainSettings};
use sentinel_feeds::{ChainSubscriber, SubscriberConfig, TransferEvent};
use sentinel_registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Buffered transfer events per chain before backpressure.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("monitoring already running")]
    AlreadyRunning,

    #[error("monitoring not running")]
    NotRunning,
}

/// One chain the controller subscribes to on start.
#[derive(Debug, Clone)]
pub struct ChainTask {
    pub id: CompactString,
    pub settings: ChainSettings,
}

/// Tuning for a monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poller: PollerConfig,
    pub chains: Vec<ChainTask>,
    /// Bound on the websocket connect handshake.
    pub connect_timeout: Duration,
    /// Subscriber keep-alive cadence.
    pub ping_interval: Duration,
    /// First reconnect delay.
    pub reconnect_base: Duration,
    /// Ceiling for reconnect delays.
    pub reconnect_cap: Duration,
    /// Grace period per task on stop before it is abandoned.
    pub stop_timeout: Duration,
}

struct Session {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(CompactString, JoinHandle<()>)>,
}

/// Owns the monitoring lifecycle. At most one session is active; a
/// restarted process always comes up Stopped and needs an explicit
/// start.
pub struct Controller {
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    client: SlaClient,
    settings: MonitorSettings,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl Controller {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: Arc<Dispatcher>,
        client: SlaClient,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            client,
            settings,
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Spawn the poller and one subscriber (plus its event pump) per
    /// configured chain, all watching one shutdown signal.
    pub async fn start(&self) -> Result<(), ControllerError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(ControllerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<(CompactString, JoinHandle<()>)> = Vec::new();

        let poller = SlaPoller::new(
            self.registry.clone(),
            self.dispatcher.clone(),
            self.client.clone(),
            self.settings.poller.clone(),
            shutdown_rx.clone(),
        );
        tasks.push((CompactString::new("sla-poller"), tokio::spawn(poller.run())));

        for chain in &self.settings.chains {
            let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

            let mut config = SubscriberConfig::new(
                chain.id.clone(),
                chain.settings.url.clone(),
                chain.settings.token,
            );
            config.connect_timeout = self.settings.connect_timeout;
            config.ping_interval = self.settings.ping_interval;
            config.reconnect_base = self.settings.reconnect_base;
            config.reconnect_cap = self.settings.reconnect_cap;

            let subscriber = ChainSubscriber::new(config, events_tx, shutdown_rx.clone());
            tasks.push((
                format_compact!("{}-subscriber", chain.id),
                tokio::spawn(subscriber.run()),
            ));

            tasks.push((
                format_compact!("{}-events", chain.id),
                tokio::spawn(run_transfer_pump(
                    chain.id.clone(),
                    chain.settings.clone(),
                    self.registry.clone(),
                    self.dispatcher.clone(),
                    events_rx,
                    shutdown_rx.clone(),
                )),
            ));
        }

        info!(chains = self.settings.chains.len(), "monitoring started");
        *session = Some(Session {
            shutdown: shutdown_tx,
            tasks,
        });
        Ok(())
    }

    /// Signal cancellation and wait for each task up to the stop
    /// timeout; stragglers are aborted and logged.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let mut session = self.session.lock().await;
        let Session { shutdown, tasks } = session.take().ok_or(ControllerError::NotRunning)?;

        let _ = shutdown.send(true);
        for (name, handle) in tasks {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.settings.stop_timeout, handle)
                .await
                .is_err()
            {
                warn!(task = %name, "task did not stop in time, abandoning");
                abort.abort();
            }
        }

        info!("monitoring stopped");
        Ok(())
    }
}

/// Match decoded transfers against registered wallets and raise
/// alerts. Runs until stopped or the subscriber goes away.
async fn run_transfer_pump(
    chain: CompactString,
    settings: ChainSettings,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    mut events: mpsc::Receiver<TransferEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(wallet) = registry.wallet_named(&event.to).await {
                        let alert = Alert::tokens_received(
                            wallet,
                            chain.clone(),
                            event.from,
                            settings.format_amount(event.value),
                            settings.symbol.clone(),
                            event.event_id(),
                        );
                        dispatcher.notify(alert).await;
                    }
                }
                None => break,
            }
        }
    }
    debug!(chain = %chain, "transfer pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sentinel_alerts::{ChatNotifier, NotifyError};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatNotifier for RecordingNotifier {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    static SEQ: AtomicU32 = AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "sentinel-controller-{}-{}.json",
            std::process::id(),
            n
        ))
    }

    fn settings(chains: Vec<ChainTask>) -> MonitorSettings {
        MonitorSettings {
            poller: PollerConfig::new(Duration::from_secs(300), 3),
            chains,
            connect_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_secs(60),
            reconnect_base: Duration::from_secs(1),
            reconnect_cap: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
        }
    }

    async fn build(chains: Vec<ChainTask>) -> (Controller, Arc<RecordingNotifier>, PathBuf) {
        let path = temp_path();
        let _ = tokio::fs::remove_file(&path).await;
        let registry = Arc::new(Registry::load(&path).await.unwrap());
        let notifier = RecordingNotifier::new();
        let dispatcher = Arc::new(Dispatcher::new(notifier.clone(), 16));
        let client = SlaClient::new("http://127.0.0.1:9/sla/", Duration::from_secs(1)).unwrap();
        (
            Controller::new(registry, dispatcher, client, settings(chains)),
            notifier,
            path,
        )
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let (controller, _notifier, path) = build(Vec::new()).await;

        assert!(!controller.is_running().await);
        controller.start().await.unwrap();
        assert!(controller.is_running().await);
        assert_eq!(controller.start().await, Err(ControllerError::AlreadyRunning));

        controller.stop().await.unwrap();
        assert!(!controller.is_running().await);
        assert_eq!(controller.stop().await, Err(ControllerError::NotRunning));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn stop_returns_within_bounded_time() {
        // an unreachable chain endpoint keeps the subscriber in its
        // retry loop; stop must still come back promptly
        let chain = ChainTask {
            id: CompactString::new("eth"),
            settings: serde_json::from_str(
                r#"{"url": "ws://127.0.0.1:1/ws", "token": "0x41545f8b9472d758bb671ea8a61499854269fa1a"}"#,
            )
            .unwrap(),
        };
        let (controller, notifier, path) = build(vec![chain]).await;

        controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let begun = Instant::now();
        controller.stop().await.unwrap();
        assert!(begun.elapsed() < Duration::from_secs(5));
        assert_eq!(notifier.count(), 0);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn restart_after_stop_is_allowed() {
        let (controller, _notifier, path) = build(Vec::new()).await;

        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        controller.start().await.unwrap();
        assert!(controller.is_running().await);
        controller.stop().await.unwrap();

        let _ = tokio::fs::remove_file(&path).await;
    }
}
