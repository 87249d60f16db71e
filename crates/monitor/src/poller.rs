//! Periodic SLA polling with hysteresis.

use crate::{FetchError, SlaClient};
use compact_str::CompactString;
use futures_util::future::join_all;
use sentinel_alerts::Dispatcher;
use sentinel_core::{Alert, ScannerEntry};
use sentinel_registry::{Registry, SlaUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Lowest allowed poll cadence; protects the status endpoint.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Consecutive failed polls before a scanner is reported
    /// unreachable.
    pub unreachable_after: u32,
}

impl PollerConfig {
    pub fn new(interval: Duration, unreachable_after: u32) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            unreachable_after: unreachable_after.max(1),
        }
    }
}

/// Threshold-crossing decision for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Dropped,
    Recovered,
}

/// Hysteresis: alert only when the alerting state flips, never on a
/// repeated same-direction reading.
pub fn evaluate(alerting: bool, sla: f64, threshold: f64) -> Transition {
    if sla < threshold {
        if alerting {
            Transition::None
        } else {
            Transition::Dropped
        }
    } else if alerting {
        Transition::Recovered
    } else {
        Transition::None
    }
}

/// Record one failed poll. Returns true exactly when the streak
/// reaches the escalation threshold, so the unreachable alert fires
/// once per outage.
pub fn note_failure(
    streaks: &mut HashMap<CompactString, u32>,
    name: &CompactString,
    unreachable_after: u32,
) -> bool {
    let streak = streaks.entry(name.clone()).or_insert(0);
    *streak += 1;
    *streak == unreachable_after
}

/// Polls every registered scanner on a fixed cadence and feeds
/// threshold crossings to the dispatcher.
pub struct SlaPoller {
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    client: SlaClient,
    config: PollerConfig,
    shutdown: watch::Receiver<bool>,
    failures: HashMap<CompactString, u32>,
}

impl SlaPoller {
    pub fn new(
        registry: Arc<Registry>,
        dispatcher: Arc<Dispatcher>,
        client: SlaClient,
        config: PollerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            client,
            config,
            shutdown,
            failures: HashMap::new(),
        }
    }

    /// Poll until stopped. Individual fetch failures never end the
    /// loop; cancellation interrupts the wait between ticks.
    pub async fn run(mut self) {
        let mut shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            // the tick itself races the shutdown signal, so stop does
            // not wait out in-flight fetches
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.tick() => {}
            }
        }
        debug!("sla poller stopped");
    }

    async fn tick(&mut self) {
        let scanners = self.registry.scanners().await;
        if scanners.is_empty() {
            return;
        }
        let threshold = self.registry.threshold().await;

        let fetches = scanners.iter().map(|scanner| {
            let client = self.client.clone();
            async move { (scanner, client.fetch(&scanner.address).await) }
        });
        let results: Vec<(&ScannerEntry, Result<f64, FetchError>)> = join_all(fetches).await;

        let mut updates = Vec::new();
        for (scanner, result) in results {
            match result {
                Ok(sla) => {
                    self.failures.remove(&scanner.name);
                    let alerting = match evaluate(scanner.alerting, sla, threshold) {
                        Transition::Dropped => {
                            self.dispatcher
                                .notify(Alert::sla_dropped(scanner.name.clone(), sla, threshold))
                                .await;
                            true
                        }
                        Transition::Recovered => {
                            self.dispatcher
                                .notify(Alert::sla_recovered(scanner.name.clone(), sla))
                                .await;
                            false
                        }
                        Transition::None => scanner.alerting,
                    };
                    updates.push(SlaUpdate {
                        name: scanner.name.clone(),
                        sla,
                        alerting,
                    });
                }
                Err(e) => {
                    warn!(scanner = %scanner.name, error = %e, "sla fetch failed, skipping this tick");
                    if note_failure(
                        &mut self.failures,
                        &scanner.name,
                        self.config.unreachable_after,
                    ) {
                        self.dispatcher
                            .notify(Alert::scanner_unreachable(
                                scanner.name.clone(),
                                self.config.unreachable_after,
                            ))
                            .await;
                    }
                }
            }
        }

        if let Err(e) = self.registry.apply_sla_results(&updates).await {
            error!(error = %e, "failed to persist poll results");
        }
    }
}
