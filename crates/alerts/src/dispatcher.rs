//! Alert deduplication and forwarding.

use crate::telegram::format_alert;
use crate::{ChatNotifier, SeenSet};
use compact_str::CompactString;
use sentinel_core::{Alert, AlertKind};
use std::collections::HashMap;
use std::mem::Discriminant;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Default bound on the transfer-event seen-set.
pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

/// Accepts alerts from the poller and the subscribers, drops
/// duplicates, and forwards the rest to the chat layer best-effort.
pub struct Dispatcher {
    notifier: Arc<dyn ChatNotifier>,
    seen_events: Mutex<SeenSet>,
    last_kind: Mutex<HashMap<CompactString, Discriminant<AlertKind>>>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn ChatNotifier>, dedup_capacity: usize) -> Self {
        Self {
            notifier,
            seen_events: Mutex::new(SeenSet::new(dedup_capacity)),
            last_kind: Mutex::new(HashMap::new()),
        }
    }

    /// Dedup and forward one alert. Delivery failures are logged and
    /// dropped; they never block subsequent notifications.
    pub async fn notify(&self, alert: Alert) {
        if !self.accept(&alert) {
            debug!(subject = %alert.subject, "duplicate alert suppressed");
            return;
        }
        let text = format_alert(&alert);
        match self.notifier.send(&text).await {
            Ok(()) => info!(subject = %alert.subject, "alert dispatched"),
            Err(e) => error!(subject = %alert.subject, error = %e, "alert delivery failed"),
        }
    }

    /// Dedup decision. Locks are confined to this method and never
    /// held across the delivery await.
    fn accept(&self, alert: &Alert) -> bool {
        // event alerts dedup on transaction identity: the same log
        // replayed across a reconnect must not re-alert
        if let Some(event_id) = &alert.event_id {
            return match self.seen_events.lock() {
                Ok(mut seen) => seen.insert(event_id),
                Err(_) => true,
            };
        }

        // state alerts collapse repeats of the same kind per subject;
        // a different kind marks a state change and resets the gate
        let kind = std::mem::discriminant(&alert.kind);
        match self.last_kind.lock() {
            Ok(mut last) => match last.insert(alert.subject.clone(), kind) {
                Some(previous) => previous != kind,
                None => true,
            },
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::NotifyError;
    use pretty_assertions::assert_eq;

    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
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
            if self.fail {
                Err(NotifyError::Delivery("chat is down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn transfer_alert(event_id: &str) -> Alert {
        let from = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be".parse().unwrap();
        Alert::tokens_received(
            "treasury",
            "eth",
            from,
            "1".to_string(),
            "FORT",
            event_id.to_string(),
        )
    }

    #[tokio::test]
    async fn duplicate_events_dispatch_once() {
        let notifier = RecordingNotifier::new();
        let dispatcher = Dispatcher::new(notifier.clone(), 16);

        dispatcher.notify(transfer_alert("0xabc:0")).await;
        dispatcher.notify(transfer_alert("0xabc:0")).await;
        dispatcher.notify(transfer_alert("0xabc:1")).await;

        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn repeated_state_alerts_collapse_until_state_changes() {
        let notifier = RecordingNotifier::new();
        let dispatcher = Dispatcher::new(notifier.clone(), 16);

        dispatcher.notify(Alert::sla_dropped("node1", 0.85, 0.9)).await;
        // duplicate delivery of the same condition
        dispatcher.notify(Alert::sla_dropped("node1", 0.80, 0.9)).await;
        assert_eq!(notifier.count(), 1);

        // state change passes, and a later drop alerts again
        dispatcher.notify(Alert::sla_recovered("node1", 0.92)).await;
        dispatcher.notify(Alert::sla_dropped("node1", 0.70, 0.9)).await;
        assert_eq!(notifier.count(), 3);
    }

    #[tokio::test]
    async fn subjects_are_gated_independently() {
        let notifier = RecordingNotifier::new();
        let dispatcher = Dispatcher::new(notifier.clone(), 16);

        dispatcher.notify(Alert::sla_dropped("node1", 0.85, 0.9)).await;
        dispatcher.notify(Alert::sla_dropped("node2", 0.85, 0.9)).await;

        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_block_later_alerts() {
        let notifier = RecordingNotifier::failing();
        let dispatcher = Dispatcher::new(notifier.clone(), 16);

        dispatcher.notify(transfer_alert("0xabc:0")).await;
        dispatcher.notify(transfer_alert("0xabc:1")).await;

        // both were attempted despite the first failing
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn repeated_transfers_to_same_wallet_all_pass() {
        let notifier = RecordingNotifier::new();
        let dispatcher = Dispatcher::new(notifier.clone(), 16);

        // distinct transactions to one wallet are all real alerts
        dispatcher.notify(transfer_alert("0xaaa:0")).await;
        dispatcher.notify(transfer_alert("0xbbb:0")).await;
        dispatcher.notify(transfer_alert("0xccc:0")).await;

        assert_eq!(notifier.count(), 3);
    }
}
