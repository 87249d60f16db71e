//! Alert model shared by the poller, the subscribers and the dispatcher.

use crate::Address;
use compact_str::CompactString;

/// What happened, with the payload the formatter needs.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    /// SLA fell strictly below the configured threshold.
    SlaDropped { sla: f64, threshold: f64 },
    /// SLA came back to or above the threshold.
    SlaRecovered { sla: f64 },
    /// The status endpoint failed several polls in a row.
    ScannerUnreachable { failures: u32 },
    /// Tokens were transferred into a registered wallet.
    TokensReceived {
        chain: CompactString,
        from: Address,
        amount: String,
        symbol: CompactString,
    },
}

/// One notification on its way to the chat layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Registry key the alert is about (scanner or wallet name).
    pub subject: CompactString,
    pub kind: AlertKind,
    /// Transaction-scoped identity for event alerts; drives dedup of
    /// duplicate stream deliveries.
    pub event_id: Option<String>,
}

impl Alert {
    pub fn sla_dropped(subject: impl Into<CompactString>, sla: f64, threshold: f64) -> Self {
        Self {
            subject: subject.into(),
            kind: AlertKind::SlaDropped { sla, threshold },
            event_id: None,
        }
    }

    pub fn sla_recovered(subject: impl Into<CompactString>, sla: f64) -> Self {
        Self {
            subject: subject.into(),
            kind: AlertKind::SlaRecovered { sla },
            event_id: None,
        }
    }

    pub fn scanner_unreachable(subject: impl Into<CompactString>, failures: u32) -> Self {
        Self {
            subject: subject.into(),
            kind: AlertKind::ScannerUnreachable { failures },
            event_id: None,
        }
    }

    pub fn tokens_received(
        subject: impl Into<CompactString>,
        chain: impl Into<CompactString>,
        from: Address,
        amount: String,
        symbol: impl Into<CompactString>,
        event_id: String,
    ) -> Self {
        Self {
            subject: subject.into(),
            kind: AlertKind::TokensReceived {
                chain: chain.into(),
                from,
                amount,
                symbol: symbol.into(),
            },
            event_id: Some(event_id),
        }
    }

    /// True for per-transaction event alerts, false for state alerts.
    #[inline]
    pub fn is_event(&self) -> bool {
        self.event_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_alerts_carry_an_id() {
        let from = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be".parse().unwrap();
        let alert = Alert::tokens_received(
            "treasury",
            "eth",
            from,
            "1.5".to_string(),
            "FORT",
            "0xabc:0".to_string(),
        );
        assert!(alert.is_event());
        assert!(!Alert::sla_dropped("node1", 0.8, 0.9).is_event());
    }
}
