//! Telegram delivery and alert text formatting.

use crate::{ChatNotifier, NotifyError};
use async_trait::async_trait;
use sentinel_core::{Alert, AlertKind};
use teloxide::prelude::*;

/// Sends alert text to every configured chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_ids: Vec<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_ids: Vec<i64>) -> Self {
        Self::with_bot(Bot::new(token), chat_ids)
    }

    /// Reuse an existing bot instance (the command layer shares one).
    pub fn with_bot(bot: Bot, chat_ids: Vec<i64>) -> Self {
        Self {
            bot,
            chat_ids: chat_ids.into_iter().map(ChatId).collect(),
        }
    }
}

#[async_trait]
impl ChatNotifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        for chat_id in &self.chat_ids {
            if let Err(e) = self.bot.send_message(*chat_id, text).await {
                failures.push(format!("{chat_id}: {e}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(failures.join("; ")))
        }
    }
}

/// Render an alert as chat text.
pub fn format_alert(alert: &Alert) -> String {
    let body = match &alert.kind {
        AlertKind::SlaDropped { sla, threshold } => format!(
            "SCANNER ALERT\n{}: SLA {:.4} below threshold {:.2}",
            alert.subject, sla, threshold
        ),
        AlertKind::SlaRecovered { sla } => {
            format!("SCANNER RECOVERED\n{}: SLA {:.4}", alert.subject, sla)
        }
        AlertKind::ScannerUnreachable { failures } => format!(
            "SCANNER UNREACHABLE\n{}: {} consecutive failed polls",
            alert.subject, failures
        ),
        AlertKind::TokensReceived {
            chain,
            from,
            amount,
            symbol,
        } => format!(
            "WALLET ALERT\n{}({}): received {} {} from {}",
            alert.subject, chain, amount, symbol, from
        ),
    };

    let now = chrono::Utc::now();
    format!("{body}\n{}", now.format("%Y-%m-%d %H:%M:%S UTC"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sla_alert_text() {
        let text = format_alert(&Alert::sla_dropped("node1", 0.8512, 0.9));
        assert!(text.starts_with("SCANNER ALERT\nnode1: SLA 0.8512 below threshold 0.90"));

        let text = format_alert(&Alert::sla_recovered("node1", 0.95));
        assert!(text.starts_with("SCANNER RECOVERED\nnode1: SLA 0.9500"));
    }

    #[test]
    fn transfer_alert_text() {
        let from = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be".parse().unwrap();
        let alert = Alert::tokens_received(
            "treasury",
            "matic",
            from,
            "1.5".to_string(),
            "FORT",
            "0xabc:0".to_string(),
        );
        let text = format_alert(&alert);
        assert!(text.starts_with(
            "WALLET ALERT\ntreasury(matic): received 1.5 FORT from 0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be"
        ));
    }

    #[test]
    fn unreachable_alert_text() {
        let text = format_alert(&Alert::scanner_unreachable("node1", 3));
        assert!(text.starts_with("SCANNER UNREACHABLE\nnode1: 3 consecutive failed polls"));
    }
}
