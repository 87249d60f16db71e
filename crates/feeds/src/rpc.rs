//! JSON-RPC plumbing for the log subscription stream.

use crate::FeedError;
use sentinel_core::Address;
use serde::Deserialize;
use serde_json::json;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Build the `eth_subscribe` request for Transfer logs emitted by the
/// watched token contract.
pub fn subscribe_logs_request(id: u64, token: &Address) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "eth_subscribe",
        "params": [
            "logs",
            {
                "address": token.to_string(),
                "topics": [TRANSFER_TOPIC],
            }
        ],
    })
    .to_string()
}

/// A raw log notification as delivered by the node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub transaction_hash: String,
    pub log_index: String,
    /// Set by the node when the log was removed in a reorg.
    #[serde(default)]
    pub removed: bool,
}

/// One parsed inbound stream message.
#[derive(Debug)]
pub enum Inbound {
    /// `eth_subscription` log notification.
    Log(RawLog),
    /// Reply to our subscribe request.
    SubscriptionAck { id: u64, subscription: String },
    /// Error reply from the node.
    RpcError { id: Option<u64>, message: String },
    /// Anything else the node sends.
    Other,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    id: Option<u64>,
    method: Option<String>,
    result: Option<serde_json::Value>,
    params: Option<NotifyParams>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct NotifyParams {
    result: RawLog,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

/// Classify one text frame from the stream.
pub fn parse_message(text: &str) -> Result<Inbound, FeedError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| FeedError::Decode(e.to_string()))?;

    if let Some(error) = envelope.error {
        return Ok(Inbound::RpcError {
            id: envelope.id,
            message: error.message,
        });
    }
    if envelope.method.as_deref() == Some("eth_subscription") {
        let params = envelope
            .params
            .ok_or_else(|| FeedError::Decode("subscription notification without params".into()))?;
        return Ok(Inbound::Log(params.result));
    }
    if let (Some(id), Some(result)) = (envelope.id, envelope.result) {
        if let Some(subscription) = result.as_str() {
            return Ok(Inbound::SubscriptionAck {
                id,
                subscription: subscription.to_string(),
            });
        }
    }
    Ok(Inbound::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOKEN: &str = "0x41545f8b9472d758bb671ea8a61499854269fa1a";

    #[test]
    fn subscribe_request_shape() {
        let token: Address = TOKEN.parse().unwrap();
        let raw = subscribe_logs_request(7, &token);
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "eth_subscribe");
        assert_eq!(value["params"][0], "logs");
        assert_eq!(value["params"][1]["address"], TOKEN);
        assert_eq!(value["params"][1]["topics"][0], TRANSFER_TOPIC);
    }

    #[test]
    fn parse_subscription_ack() {
        let ack = r#"{"jsonrpc":"2.0","id":1,"result":"0xcd0c3e8af590364c09d0fa6a1210faf5"}"#;
        match parse_message(ack).unwrap() {
            Inbound::SubscriptionAck { id, subscription } => {
                assert_eq!(id, 1);
                assert_eq!(subscription, "0xcd0c3e8af590364c09d0fa6a1210faf5");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_log_notification() {
        let notification = format!(
            r#"{{
                "jsonrpc": "2.0",
                "method": "eth_subscription",
                "params": {{
                    "subscription": "0xcd0c3e8af590364c09d0fa6a1210faf5",
                    "result": {{
                        "address": "{TOKEN}",
                        "topics": ["{TRANSFER_TOPIC}"],
                        "data": "0x00",
                        "transactionHash": "0xdeadbeef",
                        "logIndex": "0x2",
                        "removed": false
                    }}
                }}
            }}"#
        );
        match parse_message(&notification).unwrap() {
            Inbound::Log(log) => {
                assert_eq!(log.transaction_hash, "0xdeadbeef");
                assert_eq!(log.log_index, "0x2");
                assert!(!log.removed);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_rpc_error() {
        let reply = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"too many subscriptions"}}"#;
        match parse_message(reply).unwrap() {
            Inbound::RpcError { id, message } => {
                assert_eq!(id, Some(1));
                assert_eq!(message, "too many subscriptions");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_garbage_is_decode_error() {
        assert!(matches!(parse_message("pong"), Err(FeedError::Decode(_))));
    }
}
