//! ERC-20 Transfer log decoding.

use crate::rpc::{RawLog, TRANSFER_TOPIC};
use crate::FeedError;
use sentinel_core::Address;

/// A decoded Transfer(from, to, value) log.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub tx_hash: String,
    pub log_index: u64,
    pub removed: bool,
}

impl TransferEvent {
    /// Decode a raw log. Both address arguments are indexed, so the
    /// log carries exactly three topics; the amount sits alone in the
    /// data word.
    pub fn decode(log: &RawLog) -> Result<Self, FeedError> {
        if log.topics.len() != 3 {
            return Err(FeedError::Decode(format!(
                "expected 3 topics, got {}",
                log.topics.len()
            )));
        }
        if !log.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC) {
            return Err(FeedError::Decode("not a Transfer event".into()));
        }
        let from =
            Address::from_topic(&log.topics[1]).map_err(|e| FeedError::Decode(e.to_string()))?;
        let to =
            Address::from_topic(&log.topics[2]).map_err(|e| FeedError::Decode(e.to_string()))?;
        let value = decode_amount(&log.data)?;
        let log_index = parse_hex_u64(&log.log_index)?;

        Ok(Self {
            from,
            to,
            value,
            tx_hash: log.transaction_hash.clone(),
            log_index,
            removed: log.removed,
        })
    }

    /// Identity of this delivery, used by the dispatcher to collapse
    /// duplicates across reconnects.
    pub fn event_id(&self) -> String {
        format!("{}:{}", self.tx_hash, self.log_index)
    }
}

fn decode_amount(data: &str) -> Result<u128, FeedError> {
    let digits = data
        .strip_prefix("0x")
        .ok_or_else(|| FeedError::Decode("data missing 0x prefix".into()))?;
    if digits.len() != 64 {
        return Err(FeedError::Decode(format!(
            "expected one 32-byte data word, got {} hex chars",
            digits.len()
        )));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(digits, &mut bytes).map_err(|e| FeedError::Decode(e.to_string()))?;
    if bytes[..16].iter().any(|b| *b != 0) {
        return Err(FeedError::Decode("transfer amount exceeds u128".into()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Ok(u128::from_be_bytes(low))
}

fn parse_hex_u64(s: &str) -> Result<u64, FeedError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| FeedError::Decode(e.to_string()))
}
