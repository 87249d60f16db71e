//! Per-chain subscription settings.

use crate::Address;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest supported token precision. Keeps `10^decimals` well inside u128.
pub const MAX_DECIMALS: u8 = 30;

/// Websocket endpoint and token contract watched on one chain.
///
/// Token display metadata is fixed in configuration and validated at
/// load time instead of being queried from the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Websocket endpoint of the chain node.
    pub url: String,
    /// ERC-20 contract whose Transfer events are watched.
    pub token: Address,
    /// Token symbol used in alert text.
    #[serde(default = "default_symbol")]
    pub symbol: CompactString,
    /// Token precision used to scale raw transfer amounts.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_symbol() -> CompactString {
    CompactString::new("FORT")
}

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainConfigError {
    #[error("chain websocket url is empty")]
    EmptyUrl,

    #[error("token symbol is empty")]
    EmptySymbol,

    #[error("token decimals {0} out of range (max {MAX_DECIMALS})")]
    DecimalsOutOfRange(u8),
}

impl ChainSettings {
    pub fn validate(&self) -> Result<(), ChainConfigError> {
        if self.url.is_empty() {
            return Err(ChainConfigError::EmptyUrl);
        }
        if self.symbol.is_empty() {
            return Err(ChainConfigError::EmptySymbol);
        }
        if self.decimals > MAX_DECIMALS {
            return Err(ChainConfigError::DecimalsOutOfRange(self.decimals));
        }
        Ok(())
    }

    /// Scale a raw transfer amount by the token precision.
    pub fn format_amount(&self, value: u128) -> String {
        format_units(value, self.decimals)
    }
}

/// Render `value / 10^decimals` as a decimal string, trimming
/// trailing fractional zeros.
pub fn format_units(value: u128, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let scale = 10u128.pow(u32::from(decimals.min(MAX_DECIMALS)));
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> ChainSettings {
        serde_json::from_str(
            r#"{"url": "wss://mainnet.example/ws", "token": "0x41545f8b9472d758bb671ea8a61499854269fa1a"}"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_applied_on_deserialize() {
        let s = settings();
        assert_eq!(s.symbol, "FORT");
        assert_eq!(s.decimals, 18);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut s = settings();
        s.url.clear();
        assert_eq!(s.validate(), Err(ChainConfigError::EmptyUrl));

        let mut s = settings();
        s.decimals = 31;
        assert_eq!(s.validate(), Err(ChainConfigError::DecimalsOutOfRange(31)));
    }

    #[test]
    fn format_units_scales_and_trims() {
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(format_units(42, 0), "42");
        assert_eq!(format_units(1, 18), "0.000000000000000001");
        assert_eq!(format_units(2_000_000, 6), "2");
        assert_eq!(format_units(2_030_000, 6), "2.03");
    }
}
