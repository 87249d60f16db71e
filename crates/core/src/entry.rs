//! Registry entry types for monitored scanners and wallets.

use crate::Address;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Maximum length for a friendly name.
pub const MAX_NAME_LEN: usize = 100;

/// A monitored scanner node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerEntry {
    /// Friendly name, unique within the registry.
    pub name: CompactString,
    /// Scanner node address used to query the SLA endpoint.
    pub address: Address,
    /// Most recent SLA reading, if any poll has succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sla: Option<f64>,
    /// Whether the scanner is currently in a below-threshold alert state.
    #[serde(default)]
    pub alerting: bool,
}

impl ScannerEntry {
    pub fn new(name: impl Into<CompactString>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            last_sla: None,
            alerting: false,
        }
    }
}

/// A monitored wallet. Transfers into it produce alerts; the entry
/// itself carries no mutable monitoring state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub name: CompactString,
    pub address: Address,
}

impl WalletEntry {
    pub fn new(name: impl Into<CompactString>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// Check a friendly name identifier.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert!(validate_name("node1"));
        assert!(!validate_name(""));
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN)));
        assert!(!validate_name(&"a".repeat(MAX_NAME_LEN + 1)));
    }

    #[test]
    fn scanner_entry_starts_clean() {
        let addr = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be".parse().unwrap();
        let entry = ScannerEntry::new("node1", addr);
        assert_eq!(entry.last_sla, None);
        assert!(!entry.alerting);
    }
}
