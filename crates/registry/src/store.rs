//! JSON document persistence for the registry.

use crate::RegistryError;
use sentinel_core::{ScannerEntry, WalletEntry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default SLA alert threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.90;

/// The full persisted registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    pub scanners: Vec<ScannerEntry>,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
    /// SLA alert threshold, within (0, 1).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            scanners: Vec::new(),
            wallets: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// File-backed store. Each save replaces the whole document via a
/// temp file + rename so readers never observe a partial write.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing file is a normal first run and
    /// yields the empty state; an unreadable or unparseable file is an
    /// error the caller treats as fatal at startup.
    pub async fn load(&self) -> Result<RegistryState, RegistryError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "registry file missing, starting empty");
                return Ok(RegistryState::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Replace the document on disk.
    pub async fn save(&self, state: &RegistryState) -> Result<(), RegistryError> {
        let raw = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = raw.len(), "registry persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sentinel_core::ScannerEntry;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sentinel-store-{}-{}.json", tag, std::process::id()))
    }

    #[tokio::test]
    async fn load_missing_file_yields_empty_state() {
        let store = Store::new(temp_path("missing"));
        let state = store.load().await.unwrap();
        assert_eq!(state, RegistryState::default());
        assert_eq!(state.threshold, DEFAULT_THRESHOLD);
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let path = temp_path("roundtrip");
        let store = Store::new(&path);

        let mut state = RegistryState::default();
        let addr = "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be".parse().unwrap();
        let mut entry = ScannerEntry::new("node1", addr);
        entry.last_sla = Some(0.97);
        entry.alerting = true;
        state.scanners.push(entry);
        state.threshold = 0.85;

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, state);

        // saving what was just loaded is idempotent
        store.save(&loaded).await.unwrap();
        assert_eq!(store.load().await.unwrap(), state);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn load_corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = Store::new(&path);
        assert!(matches!(store.load().await, Err(RegistryError::Corrupt(_))));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn save_into_missing_directory_fails() {
        let store = Store::new("/nonexistent-sentinel-dir/db.json");
        let err = store.save(&RegistryState::default()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
    }
}
