//! In-memory registry with write-through persistence.

use crate::store::{RegistryState, Store};
use crate::RegistryError;
use compact_str::CompactString;
use sentinel_core::{validate_name, Address, ScannerEntry, WalletEntry};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

/// One scanner's outcome from a poll tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaUpdate {
    pub name: CompactString,
    pub sla: f64,
    pub alerting: bool,
}

/// Owner of all monitored entries. Mutations run under one async
/// mutex held for the read/modify/persist span only; a failed persist
/// rolls the mutation back.
pub struct Registry {
    store: Store,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Load the registry from the document at `path`.
    ///
    /// A corrupt document is returned as an error; callers treat it as
    /// fatal at startup rather than continue with unknown state.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let store = Store::new(path);
        let state = store.load().await?;
        info!(
            scanners = state.scanners.len(),
            wallets = state.wallets.len(),
            threshold = state.threshold,
            "registry loaded"
        );
        Ok(Self {
            store,
            state: Mutex::new(state),
        })
    }

    /// Register a scanner under a unique friendly name.
    pub async fn add_scanner(&self, name: &str, address: &str) -> Result<ScannerEntry, RegistryError> {
        let address: Address = address.parse()?;
        if !validate_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let mut state = self.state.lock().await;
        if state.scanners.iter().any(|s| s.name == name) {
            return Err(RegistryError::DuplicateKey(name.to_string()));
        }
        let entry = ScannerEntry::new(name, address);
        let mut next = state.clone();
        next.scanners.push(entry.clone());
        self.store.save(&next).await?;
        *state = next;
        Ok(entry)
    }

    /// Drop a scanner by name.
    pub async fn remove_scanner(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        let idx = state
            .scanners
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let mut next = state.clone();
        next.scanners.remove(idx);
        self.store.save(&next).await?;
        *state = next;
        Ok(())
    }

    /// Register a wallet under a unique friendly name.
    pub async fn add_wallet(&self, name: &str, address: &str) -> Result<WalletEntry, RegistryError> {
        let address: Address = address.parse()?;
        if !validate_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        let mut state = self.state.lock().await;
        if state.wallets.iter().any(|w| w.name == name) {
            return Err(RegistryError::DuplicateKey(name.to_string()));
        }
        let entry = WalletEntry::new(name, address);
        let mut next = state.clone();
        next.wallets.push(entry.clone());
        self.store.save(&next).await?;
        *state = next;
        Ok(entry)
    }

    /// Drop a wallet by name.
    pub async fn remove_wallet(&self, name: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        let idx = state
            .wallets
            .iter()
            .position(|w| w.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let mut next = state.clone();
        next.wallets.remove(idx);
        self.store.save(&next).await?;
        *state = next;
        Ok(())
    }

    /// Change the SLA alert threshold. Scanner alerting flags are
    /// cleared so fresh alerts are produced against the new value.
    pub async fn set_threshold(&self, threshold: f64) -> Result<(), RegistryError> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(RegistryError::InvalidThreshold(threshold));
        }
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.threshold = threshold;
        for scanner in &mut next.scanners {
            scanner.alerting = false;
        }
        self.store.save(&next).await?;
        *state = next;
        Ok(())
    }

    /// Record one poll tick's results in a single persist. Names no
    /// longer present (removed mid-tick) are ignored.
    pub async fn apply_sla_results(&self, updates: &[SlaUpdate]) -> Result<(), RegistryError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        for update in updates {
            if let Some(scanner) = next.scanners.iter_mut().find(|s| s.name == update.name) {
                scanner.last_sla = Some(update.sla);
                scanner.alerting = update.alerting;
            }
        }
        if next == *state {
            return Ok(());
        }
        self.store.save(&next).await?;
        *state = next;
        Ok(())
    }

    /// Insertion-ordered snapshot of the scanners.
    pub async fn scanners(&self) -> Vec<ScannerEntry> {
        self.state.lock().await.scanners.clone()
    }

    /// Insertion-ordered snapshot of the wallets.
    pub async fn wallets(&self) -> Vec<WalletEntry> {
        self.state.lock().await.wallets.clone()
    }

    pub async fn threshold(&self) -> f64 {
        self.state.lock().await.threshold
    }

    /// Reverse lookup: friendly name for a wallet address.
    pub async fn wallet_named(&self, address: &Address) -> Option<CompactString> {
        self.state
            .lock()
            .await
            .wallets
            .iter()
            .find(|w| w.address == *address)
            .map(|w| w.name.clone())
    }
}
