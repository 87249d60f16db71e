//! Application configuration.

use sentinel_core::{ChainConfigError, ChainSettings};
use sentinel_monitor::{ChainTask, MonitorSettings, PollerConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no allowed chat ids configured")]
    NoAllowedChats,

    #[error("chain {0}: {1}")]
    Chain(String, ChainConfigError),

    #[error("chain {0}: invalid websocket url: {1}")]
    BadChainUrl(String, url::ParseError),

    #[error("chain {0}: url scheme must be ws or wss, got {1:?}")]
    BadChainScheme(String, String),
}

/// Telegram access settings. The listed chat ids may issue commands
/// and receive alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    pub token: String,
    pub allowed_users: Vec<i64>,
}

/// Application configuration, loaded once at startup. Changes require
/// a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bot: BotSettings,
    /// Seconds between SLA poll ticks.
    pub scanner_pool_interval: u64,
    /// Seconds between subscriber keep-alive pings.
    #[serde(default = "default_wallet_pool_interval")]
    pub wallet_pool_interval: u64,
    /// Path of the persisted registry document.
    pub db_path: PathBuf,
    /// SLA endpoint base; the scanner address is appended.
    pub url: String,
    /// Watched chains by identifier.
    #[serde(default)]
    pub chains: BTreeMap<String, ChainSettings>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Consecutive failed polls before a scanner is reported
    /// unreachable.
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after: u32,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Bound on the transfer dedup seen-set.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

fn default_wallet_pool_interval() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_unreachable_after() -> u32 {
    3
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_cap_ms() -> u64 {
    60_000
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_dedup_capacity() -> usize {
    sentinel_alerts::DEFAULT_DEDUP_CAPACITY
}

impl AppConfig {
    /// Read and validate the config document, failing fast on
    /// missing or malformed fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.allowed_users.is_empty() {
            return Err(ConfigError::NoAllowedChats);
        }
        for (id, chain) in &self.chains {
            chain
                .validate()
                .map_err(|e| ConfigError::Chain(id.clone(), e))?;
            let parsed = url::Url::parse(&chain.url)
                .map_err(|e| ConfigError::BadChainUrl(id.clone(), e))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(ConfigError::BadChainScheme(
                    id.clone(),
                    parsed.scheme().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Monitor tuning derived from the document.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poller: PollerConfig::new(
                Duration::from_secs(self.scanner_pool_interval),
                self.unreachable_after,
            ),
            chains: self
                .chains
                .iter()
                .map(|(id, settings)| ChainTask {
                    id: id.as_str().into(),
                    settings: settings.clone(),
                })
                .collect(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ping_interval: Duration::from_secs(self.wallet_pool_interval.max(10)),
            reconnect_base: Duration::from_millis(self.reconnect_base_ms.max(100)),
            reconnect_cap: Duration::from_millis(self.reconnect_cap_ms),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}
