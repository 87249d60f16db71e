//! Client for the scanner SLA status endpoint.

use sentinel_core::Address;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// A transient fetch failure; retried implicitly on the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("sla request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct SlaResponse {
    statistics: SlaStatistics,
}

#[derive(Debug, Deserialize)]
struct SlaStatistics {
    avg: f64,
}

/// Fetches SLA readings from the status service.
#[derive(Clone)]
pub struct SlaClient {
    http: reqwest::Client,
    base_url: String,
}

impl SlaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// GET `{base_url}{address}` and extract the average SLA. Non-2xx
    /// statuses and malformed bodies are fetch failures.
    pub async fn fetch(&self, address: &Address) -> Result<f64, FetchError> {
        let url = format!("{}{}", self.base_url, address);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body: SlaResponse = response.json().await?;
        Ok(body.statistics.avg)
    }
}
