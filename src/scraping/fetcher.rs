//! HTTP fetch layer for retailer adapters
//!
//! One shared client with bounded timeouts; every request passes through the
//! pacer, so the inter-request delay holds across products and retailers.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::pacing::Pacer;
use crate::config::ScrapeConfig;

/// Errors that can occur while fetching from a retailer endpoint
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl FetchError {
    /// True for request timeouts, which count as retailer unavailability.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Http(e) if e.is_timeout())
    }
}

/// Shared HTTP fetcher for all adapters.
pub struct HttpFetcher {
    client: reqwest::Client,
    pacer: Pacer,
}

impl HttpFetcher {
    /// Build the client once with bounded timeouts and the configured user
    /// agent. The per-request timeout bounds every outbound call so one hung
    /// request cannot stall the whole batch.
    pub fn new(config: &ScrapeConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            pacer: Pacer::new(Duration::from_millis(config.inter_request_delay_ms)),
        })
    }

    /// Fetch a URL and parse the response body as JSON.
    pub async fn get_json(&self, url: &Url) -> Result<serde_json::Value, FetchError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fetch a URL and return the response body as text.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        self.pacer.pause().await;

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }
}

/// Build a fetcher wrapped in an `Arc` for sharing across adapters.
pub fn shared_fetcher(config: &ScrapeConfig) -> Result<Arc<HttpFetcher>, FetchError> {
    Ok(Arc::new(HttpFetcher::new(config)?))
}
