//! Scrape pacing, retry, and timeout configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Batch scrape configuration.
///
/// The batch runs retailers sequentially by design; pacing and retry here
/// bound how aggressively each retailer's endpoints are hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Per-request timeout (seconds); bounds every outbound call
    pub request_timeout_secs: u64,
    /// Connection timeout (seconds)
    pub connect_timeout_secs: u64,
    /// Delay enforced between every outbound call (milliseconds)
    pub inter_request_delay_ms: u64,
    /// Total attempts per adapter invocation (1 = no retry)
    pub max_attempts: u32,
    /// First retry delay (milliseconds); doubles per attempt
    pub retry_base_delay_ms: u64,
    /// Backoff ceiling (milliseconds)
    pub retry_max_delay_ms: u64,
    /// Scrape only the first N catalog products per retailer, for cost
    /// control. None scrapes the full catalog.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_size: Option<usize>,
    /// User agent string for outbound requests
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            connect_timeout_secs: 10,
            inter_request_delay_ms: 1000,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            sample_size: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
