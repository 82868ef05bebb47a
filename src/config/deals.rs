//! Deal detection configuration

use serde::{Deserialize, Serialize};

/// Configuration for the deal detection batch job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealConfig {
    /// Rolling lookback window for the price comparison (days)
    pub window_days: u32,
    /// Minimum price drop to qualify as a deal (percent)
    pub min_savings_percentage: f64,
}

impl Default for DealConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_savings_percentage: 15.0,
        }
    }
}
