//! Configuration for PriceWatch

mod deals;
mod logging;
mod rates;
mod scrape;
mod store;

pub use deals::DealConfig;
pub use logging::{LogLevel, LoggingConfig};
pub use rates::RatesConfig;
pub use scrape::ScrapeConfig;
pub use store::StoreConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{CatalogProduct, Retailer};

/// Default user agent for all outbound HTTP requests
pub const DEFAULT_USER_AGENT: &str = "PriceWatchBot/1.0 (+https://github.com/pricewatch)";

/// Which extraction strategy a retailer's adapter uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Structured product API returning well-typed JSON
    Api,
    /// Semi-structured JSON search endpoint with loosely named fields
    Search,
    /// Regex extraction over raw HTML search pages
    Html,
}

/// Adapter binding for one retailer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub kind: AdapterKind,
    /// Endpoint the adapter queries; products are appended as query params
    pub endpoint: String,
}

/// One retailer registry entry: metadata plus its adapter binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerEntry {
    #[serde(flatten)]
    pub retailer: Retailer,
    pub adapter: AdapterEntry,
}

/// Main configuration for a PriceWatch deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the product catalog JSON file
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// Scrape pacing, retry, and timeout configuration
    #[serde(default)]
    pub scrape: ScrapeConfig,
    /// Deal detection configuration
    #[serde(default)]
    pub deals: DealConfig,
    /// Exchange rate table for the fixed rate provider
    #[serde(default)]
    pub rates: RatesConfig,
    /// Price store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Retailer registry; read-only input to the pipeline
    #[serde(default)]
    pub retailers: Vec<RetailerEntry>,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("catalog.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            scrape: ScrapeConfig::default(),
            deals: DealConfig::default(),
            rates: RatesConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
            retailers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together so the
    /// operator can fix everything in one pass rather than playing
    /// whack-a-mole.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Scrape validation
        if self.scrape.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.scrape.max_attempts == 0 {
            errors.push("max_attempts must be at least 1".to_string());
        }
        if self.scrape.retry_max_delay_ms < self.scrape.retry_base_delay_ms {
            errors.push(format!(
                "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
                self.scrape.retry_max_delay_ms, self.scrape.retry_base_delay_ms
            ));
        }
        if self.scrape.sample_size == Some(0) {
            errors.push("sample_size, when set, must be positive".to_string());
        }

        // Deal detection validation
        if self.deals.window_days == 0 {
            errors.push("window_days must be positive".to_string());
        }
        if self.deals.min_savings_percentage <= 0.0 || self.deals.min_savings_percentage > 100.0 {
            errors.push("min_savings_percentage must be in (0, 100]".to_string());
        }

        // Rates validation
        if self.rates.base.is_empty() {
            errors.push("rates.base currency must not be empty".to_string());
        }
        for (currency, rate) in &self.rates.rates {
            if *rate <= 0.0 {
                errors.push(format!("rate for {} must be positive, got {}", currency, rate));
            }
        }

        // Store validation
        if self.store.db_path.as_os_str().is_empty() {
            errors.push("db_path must not be empty".to_string());
        }

        // Retailer registry validation
        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_domains = std::collections::HashSet::new();
        for entry in &self.retailers {
            let r = &entry.retailer;
            if !seen_ids.insert(r.id.clone()) {
                errors.push(format!("duplicate retailer id '{}'", r.id));
            }
            if !seen_domains.insert(r.domain.clone()) {
                errors.push(format!("duplicate retailer domain '{}'", r.domain));
            }
            if !(0.0..=5.0).contains(&r.overall_trust_rating) {
                errors.push(format!(
                    "retailer '{}': overall_trust_rating must be in [0, 5]",
                    r.id
                ));
            }
            if !(0.0..=1.0).contains(&r.authenticity_score) {
                errors.push(format!(
                    "retailer '{}': authenticity_score must be in [0, 1]",
                    r.id
                ));
            }
            if !(0.0..=100.0).contains(&r.commission_rate) {
                errors.push(format!(
                    "retailer '{}': commission_rate must be in [0, 100]",
                    r.id
                ));
            }
            if !r.tracking_param.contains('=') {
                errors.push(format!(
                    "retailer '{}': tracking_param must be a 'key=value' string",
                    r.id
                ));
            }
            if r.cookie_duration_days == 0 {
                errors.push(format!(
                    "retailer '{}': cookie_duration_days must be positive",
                    r.id
                ));
            }
            if url::Url::parse(&entry.adapter.endpoint).is_err() {
                errors.push(format!(
                    "retailer '{}': adapter endpoint '{}' is not a valid URL",
                    r.id, entry.adapter.endpoint
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// Retailers eligible for a scrape batch, in registry order.
    pub fn enabled_retailers(&self) -> Vec<&RetailerEntry> {
        self.retailers
            .iter()
            .filter(|e| e.retailer.active && e.retailer.scraping_enabled)
            .collect()
    }

    /// Look up a retailer by id.
    pub fn retailer(&self, id: &str) -> Option<&Retailer> {
        self.retailers
            .iter()
            .map(|e| &e.retailer)
            .find(|r| r.id == id)
    }
}

/// Load the product catalog from a JSON file.
///
/// The catalog is the external source of truth; products with an empty
/// brand or name cannot be matched and are rejected up front.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogProduct>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file '{}'", path.display()))?;
    let catalog: Vec<CatalogProduct> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog file '{}'", path.display()))?;

    for product in &catalog {
        if product.brand.trim().is_empty() || product.name.trim().is_empty() {
            anyhow::bail!(
                "Catalog product '{}' has an empty brand or name",
                product.id
            );
        }
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_retailer_entry(id: &str, domain: &str) -> RetailerEntry {
        RetailerEntry {
            retailer: Retailer {
                id: id.to_string(),
                domain: domain.to_string(),
                display_name: id.to_uppercase(),
                active: true,
                scraping_enabled: true,
                shipping_cost: 4.99,
                processing_days: 2,
                overall_trust_rating: 4.2,
                authenticity_score: 0.9,
                commission_rate: 8.0,
                tracking_param: "aff=pricewatch".to_string(),
                cookie_duration_days: 30,
            },
            adapter: AdapterEntry {
                kind: AdapterKind::Api,
                endpoint: format!("https://{}/api/products", domain),
            },
        }
    }

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.retailers = vec![
            test_retailer_entry("shop-a", "shop-a.example.com"),
            test_retailer_entry("shop-b", "shop-b.example.com"),
        ];
        cfg
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut cfg = valid_config();
        cfg.scrape.request_timeout_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs must be positive"));
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut cfg = valid_config();
        cfg.scrape.max_attempts = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts must be at least 1"));
    }

    #[test]
    fn validate_rejects_duplicate_retailer_id() {
        let mut cfg = valid_config();
        cfg.retailers
            .push(test_retailer_entry("shop-a", "shop-c.example.com"));
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate retailer id 'shop-a'"));
    }

    #[test]
    fn validate_rejects_trust_rating_out_of_range() {
        let mut cfg = valid_config();
        cfg.retailers[0].retailer.overall_trust_rating = 6.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("overall_trust_rating"));
    }

    #[test]
    fn validate_rejects_malformed_tracking_param() {
        let mut cfg = valid_config();
        cfg.retailers[0].retailer.tracking_param = "not-a-pair".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tracking_param"));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let mut cfg = valid_config();
        cfg.scrape.request_timeout_secs = 0;
        cfg.deals.window_days = 0;
        cfg.retailers[1].retailer.commission_rate = 150.0;
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("request_timeout_secs"));
        assert!(msg.contains("window_days"));
        assert!(msg.contains("commission_rate"));
    }

    #[test]
    fn enabled_retailers_filters_inactive_and_disabled() {
        let mut cfg = valid_config();
        cfg.retailers[0].retailer.active = false;
        cfg.retailers
            .push(test_retailer_entry("shop-c", "shop-c.example.com"));
        cfg.retailers[2].retailer.scraping_enabled = false;

        let enabled: Vec<&str> = cfg
            .enabled_retailers()
            .iter()
            .map(|e| e.retailer.id.as_str())
            .collect();
        assert_eq!(enabled, vec!["shop-b"]);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = valid_config();
        let serialized = toml::to_string(&cfg).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.retailers.len(), 2);
        assert_eq!(parsed.retailers[0].retailer.id, "shop-a");
        assert_eq!(parsed.retailers[0].adapter.kind, AdapterKind::Api);
        assert!(parsed.validate().is_ok());
    }
}
