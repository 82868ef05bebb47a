//! Core types for the PriceWatch pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a catalog product
pub type ProductId = String;

/// Unique identifier for a retailer
pub type RetailerId = String;

/// Retailer metadata from the registry.
///
/// Owned by operators and read-only to the pipeline; lifecycle management
/// (adding/retiring retailers) happens outside this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retailer {
    pub id: RetailerId,
    /// Retailer domain, also the adapter registry key
    pub domain: String,
    pub display_name: String,
    /// Retailer is live at all
    pub active: bool,
    /// Retailer participates in scrape batches
    pub scraping_enabled: bool,
    /// Default shipping cost applied to every offer, in the base currency
    pub shipping_cost: f64,
    /// Typical order processing time in days
    pub processing_days: u32,
    /// Operator-maintained trust rating, 0.0..=5.0
    pub overall_trust_rating: f64,
    /// Likelihood the retailer sells authentic stock, 0.0..=1.0
    pub authenticity_score: f64,
    /// Affiliate commission rate in percent
    pub commission_rate: f64,
    /// Literal `key=value` affiliate tracking parameter
    pub tracking_param: String,
    /// Attribution cookie lifetime for this retailer's program
    pub cookie_duration_days: u32,
}

/// A product from the catalog of record.
///
/// External source of truth; assumed supplied and immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub brand: String,
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
}

/// A raw, unnormalized candidate listing as reported by a retailer.
///
/// Transient: lives only between the adapter and the normalizer, never
/// persisted.
#[derive(Debug, Clone)]
pub struct RawListing {
    /// Retailer-side product name
    pub name: String,
    /// Price in the retailer's currency
    pub price: f64,
    /// ISO 4217 currency code as reported
    pub currency: String,
    pub in_stock: bool,
    pub url: String,
    pub sku: Option<String>,
    /// Pre-discount price when the retailer reports one
    pub original_price: Option<f64>,
}

/// Coarse stock availability bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    High,
    Medium,
    Low,
    OutOfStock,
}

impl StockLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockLevel::High => "high",
            StockLevel::Medium => "medium",
            StockLevel::Low => "low",
            StockLevel::OutOfStock => "out_of_stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(StockLevel::High),
            "medium" => Some(StockLevel::Medium),
            "low" => Some(StockLevel::Low),
            "out_of_stock" => Some(StockLevel::OutOfStock),
            _ => None,
        }
    }
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a price value entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Scraping,
    Api,
    Manual,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Scraping => "scraping",
            DataSource::Api => "api",
            DataSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scraping" => Some(DataSource::Scraping),
            "api" => Some(DataSource::Api),
            "manual" => Some(DataSource::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized price observation.
///
/// At most one record exists per `(product_id, retailer_id, price_date)`;
/// a second write for the same key updates in place, so the table forms an
/// append-only-by-day time series per (product, retailer) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: ProductId,
    pub retailer_id: RetailerId,
    /// Day-granularity key, assigned from the batch run's start time
    pub price_date: NaiveDate,
    /// Normalized to the base currency
    pub current_price: f64,
    pub original_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub in_stock: bool,
    pub stock_level: StockLevel,
    /// Trust in how this value was obtained, 0.0..=1.0.
    /// A property of the extraction, stored verbatim, never re-derived.
    pub confidence: f64,
    pub data_source: DataSource,
    pub shipping_cost: f64,
    pub shipping_time_days: u32,
}

/// Presentation status of a deal alert; the only mutable field after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AlertStatus::Active),
            "dismissed" => Some(AlertStatus::Dismissed),
            _ => None,
        }
    }
}

/// A detected price drop, derived from the price history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealAlert {
    pub product_id: ProductId,
    pub retailer_id: RetailerId,
    pub current_price: f64,
    pub previous_price: f64,
    pub savings_amount: f64,
    pub savings_percentage: f64,
    /// 0..=100, linear in savings and saturating at 50% off
    pub deal_score: u8,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

/// An affiliate link for a (product, retailer) pair.
///
/// Created lazily the first time the pair needs attribution; subsequent
/// lookups reuse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffiliateLink {
    pub product_id: ProductId,
    pub retailer_id: RetailerId,
    pub affiliate_url: String,
    pub direct_url: String,
    pub commission_rate: f64,
    /// Monotonically increasing, never decremented
    pub click_count: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
