//! Price normalization and the confidence model
//!
//! Converts a resolved (product, listing) pair into a canonical
//! `PriceRecord`: currency conversion through an injected rate provider,
//! plus a confidence score fixed by how the value was obtained. Confidence
//! is a property of the extraction, stored verbatim and never re-derived.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::RatesConfig;
use crate::resolve::Match;
use crate::scraping::adapter::ExtractionMethod;
use crate::types::{CatalogProduct, DataSource, PriceRecord, Retailer, StockLevel};

/// Exchange rate source.
///
/// No live-rate fetching happens in this crate; staleness is the provider's
/// responsibility by contract.
pub trait RateProvider: Send + Sync {
    /// Units of `to` per one unit of `from`, or `None` when either currency
    /// is unknown to the provider.
    fn rate(&self, from: &str, to: &str) -> Option<f64>;
}

/// Rate provider backed by a static table from the config.
pub struct FixedRateProvider {
    base: String,
    /// currency code (upper case) -> units of base per unit
    to_base: HashMap<String, f64>,
}

impl FixedRateProvider {
    pub fn new(base: impl Into<String>, to_base: HashMap<String, f64>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            to_base: to_base
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect(),
        }
    }

    pub fn from_config(config: &RatesConfig) -> Self {
        Self::new(config.base.clone(), config.rates.clone())
    }

    fn in_base(&self, currency: &str) -> Option<f64> {
        if currency == self.base {
            return Some(1.0);
        }
        self.to_base.get(currency).copied()
    }
}

impl RateProvider for FixedRateProvider {
    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Some(1.0);
        }
        Some(self.in_base(&from)? / self.in_base(&to)?)
    }
}

/// Multiplier applied when the resolver fell back to an unmatched listing
const FALLBACK_MATCH_FACTOR: f64 = 0.8;

impl ExtractionMethod {
    /// Baseline confidence for values obtained via this method.
    pub fn base_confidence(&self) -> f64 {
        match self {
            ExtractionMethod::StructuredApi => 0.92,
            ExtractionMethod::JsonParse => 0.75,
            ExtractionMethod::HtmlRegex => 0.65,
        }
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no exchange rate from {from} to {to}")]
    UnknownCurrency { from: String, to: String },
    #[error("listing price {0} is not positive")]
    InvalidPrice(f64),
}

/// Builds canonical price records from resolved listings.
pub struct PriceNormalizer {
    rates: Arc<dyn RateProvider>,
    target_currency: String,
}

impl PriceNormalizer {
    pub fn new(rates: Arc<dyn RateProvider>, target_currency: impl Into<String>) -> Self {
        Self {
            rates,
            target_currency: target_currency.into(),
        }
    }

    pub fn target_currency(&self) -> &str {
        &self.target_currency
    }

    /// Convert a resolved listing into a `PriceRecord` stamped with the
    /// batch's run date.
    pub fn normalize(
        &self,
        product: &CatalogProduct,
        retailer: &Retailer,
        resolved: &Match<'_>,
        source: DataSource,
        method: ExtractionMethod,
        price_date: NaiveDate,
    ) -> Result<PriceRecord, NormalizeError> {
        let listing = resolved.listing;
        if listing.price <= 0.0 {
            return Err(NormalizeError::InvalidPrice(listing.price));
        }

        let rate = self
            .rates
            .rate(&listing.currency, &self.target_currency)
            .ok_or_else(|| NormalizeError::UnknownCurrency {
                from: listing.currency.clone(),
                to: self.target_currency.clone(),
            })?;

        let current_price = round_cents(listing.price * rate);
        let original_price = listing
            .original_price
            .filter(|p| *p > 0.0)
            .map(|p| round_cents(p * rate));
        // A listed price below the original is a sale price by definition.
        let sale_price = original_price
            .filter(|original| *original > current_price)
            .map(|_| current_price);

        let mut confidence = method.base_confidence();
        if !resolved.exact {
            confidence *= FALLBACK_MATCH_FACTOR;
        }

        let stock_level = if listing.in_stock {
            StockLevel::Medium
        } else {
            StockLevel::OutOfStock
        };

        Ok(PriceRecord {
            product_id: product.id.clone(),
            retailer_id: retailer.id.clone(),
            price_date,
            current_price,
            original_price,
            sale_price,
            in_stock: listing.in_stock,
            stock_level,
            confidence,
            data_source: source,
            shipping_cost: retailer.shipping_cost,
            shipping_time_days: retailer.processing_days,
        })
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawListing;

    fn rates() -> Arc<FixedRateProvider> {
        let mut table = HashMap::new();
        table.insert("USD".to_string(), 1.0);
        table.insert("EUR".to_string(), 1.08);
        table.insert("GBP".to_string(), 1.27);
        Arc::new(FixedRateProvider::new("USD", table))
    }

    fn retailer() -> Retailer {
        Retailer {
            id: "shop-a".to_string(),
            domain: "shop-a.example.com".to_string(),
            display_name: "Shop A".to_string(),
            active: true,
            scraping_enabled: true,
            shipping_cost: 4.99,
            processing_days: 2,
            overall_trust_rating: 4.0,
            authenticity_score: 0.9,
            commission_rate: 8.0,
            tracking_param: "aff=pw".to_string(),
            cookie_duration_days: 30,
        }
    }

    fn product() -> CatalogProduct {
        CatalogProduct {
            id: "p1".to_string(),
            brand: "COSRX".to_string(),
            name: "Snail Mucin Essence".to_string(),
            ingredients: vec![],
        }
    }

    fn listing(price: f64, currency: &str) -> RawListing {
        RawListing {
            name: "COSRX Snail Essence".to_string(),
            price,
            currency: currency.to_string(),
            in_stock: true,
            url: "https://shop-a.example.com/p/1".to_string(),
            sku: None,
            original_price: None,
        }
    }

    fn normalizer() -> PriceNormalizer {
        PriceNormalizer::new(rates(), "USD")
    }

    #[test]
    fn same_currency_passes_through() {
        let l = listing(19.99, "USD");
        let m = Match {
            listing: &l,
            exact: true,
        };
        let record = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Api,
                ExtractionMethod::StructuredApi,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap();
        assert_eq!(record.current_price, 19.99);
        assert_eq!(record.shipping_cost, 4.99);
        assert_eq!(record.shipping_time_days, 2);
    }

    #[test]
    fn converts_through_the_rate_provider() {
        let l = listing(10.0, "EUR");
        let m = Match {
            listing: &l,
            exact: true,
        };
        let record = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Scraping,
                ExtractionMethod::JsonParse,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap();
        assert_eq!(record.current_price, 10.80);
    }

    #[test]
    fn cross_rate_goes_through_the_base() {
        let provider = rates();
        let rate = provider.rate("GBP", "EUR").unwrap();
        assert!((rate - 1.27 / 1.08).abs() < 1e-9);
    }

    #[test]
    fn unknown_currency_is_an_error() {
        let l = listing(100.0, "XYZ");
        let m = Match {
            listing: &l,
            exact: true,
        };
        let err = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Scraping,
                ExtractionMethod::JsonParse,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownCurrency { .. }));
    }

    #[test]
    fn api_confidence_exceeds_html_regex_confidence() {
        let l = listing(10.0, "USD");
        let m = Match {
            listing: &l,
            exact: true,
        };
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let n = normalizer();

        let api = n
            .normalize(&product(), &retailer(), &m, DataSource::Api, ExtractionMethod::StructuredApi, date)
            .unwrap();
        let html = n
            .normalize(&product(), &retailer(), &m, DataSource::Scraping, ExtractionMethod::HtmlRegex, date)
            .unwrap();
        assert!(api.confidence > html.confidence);
    }

    #[test]
    fn fallback_match_caps_confidence_below_the_method_baseline() {
        let l = listing(10.0, "USD");
        let exact = Match {
            listing: &l,
            exact: true,
        };
        let fallback = Match {
            listing: &l,
            exact: false,
        };
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let n = normalizer();

        let a = n
            .normalize(&product(), &retailer(), &exact, DataSource::Scraping, ExtractionMethod::JsonParse, date)
            .unwrap();
        let b = n
            .normalize(&product(), &retailer(), &fallback, DataSource::Scraping, ExtractionMethod::JsonParse, date)
            .unwrap();
        assert!((b.confidence - a.confidence * 0.8).abs() < 1e-9);
    }

    #[test]
    fn discounted_original_price_sets_sale_price() {
        let mut l = listing(15.0, "USD");
        l.original_price = Some(20.0);
        let m = Match {
            listing: &l,
            exact: true,
        };
        let record = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Api,
                ExtractionMethod::StructuredApi,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap();
        assert_eq!(record.original_price, Some(20.0));
        assert_eq!(record.sale_price, Some(15.0));
    }

    #[test]
    fn out_of_stock_listing_maps_to_out_of_stock_level() {
        let mut l = listing(15.0, "USD");
        l.in_stock = false;
        let m = Match {
            listing: &l,
            exact: true,
        };
        let record = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Api,
                ExtractionMethod::StructuredApi,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap();
        assert!(!record.in_stock);
        assert_eq!(record.stock_level, StockLevel::OutOfStock);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let l = listing(0.0, "USD");
        let m = Match {
            listing: &l,
            exact: true,
        };
        let err = normalizer()
            .normalize(
                &product(),
                &retailer(),
                &m,
                DataSource::Api,
                ExtractionMethod::StructuredApi,
                NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidPrice(_)));
    }
}
