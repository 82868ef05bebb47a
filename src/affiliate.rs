//! Affiliate attribution engine
//!
//! Two halves: best-offer selection over the latest day's price records
//! (landed cost, ascending), and link/commission resolution with click
//! tracking. Client-side attribution is last-seen-wins with a per-retailer
//! expiry equal to that retailer's cookie duration.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::store::{PriceStore, StoreError};
use crate::types::{AffiliateLink, PriceRecord, ProductId, Retailer, RetailerId};

#[derive(Debug, Error)]
pub enum AffiliateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown retailer '{0}'")]
    UnknownRetailer(RetailerId),
    #[error("no price records for product '{0}'")]
    NoOffers(ProductId),
}

/// One retailer's offer for a product, with landed cost.
#[derive(Debug, Clone)]
pub struct Offer {
    pub retailer_id: RetailerId,
    pub retailer_name: String,
    pub price: f64,
    pub shipping_cost: f64,
    pub total_cost: f64,
    pub in_stock: bool,
    pub trust_rating: f64,
}

/// Rank offers by landed cost ascending.
///
/// Ties on total cost are broken by trust rating descending, then retailer
/// name ascending, for determinism. The tie-break is a provisional project
/// decision, isolated here so it can change in one place.
pub fn rank_offers(records: &[PriceRecord], retailers: &[Retailer]) -> Vec<Offer> {
    let by_id: HashMap<&str, &Retailer> =
        retailers.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut offers: Vec<Offer> = records
        .iter()
        .filter_map(|record| {
            let retailer = by_id.get(record.retailer_id.as_str())?;
            Some(Offer {
                retailer_id: record.retailer_id.clone(),
                retailer_name: retailer.display_name.clone(),
                price: record.current_price,
                shipping_cost: record.shipping_cost,
                total_cost: record.current_price + record.shipping_cost,
                in_stock: record.in_stock,
                trust_rating: retailer.overall_trust_rating,
            })
        })
        .collect();

    offers.sort_by(|a, b| {
        a.total_cost
            .partial_cmp(&b.total_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.trust_rating
                    .partial_cmp(&a.trust_rating)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.retailer_name.cmp(&b.retailer_name))
    });
    offers
}

/// Affiliate URL per the tracking-parameter convention:
/// the literal `key=value` tracking param is appended with `&` when the
/// direct URL already carries a query string, `?` otherwise.
pub fn build_affiliate_url(direct_url: &str, tracking_param: &str) -> String {
    let has_query = match Url::parse(direct_url) {
        Ok(url) => url.query().is_some(),
        Err(_) => direct_url.contains('?'),
    };
    let separator = if has_query { '&' } else { '?' };
    format!("{}{}{}", direct_url, separator, tracking_param)
}

/// Commission owed for a conversion at `price` under a percent rate.
pub fn commission(price: f64, commission_rate: f64) -> f64 {
    price * commission_rate / 100.0
}

/// Best-offer selection and link resolution over the price store.
pub struct AffiliateEngine<'a> {
    store: &'a PriceStore,
    retailers: &'a [Retailer],
}

impl<'a> AffiliateEngine<'a> {
    pub fn new(store: &'a PriceStore, retailers: &'a [Retailer]) -> Self {
        Self { store, retailers }
    }

    /// All offers for a product on the latest scraped day, best first.
    pub fn offers(&self, product_id: &str) -> Result<Vec<Offer>, AffiliateError> {
        let Some(date) = self.store.latest_date()? else {
            return Err(AffiliateError::NoOffers(product_id.to_string()));
        };
        let records = self.store.records_for_product_on(product_id, date)?;
        if records.is_empty() {
            return Err(AffiliateError::NoOffers(product_id.to_string()));
        }
        Ok(rank_offers(&records, self.retailers))
    }

    /// The minimum landed-cost offer for a product.
    ///
    /// Records whose retailer is no longer in the registry cannot be ranked,
    /// so an empty ranking is possible even with price history present.
    pub fn best_offer(&self, product_id: &str) -> Result<Offer, AffiliateError> {
        self.offers(product_id)?
            .into_iter()
            .next()
            .ok_or_else(|| AffiliateError::NoOffers(product_id.to_string()))
    }

    /// Look up or lazily create the affiliate link for a (product, retailer)
    /// pair. Idempotent: the first creation wins and later calls reuse it.
    pub fn resolve_link(
        &self,
        product_id: &str,
        retailer_id: &str,
    ) -> Result<AffiliateLink, AffiliateError> {
        let retailer = self
            .retailers
            .iter()
            .find(|r| r.id == retailer_id)
            .ok_or_else(|| AffiliateError::UnknownRetailer(retailer_id.to_string()))?;

        let direct_url = format!("https://{}/products/{}", retailer.domain, product_id);
        let candidate = AffiliateLink {
            product_id: product_id.to_string(),
            retailer_id: retailer_id.to_string(),
            affiliate_url: build_affiliate_url(&direct_url, &retailer.tracking_param),
            direct_url,
            commission_rate: retailer.commission_rate,
            click_count: 0,
            is_active: true,
            created_at: Utc::now(),
        };

        let link = self.store.get_or_create_link(&candidate)?;
        debug!(
            product = %product_id,
            retailer = %retailer_id,
            url = %link.affiliate_url,
            "Affiliate link resolved"
        );
        Ok(link)
    }

    /// Record a click-through on a pair's link. Monotonic.
    pub fn record_click(&self, product_id: &str, retailer_id: &str) -> Result<u64, AffiliateError> {
        Ok(self.store.record_click(product_id, retailer_id)?)
    }
}

// ----------------------------------------------------------------------
// Client-side attribution
// ----------------------------------------------------------------------

/// One attribution stamp held client-side for a retailer's program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribution {
    pub timestamp: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
}

/// Client-held attribution state deciding which retailer's program receives
/// commission credit for a conversion.
///
/// Last seen wins: visiting a second retailer's link overwrites nothing but
/// stamps a newer timestamp, and the most recent unexpired stamp takes the
/// credit. Expired entries are discarded and cleared at read time; there is
/// no background sweep.
#[derive(Debug, Default)]
pub struct AttributionStore {
    entries: HashMap<String, Attribution>,
}

impl AttributionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage key convention: one entry per retailer.
    pub fn storage_key(retailer_name: &str) -> String {
        format!("affiliate_{}", retailer_name)
    }

    /// Stamp a visit through a retailer's affiliate link.
    pub fn record_visit(&mut self, retailer: &Retailer, now: DateTime<Utc>) {
        let attribution = Attribution {
            timestamp: now,
            expiry: now + Duration::days(retailer.cookie_duration_days as i64),
        };
        self.entries
            .insert(Self::storage_key(&retailer.display_name), attribution);
    }

    /// Read a retailer's attribution, discarding and clearing it when the
    /// expiry has passed.
    pub fn attribution(&mut self, retailer_name: &str, now: DateTime<Utc>) -> Option<Attribution> {
        let key = Self::storage_key(retailer_name);
        match self.entries.get(&key) {
            Some(entry) if entry.expiry > now => Some(*entry),
            Some(_) => {
                self.entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// The retailer credited for a conversion right now: the most recently
    /// stamped unexpired entry.
    pub fn credited_retailer(&mut self, now: DateTime<Utc>) -> Option<String> {
        self.entries.retain(|_, entry| entry.expiry > now);
        self.entries
            .iter()
            .max_by_key(|(_, entry)| entry.timestamp)
            .map(|(key, _)| {
                key.strip_prefix("affiliate_")
                    .unwrap_or(key)
                    .to_string()
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
