//! Semi-structured JSON search endpoint adapter
//!
//! For retailers whose search endpoint returns JSON with loosely named
//! fields. Extraction is tolerant: field names vary, prices may be strings,
//! and items missing essentials are skipped rather than failing the call.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::scraping::adapter::{
    AdapterError, ExtractionMethod, ListingBatch, RetailerAdapter,
};
use crate::scraping::fetcher::HttpFetcher;
use crate::types::{CatalogProduct, DataSource, RawListing};

/// Adapter for retailers with a semi-structured JSON search endpoint.
pub struct SearchAdapter {
    name: String,
    endpoint: String,
    fetcher: Arc<HttpFetcher>,
    /// Assumed when an item carries no currency field
    default_currency: String,
}

impl SearchAdapter {
    pub fn new(
        name: String,
        endpoint: String,
        fetcher: Arc<HttpFetcher>,
        default_currency: String,
    ) -> Self {
        Self {
            name,
            endpoint,
            fetcher,
            default_currency,
        }
    }

    fn query_url(&self, product: &CatalogProduct) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| AdapterError::Parse {
            product: product.id.clone(),
            reason: format!("bad endpoint '{}': {}", self.endpoint, e),
        })?;
        url.query_pairs_mut()
            .append_pair("q", &format!("{} {}", product.brand, product.name));
        Ok(url)
    }

    fn str_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|k| item.get(*k).and_then(Value::as_str))
    }

    fn price_field(item: &Value, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| match item.get(*k) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_start_matches('$').parse().ok(),
            _ => None,
        })
    }

    fn stock_field(item: &Value) -> bool {
        if let Some(flag) = item
            .get("in_stock")
            .or_else(|| item.get("available"))
            .and_then(Value::as_bool)
        {
            return flag;
        }
        if let Some(s) = Self::str_field(item, &["availability", "stock_status"]) {
            return !s.eq_ignore_ascii_case("out_of_stock") && !s.eq_ignore_ascii_case("sold_out");
        }
        // Retailers rarely surface out-of-stock items in search results.
        true
    }

    /// Extract listings from a search response, skipping items without a
    /// usable name and price.
    fn extract(&self, product: &CatalogProduct, value: &Value) -> Result<Vec<RawListing>, AdapterError> {
        let items = ["results", "items", "products", "hits"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_array))
            .ok_or_else(|| AdapterError::Parse {
                product: product.id.clone(),
                reason: "no result array in search response".to_string(),
            })?;

        let mut listings = Vec::new();
        for item in items {
            let Some(name) = Self::str_field(item, &["name", "title", "product_name"]) else {
                continue;
            };
            let Some(price) = Self::price_field(item, &["price", "current_price", "sale_price"])
            else {
                continue;
            };
            if price <= 0.0 {
                continue;
            }

            listings.push(RawListing {
                name: name.to_string(),
                price,
                currency: Self::str_field(item, &["currency"])
                    .unwrap_or(&self.default_currency)
                    .to_string(),
                in_stock: Self::stock_field(item),
                url: Self::str_field(item, &["url", "link", "product_url"])
                    .unwrap_or_default()
                    .to_string(),
                sku: Self::str_field(item, &["sku", "id"]).map(str::to_string),
                original_price: Self::price_field(item, &["original_price", "was_price", "list_price"]),
            });
        }

        if listings.is_empty() {
            return Err(AdapterError::Parse {
                product: product.id.clone(),
                reason: "search returned no items with a name and price".to_string(),
            });
        }
        Ok(listings)
    }
}

#[async_trait]
impl RetailerAdapter for SearchAdapter {
    async fn fetch_listings(&self, products: &[CatalogProduct]) -> ListingBatch {
        let mut batch = ListingBatch::default();

        for product in products {
            let url = match self.query_url(product) {
                Ok(url) => url,
                Err(e) => {
                    batch.errors.push(e);
                    continue;
                }
            };

            match self.fetcher.get_json(&url).await {
                Ok(value) => match self.extract(product, &value) {
                    Ok(listings) => {
                        debug!(
                            adapter = %self.name,
                            product = %product.id,
                            count = listings.len(),
                            "search listings extracted"
                        );
                        batch.listings.extend(listings);
                    }
                    Err(e) => batch.errors.push(e),
                },
                Err(e) => batch.errors.push(AdapterError::Unavailable(e)),
            }
        }

        batch
    }

    fn data_source(&self) -> DataSource {
        DataSource::Scraping
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::JsonParse
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> SearchAdapter {
        let fetcher = crate::scraping::fetcher::shared_fetcher(&Default::default()).unwrap();
        SearchAdapter::new(
            "shop.example.com".to_string(),
            "https://shop.example.com/search".to_string(),
            fetcher,
            "USD".to_string(),
        )
    }

    fn product() -> CatalogProduct {
        CatalogProduct {
            id: "p1".to_string(),
            brand: "COSRX".to_string(),
            name: "Snail Mucin Essence".to_string(),
            ingredients: vec![],
        }
    }

    #[test]
    fn extracts_loosely_named_fields() {
        let value = json!({
            "items": [
                {
                    "title": "COSRX Snail Essence 100ml",
                    "current_price": "24.50",
                    "link": "https://shop.example.com/i/1",
                    "availability": "in_stock"
                },
                {
                    "name": "Other Cream",
                    "price": 10.0,
                    "currency": "EUR",
                    "url": "https://shop.example.com/i/2"
                }
            ]
        });

        let listings = adapter().extract(&product(), &value).unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].price, 24.50);
        assert_eq!(listings[0].currency, "USD");
        assert_eq!(listings[1].currency, "EUR");
    }

    #[test]
    fn skips_items_without_price() {
        let value = json!({
            "results": [
                { "name": "No price here" },
                { "name": "Priced", "price": 8.0, "url": "u" }
            ]
        });

        let listings = adapter().extract(&product(), &value).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].name, "Priced");
    }

    #[test]
    fn preserves_endpoint_item_order() {
        let value = json!({
            "results": [
                { "name": "First", "price": 3.0 },
                { "name": "Second", "price": 2.0 },
                { "name": "Third", "price": 1.0 }
            ]
        });

        let listings = adapter().extract(&product(), &value).unwrap();
        let names: Vec<&str> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn no_result_array_is_a_parse_failure() {
        let err = adapter().extract(&product(), &json!({})).unwrap_err();
        assert!(matches!(err, AdapterError::Parse { .. }));
    }

    #[test]
    fn all_items_unusable_is_a_parse_failure() {
        let value = json!({ "results": [ { "name": "x", "price": -2.0 } ] });
        let err = adapter().extract(&product(), &value).unwrap_err();
        assert!(matches!(err, AdapterError::Parse { .. }));
    }
}
