//! Structured product API adapter
//!
//! For retailers exposing a JSON product API. Responses deserialize into a
//! typed shape; this is the highest-confidence extraction tier.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::scraping::adapter::{
    AdapterError, ExtractionMethod, ListingBatch, RetailerAdapter,
};
use crate::scraping::fetcher::HttpFetcher;
use crate::types::{CatalogProduct, DataSource, RawListing};

#[derive(Debug, Deserialize)]
struct ApiProduct {
    name: String,
    price: f64,
    currency: String,
    #[serde(default = "default_in_stock")]
    in_stock: bool,
    url: String,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    original_price: Option<f64>,
}

fn default_in_stock() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    products: Vec<ApiProduct>,
}

/// Adapter for retailers with a structured product API.
pub struct ApiAdapter {
    name: String,
    endpoint: String,
    fetcher: Arc<HttpFetcher>,
}

impl ApiAdapter {
    pub fn new(name: String, endpoint: String, fetcher: Arc<HttpFetcher>) -> Self {
        Self {
            name,
            endpoint,
            fetcher,
        }
    }

    fn query_url(&self, product: &CatalogProduct) -> Result<Url, AdapterError> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| AdapterError::Parse {
            product: product.id.clone(),
            reason: format!("bad endpoint '{}': {}", self.endpoint, e),
        })?;
        url.query_pairs_mut()
            .append_pair("brand", &product.brand)
            .append_pair("name", &product.name);
        Ok(url)
    }

    fn parse_response(
        product: &CatalogProduct,
        value: serde_json::Value,
    ) -> Result<Vec<RawListing>, AdapterError> {
        let response: ApiResponse =
            serde_json::from_value(value).map_err(|e| AdapterError::Parse {
                product: product.id.clone(),
                reason: format!("malformed API response: {}", e),
            })?;

        if response.products.is_empty() {
            return Err(AdapterError::Parse {
                product: product.id.clone(),
                reason: "API returned no products".to_string(),
            });
        }

        Ok(response
            .products
            .into_iter()
            .map(|p| RawListing {
                name: p.name,
                price: p.price,
                currency: p.currency,
                in_stock: p.in_stock,
                url: p.url,
                sku: p.sku,
                original_price: p.original_price,
            })
            .collect())
    }
}

#[async_trait]
impl RetailerAdapter for ApiAdapter {
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
                Ok(value) => match Self::parse_response(product, value) {
                    Ok(listings) => {
                        debug!(
                            adapter = %self.name,
                            product = %product.id,
                            count = listings.len(),
                            "API listings extracted"
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
        DataSource::Api
    }

    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::StructuredApi
    }

    fn name(&self) -> &str {
        &self.name
    }
}
