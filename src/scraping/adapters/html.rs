//! Regex-over-HTML adapter
//!
//! Best-effort extraction for retailers with no usable endpoint: fetch the
//! search results page and pull listings out of product cards with regexes.
//! This is the lowest-confidence tier and makes no attempt to defeat
//! anti-automation defenses or render JavaScript.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::scraping::adapter::{
    AdapterError, ExtractionMethod, ListingBatch, RetailerAdapter,
};
use crate::scraping::fetcher::HttpFetcher;
use crate::types::{CatalogProduct, DataSource, RawListing};

/// Adapter extracting listings from raw HTML search pages.
pub struct HtmlAdapter {
    name: String,
    endpoint: String,
    fetcher: Arc<HttpFetcher>,
    card_re: Regex,
    link_re: Regex,
    price_re: Regex,
    oos_re: Regex,
}

impl HtmlAdapter {
    pub fn new(name: String, endpoint: String, fetcher: Arc<HttpFetcher>) -> Self {
        // Regexes are infallible literals; compiled once per adapter.
        let card_re = Regex::new(
            r#"(?s)<(?:div|li|article)[^>]*class="[^"]*(?:product|result|item)[^"]*"[^>]*>(.*?)</(?:div|li|article)>"#,
        )
        .expect("static card regex");
        let link_re =
            Regex::new(r#"(?s)<a[^>]+href="([^"]+)"[^>]*>\s*([^<]+?)\s*</a>"#).expect("static link regex");
        let price_re =
            Regex::new(r"([$€£])\s?([0-9]+(?:,[0-9]{3})*(?:\.[0-9]{1,2})?)").expect("static price regex");
        let oos_re = Regex::new(r"(?i)out[\s_-]?of[\s_-]?stock|sold[\s_-]?out").expect("static oos regex");

        Self {
            name,
            endpoint,
            fetcher,
            card_re,
            link_re,
            price_re,
            oos_re,
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

    fn currency_for_symbol(symbol: &str) -> &'static str {
        match symbol {
            "€" => "EUR",
            "£" => "GBP",
            _ => "USD",
        }
    }

    /// Pull listings out of the page, one per product card that carries both
    /// a link and a price.
    fn extract(&self, product: &CatalogProduct, html: &str) -> Result<Vec<RawListing>, AdapterError> {
        let mut listings = Vec::new();

        for card in self.card_re.captures_iter(html) {
            let body = &card[1];
            let Some(link) = self.link_re.captures(body) else {
                continue;
            };
            let Some(price) = self.price_re.captures(body) else {
                continue;
            };

            let amount: f64 = match price[2].replace(',', "").parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            if amount <= 0.0 {
                continue;
            }

            listings.push(RawListing {
                name: link[2].trim().to_string(),
                price: amount,
                currency: Self::currency_for_symbol(&price[1]).to_string(),
                in_stock: !self.oos_re.is_match(body),
                url: link[1].to_string(),
                sku: None,
                original_price: None,
            });
        }

        if listings.is_empty() {
            return Err(AdapterError::Parse {
                product: product.id.clone(),
                reason: "no product card with a price found in page".to_string(),
            });
        }
        Ok(listings)
    }
}

#[async_trait]
impl RetailerAdapter for HtmlAdapter {
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

            match self.fetcher.get_text(&url).await {
                Ok(html) => match self.extract(product, &html) {
                    Ok(listings) => {
                        debug!(
                            adapter = %self.name,
                            product = %product.id,
                            count = listings.len(),
                            "HTML listings extracted"
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
        ExtractionMethod::HtmlRegex
    }

    fn name(&self) -> &str {
        &self.name
    }
}
