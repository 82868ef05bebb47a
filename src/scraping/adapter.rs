//! Retailer adapter contract and registry
//!
//! One adapter per retailer translates a catalog query into raw candidate
//! listings. The contract requires adapters to never fail wholesale for a
//! single product: per-product failures are accumulated and whatever could
//! be extracted is returned.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::fetcher::FetchError;
use crate::types::{CatalogProduct, DataSource, RawListing};

/// Errors an adapter can accumulate while fetching listings
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network or HTTP failure reaching the retailer; retried by the
    /// orchestrator when the whole call produced nothing.
    #[error("retailer unavailable: {0}")]
    Unavailable(#[from] FetchError),

    /// The expected price pattern was absent from a response. The product is
    /// skipped and counted against coverage; not a retailer-level failure
    /// unless every product fails.
    #[error("no usable listing for '{product}': {reason}")]
    Parse { product: String, reason: String },
}

impl AdapterError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AdapterError::Unavailable(_))
    }
}

/// Everything one adapter call produced: extracted listings in the
/// retailer's original order, plus per-product errors.
#[derive(Debug, Default)]
pub struct ListingBatch {
    pub listings: Vec<RawListing>,
    pub errors: Vec<AdapterError>,
}

impl ListingBatch {
    /// True when the call produced nothing at all; the orchestrator retries
    /// these under its retry policy.
    pub fn is_total_failure(&self) -> bool {
        self.listings.is_empty() && !self.errors.is_empty()
    }
}

/// How an adapter extracted its values; drives the confidence model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Structured API response
    StructuredApi,
    /// Well-structured JSON parsed with tolerant field lookup
    JsonParse,
    /// Best-effort regex over raw HTML
    HtmlRegex,
}

/// Per-retailer adapter translating a catalog query into raw listings.
#[async_trait]
pub trait RetailerAdapter: Send + Sync {
    /// Fetch candidate listings for the given catalog subset.
    ///
    /// Must not fail wholesale for a single product failure; errors are
    /// accumulated in the returned batch alongside whatever was extracted.
    /// Side effects are limited to outbound HTTP calls, which are paced by
    /// the shared fetcher.
    async fn fetch_listings(&self, products: &[CatalogProduct]) -> ListingBatch;

    fn data_source(&self) -> DataSource;

    fn method(&self) -> ExtractionMethod;

    /// Adapter name for logging (usually the retailer domain)
    fn name(&self) -> &str;
}

/// Raised when a retailer's domain has no registered adapter.
///
/// Unknown domains fail fast with this explicit error rather than a silent
/// no-op.
#[derive(Debug, Error)]
#[error("no adapter registered for domain '{0}'")]
pub struct NoAdapter(pub String);

/// Mapping from retailer domain to its adapter implementation.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn RetailerAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, domain: impl Into<String>, adapter: Arc<dyn RetailerAdapter>) {
        self.adapters.insert(domain.into(), adapter);
    }

    pub fn get(&self, domain: &str) -> Result<Arc<dyn RetailerAdapter>, NoAdapter> {
        self.adapters
            .get(domain)
            .cloned()
            .ok_or_else(|| NoAdapter(domain.to_string()))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
