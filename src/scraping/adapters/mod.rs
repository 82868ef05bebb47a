//! Concrete retailer adapters, one per extraction tier

mod api;
mod html;
mod search;

pub use api::ApiAdapter;
pub use html::HtmlAdapter;
pub use search::SearchAdapter;

use std::sync::Arc;

use super::adapter::AdapterRegistry;
use super::fetcher::HttpFetcher;
use crate::config::{AdapterKind, RetailerEntry};

/// Build the adapter registry from the retailer registry entries.
///
/// Every entry gets an adapter keyed by its domain; the adapter kind picks
/// the extraction tier.
pub fn build_registry(
    entries: &[RetailerEntry],
    fetcher: Arc<HttpFetcher>,
    default_currency: &str,
) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for entry in entries {
        let domain = entry.retailer.domain.clone();
        match entry.adapter.kind {
            AdapterKind::Api => registry.register(
                domain.clone(),
                Arc::new(ApiAdapter::new(
                    domain,
                    entry.adapter.endpoint.clone(),
                    Arc::clone(&fetcher),
                )),
            ),
            AdapterKind::Search => registry.register(
                domain.clone(),
                Arc::new(SearchAdapter::new(
                    domain,
                    entry.adapter.endpoint.clone(),
                    Arc::clone(&fetcher),
                    default_currency.to_string(),
                )),
            ),
            AdapterKind::Html => registry.register(
                domain.clone(),
                Arc::new(HtmlAdapter::new(
                    domain,
                    entry.adapter.endpoint.clone(),
                    Arc::clone(&fetcher),
                )),
            ),
        }
    }
    registry
}
