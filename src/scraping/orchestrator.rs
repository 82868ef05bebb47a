//! Batch scrape orchestrator
//!
//! Drives registry -> adapter -> resolver -> normalizer -> store for every
//! enabled retailer, sequentially. Sequential by design: scraping
//! rate-limited, ban-sensitive sources rewards strict pacing over parallel
//! throughput, and it keeps concurrent requests off any single domain.
//! Running independent retailers concurrently (each with its own pacer) is a
//! valid scaling path, but not the default.

use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::adapter::{AdapterRegistry, ListingBatch};
use super::retry::RetryPolicy;
use crate::config::RetailerEntry;
use crate::normalize::PriceNormalizer;
use crate::resolve::Matcher;
use crate::store::{PriceStore, StoreError};
use crate::types::{CatalogProduct, PriceRecord, RetailerId};

/// Outcome of one retailer's scrape within a batch.
#[derive(Debug)]
pub struct ScrapeRunResult {
    pub retailer_id: RetailerId,
    pub success: bool,
    /// Price records written for this retailer
    pub products_scraped: usize,
    /// Per-product and terminal errors, as display strings
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl ScrapeRunResult {
    fn failed(retailer_id: &str, errors: Vec<String>, start: Instant) -> Self {
        Self {
            retailer_id: retailer_id.to_string(),
            success: false,
            products_scraped: 0,
            errors,
            duration: start.elapsed(),
        }
    }
}

/// Aggregate statistics for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub retailers_run: usize,
    pub retailers_failed: usize,
    pub records_written: usize,
    pub duration: Duration,
}

/// Drives a full scrape batch over the retailer registry.
pub struct Orchestrator {
    adapters: AdapterRegistry,
    matcher: Arc<dyn Matcher>,
    normalizer: PriceNormalizer,
    store: PriceStore,
    retry: RetryPolicy,
    /// Scrape only the first N catalog products per retailer when set
    sample_size: Option<usize>,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        adapters: AdapterRegistry,
        matcher: Arc<dyn Matcher>,
        normalizer: PriceNormalizer,
        store: PriceStore,
        retry: RetryPolicy,
        sample_size: Option<usize>,
    ) -> Self {
        Self {
            adapters,
            matcher,
            normalizer,
            store,
            retry,
            sample_size,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between retailers; setting it finishes the current
    /// retailer and then stops the batch, never mid-adapter-call.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Run one batch over all active, scraping-enabled retailers.
    ///
    /// One retailer's total outage never blocks the others; only a
    /// persistence failure aborts, since it means the run's results are
    /// being lost. Every record in the batch carries the same `price_date`,
    /// taken from the run's start, so a run straddling midnight still lands
    /// on one day.
    pub async fn run_batch(
        &self,
        retailers: &[RetailerEntry],
        catalog: &[CatalogProduct],
    ) -> Result<Vec<ScrapeRunResult>, StoreError> {
        let batch_start = Instant::now();
        let run_date = Utc::now().date_naive();

        let enabled: Vec<&RetailerEntry> = retailers
            .iter()
            .filter(|e| e.retailer.active && e.retailer.scraping_enabled)
            .collect();

        info!(
            retailers = enabled.len(),
            products = catalog.len(),
            %run_date,
            "Starting scrape batch"
        );

        let mut results = Vec::with_capacity(enabled.len());
        let mut stats = BatchStats {
            retailers_run: 0,
            ..Default::default()
        };

        for entry in enabled {
            if self.cancelled.load(Ordering::Relaxed) {
                info!(
                    retailer = %entry.retailer.id,
                    "Batch cancelled; stopping before next retailer"
                );
                break;
            }

            let result = self.run_retailer(entry, catalog, run_date).await?;
            stats.retailers_run += 1;
            stats.records_written += result.products_scraped;
            if result.success {
                info!(
                    retailer = %result.retailer_id,
                    records = result.products_scraped,
                    coverage_errors = result.errors.len(),
                    duration_ms = result.duration.as_millis() as u64,
                    "Retailer scrape complete"
                );
            } else {
                stats.retailers_failed += 1;
                warn!(
                    retailer = %result.retailer_id,
                    errors = ?result.errors,
                    "Retailer scrape failed"
                );
            }
            results.push(result);
        }

        stats.duration = batch_start.elapsed();
        info!(
            retailers_run = stats.retailers_run,
            retailers_failed = stats.retailers_failed,
            records_written = stats.records_written,
            duration_ms = stats.duration.as_millis() as u64,
            "Scrape batch finished"
        );

        Ok(results)
    }

    /// Scrape one retailer: adapter with retry, resolve, normalize, persist.
    ///
    /// Only store errors propagate; everything else is folded into the
    /// returned result. `last_scraped_at` advances regardless of outcome so
    /// staleness dashboards measure attempts, not successes.
    async fn run_retailer(
        &self,
        entry: &RetailerEntry,
        catalog: &[CatalogProduct],
        run_date: NaiveDate,
    ) -> Result<ScrapeRunResult, StoreError> {
        let retailer = &entry.retailer;
        let start = Instant::now();

        let adapter = match self.adapters.get(&retailer.domain) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(retailer = %retailer.id, "{}", e);
                self.store.touch_last_scraped(&retailer.id, Utc::now())?;
                return Ok(ScrapeRunResult::failed(&retailer.id, vec![e.to_string()], start));
            }
        };

        let subset = match self.sample_size {
            Some(n) => &catalog[..n.min(catalog.len())],
            None => catalog,
        };

        let batch = self.fetch_with_retry(&*adapter, &retailer.id, subset).await;

        self.store.touch_last_scraped(&retailer.id, Utc::now())?;

        if batch.is_total_failure() {
            let errors: Vec<String> = batch.errors.iter().map(|e| e.to_string()).collect();
            return Ok(ScrapeRunResult::failed(&retailer.id, errors, start));
        }

        let mut errors: Vec<String> = batch.errors.iter().map(|e| e.to_string()).collect();
        let mut records: Vec<PriceRecord> = Vec::with_capacity(subset.len());

        for product in subset {
            let Some(resolved) = self.matcher.best_match(product, &batch.listings) else {
                debug!(
                    retailer = %retailer.id,
                    product = %product.id,
                    "No listings to resolve against"
                );
                continue;
            };
            if !resolved.exact {
                debug!(
                    retailer = %retailer.id,
                    product = %product.id,
                    listing = %resolved.listing.name,
                    "Resolver fell back to first listing; confidence reduced"
                );
            }

            match self.normalizer.normalize(
                product,
                retailer,
                &resolved,
                adapter.data_source(),
                adapter.method(),
                run_date,
            ) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        retailer = %retailer.id,
                        product = %product.id,
                        "Skipping unnormalizable listing: {}",
                        e
                    );
                    errors.push(format!("{}: {}", product.id, e));
                }
            }
        }

        self.store.upsert_prices(&records)?;

        Ok(ScrapeRunResult {
            retailer_id: retailer.id.clone(),
            success: true,
            products_scraped: records.len(),
            errors,
            duration: start.elapsed(),
        })
    }

    /// Invoke the adapter, retrying total failures under the retry policy.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn super::adapter::RetailerAdapter,
        retailer_id: &str,
        subset: &[CatalogProduct],
    ) -> ListingBatch {
        let mut attempts = 0u32;
        loop {
            let batch = adapter.fetch_listings(subset).await;
            attempts += 1;

            if !batch.is_total_failure() || self.retry.retries_left(attempts) == 0 {
                if batch.is_total_failure() {
                    warn!(
                        retailer = %retailer_id,
                        attempts,
                        "Adapter exhausted retries"
                    );
                }
                return batch;
            }

            let backoff = self.retry.backoff(attempts - 1);
            debug!(
                retailer = %retailer_id,
                attempt = attempts,
                backoff_ms = backoff.as_millis() as u64,
                "Adapter call failed; backing off before retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}
