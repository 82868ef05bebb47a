//! Deal detection batch job
//!
//! Runs independently of scraping, over the persisted price history. For
//! each (product, retailer) pair observed on the reference day, the price
//! from the rolling window's start is compared against the current one; a
//! drop at or above the threshold becomes a deal alert. Multiple qualifying
//! retailers for one product each get their own alert; ranking and
//! deduplication for display are presentation concerns that live elsewhere.

use chrono::{Duration, NaiveDate, Utc};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::DealConfig;
use crate::store::{PriceStore, StoreError};
use crate::types::{AlertStatus, DealAlert};

/// Deal score: linear in the savings percentage, saturating at 50% off.
pub fn deal_score(savings_percentage: f64) -> u8 {
    (savings_percentage * 2.0).round().min(100.0).max(0.0) as u8
}

/// Summary of one detection run.
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    pub reference_date: Option<NaiveDate>,
    pub pairs_examined: usize,
    pub alerts_created: usize,
    pub duration_ms: u64,
}

/// Batch detector over the price history.
pub struct DealDetector<'a> {
    store: &'a PriceStore,
    config: DealConfig,
}

impl<'a> DealDetector<'a> {
    pub fn new(store: &'a PriceStore, config: DealConfig) -> Self {
        Self { store, config }
    }

    /// Detect price drops and persist an alert per qualifying pair.
    ///
    /// The reference day is the store's latest price_date: the job runs on
    /// whatever the most recent completed scrape produced, whenever it is
    /// invoked. Pairs that already alerted on the reference day are skipped,
    /// so re-running the job is harmless.
    pub fn detect(&self) -> Result<(Vec<DealAlert>, DetectionSummary), StoreError> {
        let start = Instant::now();
        let mut summary = DetectionSummary::default();

        let Some(reference_date) = self.store.latest_date()? else {
            info!("No price history; nothing to detect");
            return Ok((Vec::new(), summary));
        };
        summary.reference_date = Some(reference_date);
        let previous_date = reference_date - Duration::days(self.config.window_days as i64);

        let mut alerts = Vec::new();
        for record in self.store.records_on(reference_date)? {
            summary.pairs_examined += 1;

            let Some(previous) =
                self.store
                    .price_on(&record.product_id, &record.retailer_id, previous_date)?
            else {
                debug!(
                    product = %record.product_id,
                    retailer = %record.retailer_id,
                    %previous_date,
                    "No price at window start; skipping pair"
                );
                continue;
            };
            if previous.current_price <= 0.0 {
                continue;
            }

            let savings_amount = previous.current_price - record.current_price;
            let savings_percentage = savings_amount / previous.current_price * 100.0;
            if savings_percentage < self.config.min_savings_percentage {
                continue;
            }

            if self
                .store
                .alert_exists_on(&record.product_id, &record.retailer_id, reference_date)?
            {
                debug!(
                    product = %record.product_id,
                    retailer = %record.retailer_id,
                    "Alert already exists for reference day; skipping"
                );
                continue;
            }

            let alert = DealAlert {
                product_id: record.product_id.clone(),
                retailer_id: record.retailer_id.clone(),
                current_price: record.current_price,
                previous_price: previous.current_price,
                savings_amount,
                savings_percentage,
                deal_score: deal_score(savings_percentage),
                status: AlertStatus::Active,
                created_at: Utc::now(),
            };
            self.store.insert_alert(&alert)?;
            alerts.push(alert);
        }

        summary.alerts_created = alerts.len();
        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            reference_date = %reference_date,
            pairs_examined = summary.pairs_examined,
            alerts_created = summary.alerts_created,
            duration_ms = summary.duration_ms,
            "Deal detection finished"
        );

        Ok((alerts, summary))
    }
}
