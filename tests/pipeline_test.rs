//! Integration tests for the PriceWatch pipeline
//!
//! Exercises the public API end to end: scripted adapters feed the
//! orchestrator, records land in a real on-disk store, and the deal
//! detector and affiliate engine run over the persisted history.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pricewatch::{
    affiliate::{commission, AffiliateEngine},
    config::{AdapterEntry, AdapterKind, DealConfig, RetailerEntry},
    deals::DealDetector,
    normalize::{FixedRateProvider, PriceNormalizer},
    resolve::TokenContainmentMatcher,
    scraping::{
        adapter::{AdapterRegistry, ExtractionMethod, ListingBatch, RetailerAdapter},
        Orchestrator, RetryPolicy,
    },
    store::PriceStore,
    types::{
        CatalogProduct, DataSource, PriceRecord, RawListing, Retailer, StockLevel,
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Adapter that returns a fixed listing set, with a configurable
/// source/method so confidence tiers can be exercised.
struct ScriptedAdapter {
    listings: Vec<RawListing>,
    source: DataSource,
    method: ExtractionMethod,
}

impl ScriptedAdapter {
    fn api(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            source: DataSource::Api,
            method: ExtractionMethod::StructuredApi,
        }
    }

    fn html(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            source: DataSource::Scraping,
            method: ExtractionMethod::HtmlRegex,
        }
    }
}

#[async_trait]
impl RetailerAdapter for ScriptedAdapter {
    async fn fetch_listings(&self, _products: &[CatalogProduct]) -> ListingBatch {
        ListingBatch {
            listings: self.listings.clone(),
            errors: vec![],
        }
    }

    fn data_source(&self) -> DataSource {
        self.source
    }

    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn retailer_entry(id: &str, domain: &str, shipping: f64, trust: f64) -> RetailerEntry {
    RetailerEntry {
        retailer: Retailer {
            id: id.to_string(),
            domain: domain.to_string(),
            display_name: id.to_uppercase(),
            active: true,
            scraping_enabled: true,
            shipping_cost: shipping,
            processing_days: 2,
            overall_trust_rating: trust,
            authenticity_score: 0.9,
            commission_rate: 10.0,
            tracking_param: "aff=pricewatch".to_string(),
            cookie_duration_days: 30,
        },
        adapter: AdapterEntry {
            kind: AdapterKind::Api,
            endpoint: format!("https://{}/api", domain),
        },
    }
}

fn catalog() -> Vec<CatalogProduct> {
    vec![CatalogProduct {
        id: "cosrx-snail-essence".to_string(),
        brand: "COSRX".to_string(),
        name: "Snail Mucin Essence".to_string(),
        ingredients: vec!["snail secretion filtrate".to_string()],
    }]
}

fn listing(price: f64) -> RawListing {
    RawListing {
        name: "COSRX Advanced Snail 96 Mucin Power Essence".to_string(),
        price,
        currency: "USD".to_string(),
        in_stock: true,
        url: "https://shop.example.com/p/1".to_string(),
        sku: None,
        original_price: None,
    }
}

fn orchestrator(adapters: AdapterRegistry, store: PriceStore) -> Orchestrator {
    let rates = Arc::new(FixedRateProvider::new(
        "USD",
        HashMap::from([("USD".to_string(), 1.0)]),
    ));
    Orchestrator::new(
        adapters,
        Arc::new(TokenContainmentMatcher),
        PriceNormalizer::new(rates, "USD"),
        store,
        RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
        None,
    )
}

fn seeded_record(
    product: &str,
    retailer: &str,
    date: NaiveDate,
    price: f64,
    shipping: f64,
) -> PriceRecord {
    PriceRecord {
        product_id: product.to_string(),
        retailer_id: retailer.to_string(),
        price_date: date,
        current_price: price,
        original_price: None,
        sale_price: None,
        in_stock: true,
        stock_level: StockLevel::Medium,
        confidence: 0.92,
        data_source: DataSource::Api,
        shipping_cost: shipping,
        shipping_time_days: 2,
    }
}

/// Scrape two retailers end to end, then select the best landed-cost offer.
#[tokio::test]
async fn scrape_to_best_offer_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let store = PriceStore::open(temp_dir.path().join("prices.db")).unwrap();

    // X: $20 + $5 shipping = $25 total; Y: $22 + $0 shipping = $22 total
    let retailers = vec![
        retailer_entry("shop-x", "x.example.com", 5.0, 4.0),
        retailer_entry("shop-y", "y.example.com", 0.0, 4.0),
    ];
    let mut adapters = AdapterRegistry::new();
    adapters.register("x.example.com", Arc::new(ScriptedAdapter::api(vec![listing(20.0)])));
    adapters.register("y.example.com", Arc::new(ScriptedAdapter::api(vec![listing(22.0)])));

    let orch = orchestrator(adapters, store.clone());
    let results = orch.run_batch(&retailers, &catalog()).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(store.record_count().unwrap(), 2);

    let plain: Vec<Retailer> = retailers.iter().map(|e| e.retailer.clone()).collect();
    let engine = AffiliateEngine::new(&store, &plain);
    let best = engine.best_offer("cosrx-snail-essence").unwrap();
    assert_eq!(best.retailer_id, "shop-y");
    assert_eq!(best.total_cost, 22.0);

    // Resolving the link is lazy and idempotent; commission follows the rate.
    let link = engine.resolve_link("cosrx-snail-essence", &best.retailer_id).unwrap();
    let again = engine.resolve_link("cosrx-snail-essence", &best.retailer_id).unwrap();
    assert_eq!(link.affiliate_url, again.affiliate_url);
    assert!(link.affiliate_url.ends_with("?aff=pricewatch"));
    assert_eq!(commission(best.price, link.commission_rate), 2.2);

    assert_eq!(engine.record_click("cosrx-snail-essence", &best.retailer_id).unwrap(), 1);
    assert_eq!(engine.record_click("cosrx-snail-essence", &best.retailer_id).unwrap(), 2);
}

/// Re-running the same batch on the same day updates in place instead of
/// duplicating rows.
#[tokio::test]
async fn same_day_rerun_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = PriceStore::open(temp_dir.path().join("prices.db")).unwrap();
    let retailers = vec![retailer_entry("shop-y", "y.example.com", 0.0, 4.0)];

    for price in [22.0, 21.5] {
        let mut adapters = AdapterRegistry::new();
        adapters.register("y.example.com", Arc::new(ScriptedAdapter::api(vec![listing(price)])));
        let orch = orchestrator(adapters, store.clone());
        orch.run_batch(&retailers, &catalog()).await.unwrap();
    }

    assert_eq!(store.record_count().unwrap(), 1);
    let today = Utc::now().date_naive();
    let record = store
        .price_on("cosrx-snail-essence", "shop-y", today)
        .unwrap()
        .unwrap();
    // The second run's value won.
    assert_eq!(record.current_price, 21.5);
}

/// Day D: Y wins at $22 total. Day D+1: Y drops to $15 total, which is a
/// 31.8% savings and a deal score of 64.
#[test]
fn price_drop_across_days_creates_scored_alert() {
    let temp_dir = TempDir::new().unwrap();
    let store = PriceStore::open(temp_dir.path().join("prices.db")).unwrap();

    let day_d = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
    let day_d1 = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();

    store
        .upsert_prices(&[
            seeded_record("cosrx-snail-essence", "shop-x", day_d, 20.0, 5.0),
            seeded_record("cosrx-snail-essence", "shop-y", day_d, 22.0, 0.0),
            seeded_record("cosrx-snail-essence", "shop-x", day_d1, 20.0, 5.0),
            seeded_record("cosrx-snail-essence", "shop-y", day_d1, 15.0, 0.0),
        ])
        .unwrap();

    let config = DealConfig {
        window_days: 1,
        min_savings_percentage: 15.0,
    };
    let (alerts, summary) = DealDetector::new(&store, config).detect().unwrap();

    // Only Y dropped enough; X is flat.
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.retailer_id, "shop-y");
    assert_eq!(alert.previous_price, 22.0);
    assert_eq!(alert.current_price, 15.0);
    assert!((alert.savings_percentage - (22.0 - 15.0) / 22.0 * 100.0).abs() < 1e-9);
    assert_eq!(alert.deal_score, 64);
    assert_eq!(summary.reference_date, Some(day_d1));

    // The drop also makes Y the runaway best offer on the latest day.
    let retailers = vec![
        retailer_entry("shop-x", "x.example.com", 5.0, 4.0).retailer,
        retailer_entry("shop-y", "y.example.com", 0.0, 4.0).retailer,
    ];
    let engine = AffiliateEngine::new(&store, &retailers);
    let best = engine.best_offer("cosrx-snail-essence").unwrap();
    assert_eq!(best.retailer_id, "shop-y");
    assert_eq!(best.total_cost, 15.0);
}

/// A structured API record carries strictly higher confidence than a
/// raw-HTML regex record for the same product, all else equal.
#[tokio::test]
async fn api_confidence_beats_html_regex_confidence() {
    let temp_dir = TempDir::new().unwrap();
    let store = PriceStore::open(temp_dir.path().join("prices.db")).unwrap();

    let retailers = vec![
        retailer_entry("api-shop", "api.example.com", 0.0, 4.0),
        retailer_entry("html-shop", "html.example.com", 0.0, 4.0),
    ];
    let mut adapters = AdapterRegistry::new();
    adapters.register("api.example.com", Arc::new(ScriptedAdapter::api(vec![listing(20.0)])));
    adapters.register("html.example.com", Arc::new(ScriptedAdapter::html(vec![listing(20.0)])));

    let orch = orchestrator(adapters, store.clone());
    orch.run_batch(&retailers, &catalog()).await.unwrap();

    let today = Utc::now().date_naive();
    let api_record = store
        .price_on("cosrx-snail-essence", "api-shop", today)
        .unwrap()
        .unwrap();
    let html_record = store
        .price_on("cosrx-snail-essence", "html-shop", today)
        .unwrap()
        .unwrap();

    assert_eq!(api_record.data_source, DataSource::Api);
    assert_eq!(html_record.data_source, DataSource::Scraping);
    assert!(api_record.confidence > html_record.confidence);
}
