//! PriceWatch CLI
//!
//! Multi-retailer price discovery, deal detection, and affiliate
//! attribution over a fixed product catalog.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricewatch::{
    affiliate::{commission, AffiliateEngine},
    config::{load_catalog, Config},
    deals::DealDetector,
    normalize::{FixedRateProvider, PriceNormalizer},
    resolve::TokenContainmentMatcher,
    scraping::{adapters::build_registry, fetcher::shared_fetcher, Orchestrator, RetryPolicy},
    store::PriceStore,
    types::Retailer,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(about = "Multi-retailer price discovery, deal detection, and affiliate attribution")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "pricewatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scrape batch over all enabled retailers
    Scrape,

    /// Detect price drops over the persisted history
    Deals {
        /// Lookback window in days (overrides the config)
        #[arg(long)]
        window: Option<u32>,

        /// Minimum savings percentage (overrides the config)
        #[arg(long)]
        min_savings: Option<f64>,
    },

    /// Show ranked offers and the affiliate link for a product
    BestOffer {
        /// Catalog product id
        product_id: String,
    },

    /// Show store counts and per-retailer staleness
    Stats,

    /// Write a starter configuration and example catalog
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { path } = &cli.command {
        return init_workspace(path);
    }

    let config = Config::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = PriceStore::open(&config.store.db_path)
        .with_context(|| format!("opening price store at {}", config.store.db_path.display()))?;

    match cli.command {
        Commands::Scrape => run_scrape(&config, store).await,
        Commands::Deals { window, min_savings } => run_deals(&config, store, window, min_savings),
        Commands::BestOffer { product_id } => run_best_offer(&config, store, &product_id),
        Commands::Stats => run_stats(&config, store),
        Commands::Init { .. } => unreachable!("handled before config load"),
    }
}

async fn run_scrape(config: &Config, store: PriceStore) -> Result<()> {
    let catalog = load_catalog(&config.catalog_path)?;
    if config.retailers.is_empty() {
        anyhow::bail!("No retailers configured; nothing to scrape");
    }

    let fetcher = shared_fetcher(&config.scrape).context("building HTTP fetcher")?;
    let adapters = build_registry(&config.retailers, fetcher, &config.rates.base);
    let rates = Arc::new(FixedRateProvider::from_config(&config.rates));
    let normalizer = PriceNormalizer::new(rates, config.rates.base.clone());

    let orchestrator = Orchestrator::new(
        adapters,
        Arc::new(TokenContainmentMatcher),
        normalizer,
        store,
        RetryPolicy::from_config(&config.scrape),
        config.scrape.sample_size,
    );

    // Ctrl-C finishes the current retailer, then stops the batch.
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; finishing current retailer then stopping");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let results = orchestrator.run_batch(&config.retailers, &catalog).await?;

    for result in &results {
        let status = if result.success { "ok" } else { "FAILED" };
        println!(
            "{:<20} {:<7} records={:<4} errors={:<3} {}ms",
            result.retailer_id,
            status,
            result.products_scraped,
            result.errors.len(),
            result.duration.as_millis()
        );
    }
    Ok(())
}

fn run_deals(
    config: &Config,
    store: PriceStore,
    window: Option<u32>,
    min_savings: Option<f64>,
) -> Result<()> {
    let mut deal_config = config.deals.clone();
    if let Some(days) = window {
        deal_config.window_days = days;
    }
    if let Some(pct) = min_savings {
        deal_config.min_savings_percentage = pct;
    }

    let detector = DealDetector::new(&store, deal_config);
    let (alerts, summary) = detector.detect()?;

    if alerts.is_empty() {
        println!(
            "No deals found ({} pairs examined)",
            summary.pairs_examined
        );
        return Ok(());
    }

    for alert in &alerts {
        println!(
            "{} @ {}: {:.2} -> {:.2} (save {:.1}%, score {})",
            alert.product_id,
            alert.retailer_id,
            alert.previous_price,
            alert.current_price,
            alert.savings_percentage,
            alert.deal_score
        );
    }
    println!("{} alert(s) created", alerts.len());
    Ok(())
}

fn run_best_offer(config: &Config, store: PriceStore, product_id: &str) -> Result<()> {
    let retailers: Vec<Retailer> = config
        .retailers
        .iter()
        .map(|e| e.retailer.clone())
        .collect();
    let engine = AffiliateEngine::new(&store, &retailers);

    let offers = engine.offers(product_id)?;
    println!("{:<20} {:>8} {:>8} {:>8}", "retailer", "price", "shipping", "total");
    for offer in &offers {
        println!(
            "{:<20} {:>8.2} {:>8.2} {:>8.2}",
            offer.retailer_name, offer.price, offer.shipping_cost, offer.total_cost
        );
    }

    let Some(best) = offers.first() else {
        anyhow::bail!("No rankable offers for '{}'", product_id);
    };
    let link = engine.resolve_link(product_id, &best.retailer_id)?;
    println!();
    println!("best offer:  {} at {:.2} total", best.retailer_name, best.total_cost);
    println!("link:        {}", link.affiliate_url);
    println!(
        "commission:  {:.2} ({}% of {:.2})",
        commission(best.price, link.commission_rate),
        link.commission_rate,
        best.price
    );
    Ok(())
}

fn run_stats(config: &Config, store: PriceStore) -> Result<()> {
    println!("price records: {}", store.record_count()?);
    println!("deal alerts:   {}", store.alerts()?.len());

    let scraped = store.all_last_scraped()?;
    if scraped.is_empty() {
        println!("no retailers scraped yet");
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!();
    println!("{:<20} {:<28} staleness", "retailer", "last_scraped_at");
    for (retailer_id, at) in scraped {
        let known = config.retailer(&retailer_id).is_some();
        let suffix = if known { "" } else { " (not in registry)" };
        let age = now.signed_duration_since(at);
        println!(
            "{:<20} {:<28} {}h{}",
            retailer_id,
            at.to_rfc3339(),
            age.num_hours(),
            suffix
        );
    }
    Ok(())
}

fn init_workspace(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("creating directory {}", path.display()))?;

    let config_path = path.join("pricewatch.toml");
    let catalog_path = path.join("catalog.json");
    if config_path.exists() || catalog_path.exists() {
        anyhow::bail!(
            "Refusing to overwrite existing files in {}",
            path.display()
        );
    }

    std::fs::write(&config_path, STARTER_CONFIG).context("writing starter config")?;
    std::fs::write(&catalog_path, STARTER_CATALOG).context("writing example catalog")?;

    println!("Wrote {}", config_path.display());
    println!("Wrote {}", catalog_path.display());
    println!("Edit the retailer endpoints, then run: pricewatch scrape");
    Ok(())
}

const STARTER_CONFIG: &str = r#"catalog_path = "catalog.json"

[scrape]
request_timeout_secs = 15
connect_timeout_secs = 10
inter_request_delay_ms = 1000
max_attempts = 3
retry_base_delay_ms = 500
retry_max_delay_ms = 30000
user_agent = "PriceWatchBot/1.0 (+https://github.com/pricewatch)"

[deals]
window_days = 7
min_savings_percentage = 15.0

[rates]
base = "USD"

[rates.rates]
USD = 1.0
EUR = 1.08
GBP = 1.27
KRW = 0.00072
JPY = 0.0066

[store]
db_path = "pricewatch.db"

[logging]
level = "info"

[[retailers]]
id = "glow-depot"
domain = "glow-depot.example.com"
display_name = "Glow Depot"
active = true
scraping_enabled = true
shipping_cost = 0.0
processing_days = 2
overall_trust_rating = 4.6
authenticity_score = 0.97
commission_rate = 8.0
tracking_param = "aff=pricewatch"
cookie_duration_days = 30

[retailers.adapter]
kind = "api"
endpoint = "https://glow-depot.example.com/api/v1/products"

[[retailers]]
id = "seoul-beauty"
domain = "seoul-beauty.example.com"
display_name = "Seoul Beauty"
active = true
scraping_enabled = true
shipping_cost = 7.99
processing_days = 4
overall_trust_rating = 4.2
authenticity_score = 0.93
commission_rate = 10.0
tracking_param = "partner=pricewatch"
cookie_duration_days = 14

[retailers.adapter]
kind = "search"
endpoint = "https://seoul-beauty.example.com/search.json"

[[retailers]]
id = "bargain-glow"
domain = "bargain-glow.example.com"
display_name = "Bargain Glow"
active = true
scraping_enabled = true
shipping_cost = 4.5
processing_days = 6
overall_trust_rating = 3.1
authenticity_score = 0.78
commission_rate = 12.0
tracking_param = "utm_source=pricewatch"
cookie_duration_days = 7

[retailers.adapter]
kind = "html"
endpoint = "https://bargain-glow.example.com/catalogsearch/result"
"#;

const STARTER_CATALOG: &str = r#"[
  {
    "id": "cosrx-snail-essence",
    "brand": "COSRX",
    "name": "Snail Mucin Essence",
    "ingredients": ["snail secretion filtrate", "betaine", "panthenol"]
  },
  {
    "id": "beauty-of-joseon-relief-sun",
    "brand": "Beauty of Joseon",
    "name": "Relief Sun Rice Probiotics SPF50",
    "ingredients": ["rice extract", "grain ferment", "niacinamide"]
  },
  {
    "id": "anua-heartleaf-toner",
    "brand": "Anua",
    "name": "Heartleaf 77 Soothing Toner",
    "ingredients": ["houttuynia cordata extract", "panthenol"]
  }
]
"#;
