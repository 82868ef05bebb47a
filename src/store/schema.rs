//! SQLite schema for the price store

/// Current schema version, recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Schema statements for a fresh database.
///
/// `price_records` is append-only across days: the composite primary key
/// makes a same-day re-write an in-place update, so the table forms one
/// time series per (product, retailer) pair.
pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS price_records (
    product_id         TEXT NOT NULL,
    retailer_id        TEXT NOT NULL,
    price_date         TEXT NOT NULL,
    current_price      REAL NOT NULL,
    original_price     REAL,
    sale_price         REAL,
    in_stock           INTEGER NOT NULL,
    stock_level        TEXT NOT NULL,
    confidence         REAL NOT NULL,
    data_source        TEXT NOT NULL,
    shipping_cost      REAL NOT NULL,
    shipping_time_days INTEGER NOT NULL,
    PRIMARY KEY (product_id, retailer_id, price_date)
);

CREATE INDEX IF NOT EXISTS idx_price_records_date
    ON price_records (price_date);

CREATE TABLE IF NOT EXISTS retailer_status (
    retailer_id     TEXT PRIMARY KEY,
    last_scraped_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deal_alerts (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id         TEXT NOT NULL,
    retailer_id        TEXT NOT NULL,
    current_price      REAL NOT NULL,
    previous_price     REAL NOT NULL,
    savings_amount     REAL NOT NULL,
    savings_percentage REAL NOT NULL,
    deal_score         INTEGER NOT NULL,
    status             TEXT NOT NULL DEFAULT 'active',
    created_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_deal_alerts_pair
    ON deal_alerts (product_id, retailer_id);

CREATE TABLE IF NOT EXISTS affiliate_links (
    product_id      TEXT NOT NULL,
    retailer_id     TEXT NOT NULL,
    affiliate_url   TEXT NOT NULL,
    direct_url      TEXT NOT NULL,
    commission_rate REAL NOT NULL,
    click_count     INTEGER NOT NULL DEFAULT 0,
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (product_id, retailer_id)
);
";
