//! SQLite-backed price store
//!
//! Owns the price time series, retailer staleness markers, deal alerts, and
//! affiliate links. Writes go through one connection, reads through another,
//! both in WAL mode. A write rejected for anything other than the expected
//! upsert conflict surfaces as an error; it is never swallowed.

mod schema;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::types::{
    AffiliateLink, AlertStatus, DataSource, DealAlert, PriceRecord, StockLevel,
};

pub use schema::SCHEMA_VERSION;

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("failed to open price store at '{path}': {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },
}

/// Persistent store for price records and their downstream artifacts.
#[derive(Clone)]
pub struct PriceStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn migrate_if_needed(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if version < schema::SCHEMA_VERSION {
        conn.execute_batch(schema::CREATE_SCHEMA)?;
        conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
        info!("Price store schema created at version {}", schema::SCHEMA_VERSION);
    }
    Ok(())
}

impl PriceStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        let display = path.display().to_string();

        let write_conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: display.clone(),
            source,
        })?;

        migrate_if_needed(&write_conn)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let read_conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: display,
            source,
        })?;
        read_conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    // ------------------------------------------------------------------
    // Price records
    // ------------------------------------------------------------------

    /// Upsert a batch of price records in one transaction.
    ///
    /// Records are keyed by (product_id, retailer_id, price_date); a
    /// same-day re-run overwrites in place, a new day extends the series.
    /// Returns the number of records written.
    pub fn upsert_prices(&self, records: &[PriceRecord]) -> Result<usize, StoreError> {
        let conn = self.write_conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO price_records
                 (product_id, retailer_id, price_date, current_price, original_price,
                  sale_price, in_stock, stock_level, confidence, data_source,
                  shipping_cost, shipping_time_days)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(product_id, retailer_id, price_date) DO UPDATE SET
                   current_price = excluded.current_price,
                   original_price = excluded.original_price,
                   sale_price = excluded.sale_price,
                   in_stock = excluded.in_stock,
                   stock_level = excluded.stock_level,
                   confidence = excluded.confidence,
                   data_source = excluded.data_source,
                   shipping_cost = excluded.shipping_cost,
                   shipping_time_days = excluded.shipping_time_days",
            )?;
            for r in records {
                stmt.execute(params![
                    r.product_id,
                    r.retailer_id,
                    r.price_date.format(DATE_FMT).to_string(),
                    r.current_price,
                    r.original_price,
                    r.sale_price,
                    r.in_stock,
                    r.stock_level.as_str(),
                    r.confidence,
                    r.data_source.as_str(),
                    r.shipping_cost,
                    r.shipping_time_days,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// The price record for a (product, retailer) pair on an exact date.
    pub fn price_on(
        &self,
        product_id: &str,
        retailer_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PriceRecord>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT product_id, retailer_id, price_date, current_price, original_price,
                    sale_price, in_stock, stock_level, confidence, data_source,
                    shipping_cost, shipping_time_days
             FROM price_records
             WHERE product_id = ?1 AND retailer_id = ?2 AND price_date = ?3",
        )?;
        let record = stmt
            .query_row(
                params![product_id, retailer_id, date.format(DATE_FMT).to_string()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent price_date present in the store.
    pub fn latest_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let date: Option<String> = conn
            .query_row("SELECT MAX(price_date) FROM price_records", [], |r| r.get(0))
            .optional()?
            .flatten();
        match date {
            Some(s) => Ok(Some(parse_date_str(&s)?)),
            None => Ok(None),
        }
    }

    /// All price records observed on a given date.
    pub fn records_on(&self, date: NaiveDate) -> Result<Vec<PriceRecord>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT product_id, retailer_id, price_date, current_price, original_price,
                    sale_price, in_stock, stock_level, confidence, data_source,
                    shipping_cost, shipping_time_days
             FROM price_records
             WHERE price_date = ?1
             ORDER BY product_id, retailer_id",
        )?;
        let rows = stmt.query_map(params![date.format(DATE_FMT).to_string()], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Price records for one product on a given date, across retailers.
    pub fn records_for_product_on(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT product_id, retailer_id, price_date, current_price, original_price,
                    sale_price, in_stock, stock_level, confidence, data_source,
                    shipping_cost, shipping_time_days
             FROM price_records
             WHERE product_id = ?1 AND price_date = ?2
             ORDER BY retailer_id",
        )?;
        let rows = stmt.query_map(
            params![product_id, date.format(DATE_FMT).to_string()],
            row_to_record,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM price_records", [], |r| r.get(0))?)
    }

    // ------------------------------------------------------------------
    // Retailer staleness
    // ------------------------------------------------------------------

    /// Record that a retailer's scrape completed (successfully or not).
    /// Operational dashboards use this to detect staleness.
    pub fn touch_last_scraped(
        &self,
        retailer_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO retailer_status (retailer_id, last_scraped_at)
             VALUES (?1, ?2)
             ON CONFLICT(retailer_id) DO UPDATE SET
               last_scraped_at = excluded.last_scraped_at",
            params![retailer_id, at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn last_scraped(&self, retailer_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let value: Option<String> = conn
            .query_row(
                "SELECT last_scraped_at FROM retailer_status WHERE retailer_id = ?1",
                params![retailer_id],
                |r| r.get(0),
            )
            .optional()?;
        match value {
            Some(s) => Ok(Some(parse_timestamp_str(&s)?)),
            None => Ok(None),
        }
    }

    pub fn all_last_scraped(&self) -> Result<Vec<(String, DateTime<Utc>)>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT retailer_id, last_scraped_at FROM retailer_status ORDER BY retailer_id",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let at: String = row.get(1)?;
            Ok((id, at))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, at) = row?;
            out.push((id, parse_timestamp_str(&at)?));
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Deal alerts
    // ------------------------------------------------------------------

    pub fn insert_alert(&self, alert: &DealAlert) -> Result<i64, StoreError> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO deal_alerts
             (product_id, retailer_id, current_price, previous_price, savings_amount,
              savings_percentage, deal_score, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                alert.product_id,
                alert.retailer_id,
                alert.current_price,
                alert.previous_price,
                alert.savings_amount,
                alert.savings_percentage,
                alert.deal_score as i64,
                alert.status.as_str(),
                alert.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// True when an alert for the pair was already created on the given day;
    /// keeps re-runs of the detection job from duplicating alerts.
    pub fn alert_exists_on(
        &self,
        product_id: &str,
        retailer_id: &str,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM deal_alerts
             WHERE product_id = ?1 AND retailer_id = ?2
               AND substr(created_at, 1, 10) = ?3",
            params![product_id, retailer_id, date.format(DATE_FMT).to_string()],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// All alerts with their row ids, newest first.
    pub fn alerts(&self) -> Result<Vec<(i64, DealAlert)>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, product_id, retailer_id, current_price, previous_price,
                    savings_amount, savings_percentage, deal_score, status, created_at
             FROM deal_alerts
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let status: String = row.get(8)?;
            let created_at: String = row.get(9)?;
            Ok((
                id,
                DealAlert {
                    product_id: row.get(1)?,
                    retailer_id: row.get(2)?,
                    current_price: row.get(3)?,
                    previous_price: row.get(4)?,
                    savings_amount: row.get(5)?,
                    savings_percentage: row.get(6)?,
                    deal_score: row.get::<_, i64>(7)? as u8,
                    status: AlertStatus::parse(&status).unwrap_or(AlertStatus::Active),
                    created_at: parse_timestamp(9, &created_at)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Flip an alert's presentation status; all other alert fields are
    /// immutable after creation.
    pub fn set_alert_status(&self, id: i64, status: AlertStatus) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE deal_alerts SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Affiliate links
    // ------------------------------------------------------------------

    /// Return the link for the pair, creating it from `candidate` on first
    /// use. Idempotent per (product_id, retailer_id).
    pub fn get_or_create_link(
        &self,
        candidate: &AffiliateLink,
    ) -> Result<AffiliateLink, StoreError> {
        {
            let conn = self.write_conn.lock().unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO affiliate_links
                 (product_id, retailer_id, affiliate_url, direct_url, commission_rate,
                  click_count, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    candidate.product_id,
                    candidate.retailer_id,
                    candidate.affiliate_url,
                    candidate.direct_url,
                    candidate.commission_rate,
                    candidate.click_count as i64,
                    candidate.is_active,
                    candidate.created_at.to_rfc3339(),
                ],
            )?;
        }
        self.link(&candidate.product_id, &candidate.retailer_id)
            .map(|link| link.expect("link row exists after insert-or-ignore"))
    }

    pub fn link(
        &self,
        product_id: &str,
        retailer_id: &str,
    ) -> Result<Option<AffiliateLink>, StoreError> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT product_id, retailer_id, affiliate_url, direct_url, commission_rate,
                    click_count, is_active, created_at
             FROM affiliate_links
             WHERE product_id = ?1 AND retailer_id = ?2",
        )?;
        let link = stmt
            .query_row(params![product_id, retailer_id], |row| {
                let created_at: String = row.get(7)?;
                Ok(AffiliateLink {
                    product_id: row.get(0)?,
                    retailer_id: row.get(1)?,
                    affiliate_url: row.get(2)?,
                    direct_url: row.get(3)?,
                    commission_rate: row.get(4)?,
                    click_count: row.get::<_, i64>(5)? as u64,
                    is_active: row.get(6)?,
                    created_at: parse_timestamp(7, &created_at)?,
                })
            })
            .optional()?;
        Ok(link)
    }

    /// Increment a link's click counter. Monotonic; never decremented.
    /// Returns the new count.
    pub fn record_click(&self, product_id: &str, retailer_id: &str) -> Result<u64, StoreError> {
        let conn = self.write_conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "UPDATE affiliate_links
             SET click_count = click_count + 1
             WHERE product_id = ?1 AND retailer_id = ?2
             RETURNING click_count",
            params![product_id, retailer_id],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceRecord> {
    let date: String = row.get(2)?;
    let stock_level: String = row.get(7)?;
    let data_source: String = row.get(9)?;
    Ok(PriceRecord {
        product_id: row.get(0)?,
        retailer_id: row.get(1)?,
        price_date: parse_date(2, &date)?,
        current_price: row.get(3)?,
        original_price: row.get(4)?,
        sale_price: row.get(5)?,
        in_stock: row.get(6)?,
        stock_level: StockLevel::parse(&stock_level).ok_or_else(|| conversion_err(7, &stock_level))?,
        confidence: row.get(8)?,
        data_source: DataSource::parse(&data_source).ok_or_else(|| conversion_err(9, &data_source))?,
        shipping_cost: row.get(10)?,
        shipping_time_days: row.get::<_, i64>(11)? as u32,
    })
}

fn conversion_err(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unrecognized value '{}'", value).into(),
    )
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_date_str(s: &str) -> Result<NaiveDate, StoreError> {
    Ok(parse_date(0, s)?)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(parse_timestamp(0, s)?)
}
