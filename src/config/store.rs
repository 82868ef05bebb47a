//! Price store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Price store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("pricewatch.db"),
        }
    }
}
