//! Exchange rate table configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Static exchange rates for the fixed rate provider.
///
/// Each entry maps a currency code to its value in the base currency
/// (units of base per one unit of the listed currency). The base currency
/// itself is implicitly 1.0. Rate freshness is the operator's
/// responsibility; a live-rate provider can replace the fixed one without
/// touching this table's consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    /// All prices are normalized into this currency
    pub base: String,
    /// currency code -> units of base per unit
    pub rates: HashMap<String, f64>,
}

impl Default for RatesConfig {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), 1.0);
        rates.insert("EUR".to_string(), 1.08);
        rates.insert("GBP".to_string(), 1.27);
        rates.insert("KRW".to_string(), 0.00072);
        rates.insert("JPY".to_string(), 0.0066);
        Self {
            base: "USD".to_string(),
            rates,
        }
    }
}
