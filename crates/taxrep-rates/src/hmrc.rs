//! Rate oracle backed by the monthly exchange-rate files published by HMRC.

use crate::{RateError, RateOracle, unavailable};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// On-disk shape of one monthly file: `{"rates": {"USD": "1.2467", ...}}`.
/// Values may be JSON strings or numbers; both are parsed into decimals
/// without passing through binary floats.
#[derive(Debug, Deserialize)]
struct MonthlyRateFile {
    rates: HashMap<String, serde_json::Value>,
}

/// Oracle reading `rate/<YYYY>/<MM>.json` files under a root directory.
///
/// Each file is parsed at most once per run; parsed months are kept in an
/// in-memory cache keyed by `(year, month)`. Interior mutability is fine
/// here: the report run is single-threaded.
#[derive(Debug)]
pub struct HmrcRates {
    root: PathBuf,
    months: RefCell<HashMap<(i32, u32), HashMap<String, Decimal>>>,
}

impl HmrcRates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            months: RefCell::new(HashMap::new()),
        }
    }

    fn month_path(&self, year: i32, month: u32) -> PathBuf {
        self.root
            .join("rate")
            .join(format!("{year:04}"))
            .join(format!("{month:02}.json"))
    }

    fn load_month(&self, path: &Path) -> Result<HashMap<String, Decimal>, RateError> {
        let content = std::fs::read_to_string(path).map_err(|source| RateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: MonthlyRateFile =
            serde_json::from_str(&content).map_err(|err| RateError::Malformed {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        let mut rates = HashMap::with_capacity(file.rates.len());
        for (currency, value) in file.rates {
            let rate = decimal_from_json(&value).ok_or_else(|| RateError::Malformed {
                path: path.to_path_buf(),
                message: format!("rate for {currency} is not a decimal: {value}"),
            })?;
            rates.insert(currency, rate);
        }
        Ok(rates)
    }
}

/// Convert a JSON value into a decimal, accepting strings and numbers.
fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

impl RateOracle for HmrcRates {
    fn lookup(&self, date: NaiveDate, currency: &str) -> Result<Decimal, RateError> {
        let key = (date.year(), date.month());
        let mut months = self.months.borrow_mut();

        if !months.contains_key(&key) {
            let path = self.month_path(key.0, key.1);
            if !path.exists() {
                log::warn!("missing HMRC rate file {}", path.display());
                return Err(unavailable(currency, date));
            }
            let rates = self.load_month(&path)?;
            log::debug!(
                "loaded {} HMRC rates for {:04}-{:02}",
                rates.len(),
                key.0,
                key.1
            );
            months.insert(key, rates);
        }

        months
            .get(&key)
            .and_then(|rates| rates.get(currency))
            .copied()
            .ok_or_else(|| unavailable(currency, date))
    }
}
