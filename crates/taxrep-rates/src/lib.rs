//! Exchange-rate oracles for converting event amounts to pound sterling.
//!
//! The engine asks for a rate as `(unix-ms timestamp, currency)` and receives
//! the number of units of that currency per one GBP. Two backing sources are
//! provided: prices recorded in the ledger itself ([`LedgerRates`]) and the
//! monthly rate files published by HMRC ([`HmrcRates`]).

mod hmrc;
mod ledger;

use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

pub use hmrc::HmrcRates;
pub use ledger::{LedgerRates, PricePoint};

#[derive(Debug, Error)]
pub enum RateError {
    #[error("no exchange rate for {currency} in {year}-{month:02}")]
    Unavailable {
        currency: String,
        year: i32,
        month: u32,
    },

    #[error("invalid event timestamp {0} ms")]
    InvalidTimestamp(i64),

    #[error("failed to read rate file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rate file {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Provider of `currency → GBP` conversion rates.
///
/// `get_rate` returns `R` such that one pound buys `R` units of `currency`;
/// a GBP value is therefore `amount / R`. `GBP` and `GBX` (pence) are fixed
/// by contract and never reach the backing source.
pub trait RateOracle {
    /// Consult the backing source for a non-fixed currency.
    fn lookup(&self, date: NaiveDate, currency: &str) -> Result<Decimal, RateError>;

    fn get_rate(&self, timestamp_ms: i64, currency: &str) -> Result<Decimal, RateError> {
        match currency {
            "GBP" => Ok(Decimal::ONE),
            "GBX" => Ok(Decimal::ONE_HUNDRED),
            _ => self.lookup(date_of_timestamp(timestamp_ms)?, currency),
        }
    }
}

/// UTC calendar date of a millisecond timestamp.
pub fn date_of_timestamp(timestamp_ms: i64) -> Result<NaiveDate, RateError> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.date_naive())
        .ok_or(RateError::InvalidTimestamp(timestamp_ms))
}

pub(crate) fn unavailable(currency: &str, date: NaiveDate) -> RateError {
    RateError::Unavailable {
        currency: currency.to_string(),
        year: date.year(),
        month: date.month(),
    }
}
