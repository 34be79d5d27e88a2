use chrono::NaiveDate;
use rust_decimal::Decimal;
use taxrep_rates::RateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxError {
    #[error("ambiguous tags: transaction carries both '{first}' and '{second}'")]
    AmbiguousTag { first: String, second: String },

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error(
        "section 104 pool underflow for {asset} on {date}: quantity {quantity}, cost {cost}"
    )]
    PoolUnderflow {
        asset: String,
        date: NaiveDate,
        quantity: Decimal,
        cost: Decimal,
    },

    #[error("exchange rate for {currency} must be positive")]
    InvalidRate { currency: String },

    #[error("invalid event timestamp {0} ms")]
    InvalidTimestamp(i64),

    #[error("year {0} is out of range for a tax year boundary")]
    InvalidYear(i32),

    #[error("start year {start_year} is after end year {end_year}")]
    InvalidYearRange { start_year: i32, end_year: i32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
