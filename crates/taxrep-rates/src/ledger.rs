//! Rate oracle backed by price directives recorded in the ledger.

use crate::{RateError, RateOracle, unavailable};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// A dated price directive: one unit of `base` was worth `rate` units of
/// `quote` on `date`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
}

/// Price database built from ledger price directives.
///
/// Lookup uses the most recent price on or before the requested date. A
/// direct `(GBP, currency)` quote is preferred; failing that the reciprocal
/// of a `(currency, GBP)` quote is used.
#[derive(Debug, Default)]
pub struct LedgerRates {
    prices: HashMap<(String, String), Vec<(NaiveDate, Decimal)>>,
}

impl LedgerRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prices(points: impl IntoIterator<Item = PricePoint>) -> Self {
        let mut prices: HashMap<(String, String), Vec<(NaiveDate, Decimal)>> = HashMap::new();
        for point in points {
            prices
                .entry((point.base, point.quote))
                .or_default()
                .push((point.date, point.rate));
        }
        for series in prices.values_mut() {
            series.sort_by_key(|(date, _)| *date);
        }
        Self { prices }
    }

    /// Most recent rate on or before `date` for the given pair.
    fn latest(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        let series = self.prices.get(&(base.to_string(), quote.to_string()))?;
        series
            .iter()
            .take_while(|(price_date, _)| *price_date <= date)
            .last()
            .map(|(_, rate)| *rate)
    }
}

impl RateOracle for LedgerRates {
    fn lookup(&self, date: NaiveDate, currency: &str) -> Result<Decimal, RateError> {
        if let Some(rate) = self.latest("GBP", currency, date) {
            return Ok(rate);
        }
        if let Some(rate) = self.latest(currency, "GBP", date) {
            if !rate.is_zero() {
                return Ok(Decimal::ONE / rate);
            }
        }
        Err(unavailable(currency, date))
    }
}
