//! The tax report generator: the main state machine of the engine.
//!
//! Walks the matched event list in order, maintains the per-asset Section
//! 104 pools, partitions output into UK tax years and produces two
//! artifacts: the ordered row stream for renderers and the taxable-event
//! table the aggregator folds into per-year summaries.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use taxrep_rates::RateOracle;

use crate::classify::classify;
use crate::error::TaxError;
use crate::matcher::generate_matches;
use crate::models::{AssetPool, AssetType, Event, EventKind, TaxRule, TaxYear, TaxableEvent};
use crate::rows::{AssetSectionRow, EventRow, Row, YearHeaderRow, YearSummaryRow};

/// Report bounds. Unset fields use the defaults: the current tax year for
/// `end_year`, the year before the earliest event for `start_year`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Engine output: the ordered row stream, the taxable-event table (sorted
/// by date), the final pool states and the asset-type mapping observed in
/// the input.
#[derive(Debug, Serialize, JsonSchema)]
pub struct TaxReport {
    pub rows: Vec<Row>,
    pub taxable_events: Vec<TaxableEvent>,
    pub pools: HashMap<String, AssetPool>,
    pub asset_types: HashMap<String, AssetType>,
}

/// Generate the tax report for `events`, resolving year defaults against
/// today's date.
pub fn generate_report(
    events: Vec<Event>,
    oracle: &dyn RateOracle,
    options: &ReportOptions,
) -> Result<TaxReport, TaxError> {
    generate_report_at(events, oracle, options, Utc::now().date_naive())
}

/// Like [`generate_report`] but with an explicit notion of "today", so year
/// defaults are deterministic.
pub fn generate_report_at(
    mut events: Vec<Event>,
    oracle: &dyn RateOracle,
    options: &ReportOptions,
    today: NaiveDate,
) -> Result<TaxReport, TaxError> {
    events.sort_by_key(|event| event.timestamp);

    let end_year = options.end_year.unwrap_or_else(|| default_end_year(today));
    let start_year = match options.start_year {
        Some(year) => year,
        None => default_start_year(&events, end_year)?,
    };
    if start_year > end_year {
        return Err(TaxError::InvalidYearRange {
            start_year,
            end_year,
        });
    }

    // April 6 boundaries from start_year through the year after end_year.
    let dividers: Vec<NaiveDate> = (start_year..=end_year + 1)
        .map(|year| {
            TaxYear::new(year)?
                .start_date()
                .ok_or(TaxError::InvalidYear(year))
        })
        .collect::<Result<_, _>>()?;

    let matched = generate_matches(events)?;

    let mut pools: HashMap<String, AssetPool> = HashMap::new();
    let mut asset_types: HashMap<String, AssetType> = HashMap::new();
    let mut taxable_events: Vec<TaxableEvent> = Vec::new();
    let mut rows: Vec<Row> = Vec::new();
    let mut sections = YearSections::default();
    let mut year_cursor = 0usize;

    for item in &matched {
        asset_types.insert(item.event.asset.clone(), item.event.asset_type);

        if item.event.event_type == EventKind::Buy && item.event.asset_type == AssetType::Cfd {
            continue;
        }

        let date = item.event.date()?;

        for (match_index, record) in item.matched.iter().enumerate() {
            // Flush completed tax years until this event's date falls in
            // the current one. Events past the final boundary are clamped
            // into the last reportable year.
            while year_cursor + 2 < dividers.len() && date >= dividers[year_cursor + 1] {
                flush_year(
                    &mut rows,
                    &mut sections,
                    dividers[year_cursor],
                    dividers[year_cursor + 1],
                );
                year_cursor += 1;
            }
            let year = dividers[year_cursor].year();

            let gbp_to_currency = oracle.get_rate(item.event.timestamp, &item.event.currency)?;
            if gbp_to_currency <= Decimal::ZERO {
                return Err(TaxError::InvalidRate {
                    currency: item.event.currency.clone(),
                });
            }
            let currency_to_gbp = Decimal::ONE / gbp_to_currency;

            let mut row = EventRow::new(
                item.event.event_type,
                record.rule,
                item.event.currency.clone(),
                gbp_to_currency,
                currency_to_gbp,
            );
            if match_index == 0 {
                row.date = Some(date);
                row.asset = Some(item.event.asset.clone());
                row.platform = Some(item.event.platform.clone());
            }

            let pool = pools.entry(item.event.asset.clone()).or_default();

            match item.event.event_type {
                EventKind::Buy | EventKind::Vest | EventKind::Income => {
                    row.buy_quantity = Some(record.quantity);
                    row.buy_price = Some(item.event.price);
                    let buy_value = item.event.price * record.quantity;
                    let buy_value_gbp = buy_value * currency_to_gbp;
                    row.buy_value = Some(buy_value);
                    row.buy_value_gbp = Some(buy_value_gbp);
                    row.fee_value = Some(item.event.fee_value);
                    let fee_gbp = item.event.fee_value * currency_to_gbp;

                    if record.rule == TaxRule::Section104 {
                        // Fee forms part of the S104 expenditure (CG51620,
                        // HS284 Example 3). Matched buys instead pass their
                        // fee to the disposal's allowable cost.
                        pool.total_cost += buy_value_gbp + fee_gbp;
                        pool.total_quantity += record.quantity;
                    }

                    if item.event.event_type == EventKind::Income {
                        taxable_events.push(TaxableEvent {
                            year,
                            asset: item.event.asset.clone(),
                            asset_type: item.event.asset_type,
                            event_type: EventKind::Income,
                            date,
                            event_count: 1,
                            disposal_proceeds: buy_value_gbp,
                            allowable_cost: Decimal::ZERO,
                            chargeable_gain: buy_value_gbp,
                            rule: None,
                            group: classify(item.event.asset_type, EventKind::Income),
                        });
                    }
                }

                _ if item.event.asset_type == AssetType::Cfd => {
                    // Partial CFD support: no share identification, the
                    // event's price carries the gross P&L directly.
                    if !item.event.quantity.is_zero() {
                        row.sell_quantity = Some(item.event.quantity);
                    }
                    let value_gbp = item.event.price * currency_to_gbp;
                    row.sell_value = Some(item.event.price);
                    row.sell_value_gbp = Some(value_gbp);
                    row.chargeable_gain = Some(value_gbp);
                    taxable_events.push(TaxableEvent {
                        year,
                        asset: item.event.asset.clone(),
                        asset_type: item.event.asset_type,
                        event_type: item.event.event_type,
                        date,
                        event_count: 1,
                        disposal_proceeds: value_gbp,
                        allowable_cost: Decimal::ZERO,
                        chargeable_gain: value_gbp,
                        rule: None,
                        group: classify(item.event.asset_type, item.event.event_type),
                    });
                    pool.last_disposal_date = Some(date);
                }

                EventKind::Eri => {
                    // Notional income raises the holding's cost basis.
                    let value_gbp = item.event.price * currency_to_gbp;
                    row.buy_value = Some(item.event.price);
                    row.buy_value_gbp = Some(value_gbp);
                    row.allowable_cost = Some(value_gbp);
                    taxable_events.push(TaxableEvent {
                        year,
                        asset: item.event.asset.clone(),
                        asset_type: item.event.asset_type,
                        event_type: EventKind::Eri,
                        date,
                        event_count: 1,
                        disposal_proceeds: value_gbp,
                        allowable_cost: Decimal::ZERO,
                        chargeable_gain: value_gbp,
                        rule: None,
                        group: classify(item.event.asset_type, EventKind::Eri),
                    });
                    pool.total_cost += value_gbp;
                }

                EventKind::CapitalReturn => {
                    // Return of capital reduces the holding's cost basis.
                    let value_gbp = item.event.price * currency_to_gbp;
                    row.sell_value = Some(item.event.price);
                    row.sell_value_gbp = Some(value_gbp);
                    row.allowable_cost = Some(value_gbp);
                    taxable_events.push(TaxableEvent {
                        year,
                        asset: item.event.asset.clone(),
                        asset_type: item.event.asset_type,
                        event_type: EventKind::CapitalReturn,
                        date,
                        event_count: 1,
                        disposal_proceeds: value_gbp,
                        allowable_cost: Decimal::ZERO,
                        chargeable_gain: value_gbp,
                        rule: None,
                        group: classify(item.event.asset_type, EventKind::CapitalReturn),
                    });
                    pool.total_cost -= value_gbp;
                    if pool.total_cost < Decimal::ZERO {
                        return Err(TaxError::PoolUnderflow {
                            asset: item.event.asset.clone(),
                            date,
                            quantity: pool.total_quantity,
                            cost: pool.total_cost,
                        });
                    }
                }

                EventKind::Dividend | EventKind::CashIncome => {
                    let value_gbp = item.event.price * currency_to_gbp;
                    row.buy_value = Some(item.event.price);
                    row.buy_value_gbp = Some(value_gbp);
                    row.allowable_cost = Some(value_gbp);
                    taxable_events.push(TaxableEvent {
                        year,
                        asset: item.event.asset.clone(),
                        asset_type: item.event.asset_type,
                        event_type: item.event.event_type,
                        date,
                        event_count: 1,
                        disposal_proceeds: value_gbp,
                        allowable_cost: Decimal::ZERO,
                        chargeable_gain: value_gbp,
                        rule: None,
                        group: classify(item.event.asset_type, item.event.event_type),
                    });
                }

                EventKind::Sell => {
                    row.sell_quantity = Some(record.quantity);
                    row.sell_price = Some(item.event.price);
                    let sell_value = item.event.price * record.quantity;
                    let sell_value_gbp = sell_value * currency_to_gbp;
                    row.sell_value = Some(sell_value);
                    row.sell_value_gbp = Some(sell_value_gbp);

                    // Commission is apportioned by matched share so a split
                    // disposal neither double-counts nor loses any of it.
                    let fee_share = if item.event.quantity.is_zero() {
                        item.event.fee_value
                    } else {
                        item.event.fee_value * record.quantity / item.event.quantity
                    };
                    row.fee_value = Some(fee_share);
                    let fee_share_gbp = fee_share * currency_to_gbp;

                    let allowable_cost = if record.rule == TaxRule::Section104 {
                        if pool.total_quantity <= Decimal::ZERO {
                            return Err(TaxError::PoolUnderflow {
                                asset: item.event.asset.clone(),
                                date,
                                quantity: pool.total_quantity,
                                cost: pool.total_cost,
                            });
                        }
                        let alloc = record.quantity / pool.total_quantity * pool.total_cost;
                        pool.total_cost -= alloc;
                        pool.total_quantity -= record.quantity;
                        if pool.total_cost < Decimal::ZERO
                            || pool.total_quantity < Decimal::ZERO
                        {
                            return Err(TaxError::PoolUnderflow {
                                asset: item.event.asset.clone(),
                                date,
                                quantity: pool.total_quantity,
                                cost: pool.total_cost,
                            });
                        }
                        alloc
                    } else {
                        // Matched shares inherit their specific acquisition
                        // cost, converted at the buy's own date and currency.
                        let buy = &matched[record.counterparty].event;
                        let buy_rate = oracle.get_rate(buy.timestamp, &buy.currency)?;
                        if buy_rate <= Decimal::ZERO {
                            return Err(TaxError::InvalidRate {
                                currency: buy.currency.clone(),
                            });
                        }
                        (buy.price * record.quantity + buy.fee_value) / buy_rate
                    };
                    row.allowable_cost = Some(allowable_cost);

                    let chargeable_gain = sell_value_gbp - allowable_cost - fee_share_gbp;
                    row.chargeable_gain = Some(chargeable_gain);

                    // One disposal per asset per day (CG51560): only the
                    // first match of a disposal counts, and only when the
                    // pool has not already recorded a disposal on this date.
                    let event_count =
                        u32::from(match_index == 0 && pool.last_disposal_date != Some(date));
                    taxable_events.push(TaxableEvent {
                        year,
                        asset: item.event.asset.clone(),
                        asset_type: item.event.asset_type,
                        event_type: EventKind::Sell,
                        date,
                        event_count,
                        disposal_proceeds: sell_value_gbp,
                        allowable_cost: allowable_cost + fee_share_gbp,
                        chargeable_gain,
                        rule: Some(record.rule),
                        group: classify(item.event.asset_type, EventKind::Sell),
                    });
                    pool.last_disposal_date = Some(date);
                }

                EventKind::StockSplit => {
                    // The multiplier is stored in the quantity field.
                    row.split_multiplier = Some(item.event.quantity);
                    pool.total_quantity *= item.event.quantity;
                }
            }

            row.pool_quantity = pool.total_quantity;
            row.pool_cost = pool.total_cost;
            sections.push(&item.event.asset, row);
        }
    }

    if !sections.is_empty() {
        flush_year(
            &mut rows,
            &mut sections,
            dividers[year_cursor],
            dividers[year_cursor + 1],
        );
    }

    taxable_events.sort_by_key(|record| record.date);

    Ok(TaxReport {
        rows,
        taxable_events,
        pools,
        asset_types,
    })
}

/// Current tax year's start: this calendar year from April 6, else the
/// previous one.
fn default_end_year(today: NaiveDate) -> i32 {
    TaxYear::from_date(today).start_year()
}

/// One year before the earliest event, so the first event never precedes
/// the first boundary. Falls back to `end_year` for an empty input.
fn default_start_year(events: &[Event], end_year: i32) -> Result<i32, TaxError> {
    let Some(first) = events.first() else {
        return Ok(end_year);
    };
    Ok(first.date()?.year() - 1)
}

/// Event rows of the tax year being accumulated, grouped per asset in
/// first-seen order.
#[derive(Debug, Default)]
struct YearSections {
    order: Vec<String>,
    rows: HashMap<String, Vec<EventRow>>,
}

impl YearSections {
    fn push(&mut self, asset: &str, row: EventRow) {
        if !self.rows.contains_key(asset) {
            self.order.push(asset.to_string());
        }
        self.rows.entry(asset.to_string()).or_default().push(row);
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Emit one complete tax-year segment: header, asset sections with their
/// event rows, then the year-summary marker.
fn flush_year(
    rows: &mut Vec<Row>,
    sections: &mut YearSections,
    year_start: NaiveDate,
    next_year_start: NaiveDate,
) {
    let year_end = next_year_start.pred_opt().unwrap_or(next_year_start);
    rows.push(Row::YearHeader(YearHeaderRow {
        period: format!(
            "{} - {}",
            year_start.format("%b %d %Y"),
            year_end.format("%b %d %Y")
        ),
    }));

    for asset in std::mem::take(&mut sections.order) {
        rows.push(Row::AssetSection(AssetSectionRow {
            asset: asset.clone(),
        }));
        if let Some(event_rows) = sections.rows.remove(&asset) {
            rows.extend(event_rows.into_iter().map(|row| Row::Event(Box::new(row))));
        }
    }

    rows.push(Row::YearSummary(YearSummaryRow {
        year: year_start.year(),
        year_end: year_end.format("%b %d %Y").to_string(),
    }));
}
