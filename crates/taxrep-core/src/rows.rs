//! The ordered row stream consumed by renderers.
//!
//! Four row shapes interleave in a fixed order per tax year: the year
//! header, asset sections with their event rows, then the year-summary
//! marker. Renderers dispatch on the variant.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;

use crate::models::{EventKind, TaxRule};

/// `"%d/%m/%Y"` date cells, matching the original spreadsheet output.
mod row_date {
    use chrono::NaiveDate;
    use serde::Serializer;

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format("%d/%m/%Y").to_string()),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Row {
    YearHeader(YearHeaderRow),
    AssetSection(AssetSectionRow),
    Event(Box<EventRow>),
    YearSummary(YearSummaryRow),
}

/// Marks the start of a tax year: `{"Next year": "Apr 06 2014 - Apr 05 2015"}`.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct YearHeaderRow {
    #[serde(rename = "Next year")]
    pub period: String,
}

/// Groups the event rows that follow under one asset.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct AssetSectionRow {
    #[serde(rename = "AssetSection")]
    pub asset: String,
}

/// Terminates a tax year: `{"Year (int)": 2014, "Year end": "Apr 05 2015"}`.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct YearSummaryRow {
    #[serde(rename = "Year (int)")]
    pub year: i32,
    #[serde(rename = "Year end")]
    pub year_end: String,
}

/// One columnar row per match record of an event.
///
/// Only the first match record of an event carries `Date`, `Asset` and
/// `Platform`; follow-up records of the same event leave them blank.
/// Renderers rely on that to visually group split matches.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct EventRow {
    #[serde(
        rename = "Date",
        skip_serializing_if = "Option::is_none",
        serialize_with = "row_date::serialize"
    )]
    #[schemars(with = "Option<String>")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Event")]
    pub event: EventKind,
    #[serde(rename = "Asset", skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(rename = "Platform", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "Rule")]
    pub rule: TaxRule,
    #[serde(rename = "Currency")]
    pub currency: String,
    /// Units of `currency` one pound buys at this event's timestamp.
    #[serde(rename = "GBP to currency rate")]
    pub gbp_to_currency: Decimal,
    /// Reciprocal of the above; stored for auditability.
    #[serde(rename = "Currency to GBP rate")]
    pub currency_to_gbp: Decimal,
    #[serde(rename = "Buy Quantity", skip_serializing_if = "Option::is_none")]
    pub buy_quantity: Option<Decimal>,
    #[serde(rename = "Buy Price", skip_serializing_if = "Option::is_none")]
    pub buy_price: Option<Decimal>,
    #[serde(rename = "Buy Value in Currency", skip_serializing_if = "Option::is_none")]
    pub buy_value: Option<Decimal>,
    #[serde(rename = "Buy Value in GBP", skip_serializing_if = "Option::is_none")]
    pub buy_value_gbp: Option<Decimal>,
    #[serde(rename = "Sell Quantity", skip_serializing_if = "Option::is_none")]
    pub sell_quantity: Option<Decimal>,
    #[serde(rename = "Sell Price", skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<Decimal>,
    #[serde(rename = "Sell Value in Currency", skip_serializing_if = "Option::is_none")]
    pub sell_value: Option<Decimal>,
    #[serde(rename = "Sell Value in GBP", skip_serializing_if = "Option::is_none")]
    pub sell_value_gbp: Option<Decimal>,
    /// For disposals this is the record's apportioned share of the sell
    /// commission; buys show the full commission.
    #[serde(rename = "Fee Value in Currency", skip_serializing_if = "Option::is_none")]
    pub fee_value: Option<Decimal>,
    #[serde(rename = "Split Multiplier", skip_serializing_if = "Option::is_none")]
    pub split_multiplier: Option<Decimal>,
    #[serde(rename = "Allowable cost", skip_serializing_if = "Option::is_none")]
    pub allowable_cost: Option<Decimal>,
    #[serde(rename = "Chargeable gain", skip_serializing_if = "Option::is_none")]
    pub chargeable_gain: Option<Decimal>,
    #[serde(rename = "Total shares in pool")]
    pub pool_quantity: Decimal,
    #[serde(rename = "Total cost in pool")]
    pub pool_cost: Decimal,
}

impl EventRow {
    pub fn new(
        event: EventKind,
        rule: TaxRule,
        currency: String,
        gbp_to_currency: Decimal,
        currency_to_gbp: Decimal,
    ) -> Self {
        Self {
            date: None,
            event,
            asset: None,
            platform: None,
            rule,
            currency,
            gbp_to_currency,
            currency_to_gbp,
            buy_quantity: None,
            buy_price: None,
            buy_value: None,
            buy_value_gbp: None,
            sell_quantity: None,
            sell_price: None,
            sell_value: None,
            sell_value_gbp: None,
            fee_value: None,
            split_multiplier: None,
            allowable_cost: None,
            chargeable_gain: None,
            pool_quantity: Decimal::ZERO,
            pool_cost: Decimal::ZERO,
        }
    }
}
