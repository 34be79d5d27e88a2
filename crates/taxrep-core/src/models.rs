use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::classify::GainGroup;
use crate::error::TaxError;

/// Remainders smaller than this are treated as zero during matching.
/// Absorbs decimal representation drift in user input.
pub fn quantity_epsilon() -> Decimal {
    Decimal::new(1, 8)
}

/// Kind of tax-related event produced by the ledger parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventKind {
    Buy,
    Sell,
    Vest,
    #[serde(rename = "Stock Split")]
    StockSplit,
    // The next three never affect the cost basis of any asset
    Income,
    Dividend,
    #[serde(rename = "Cash Income")]
    CashIncome,
    // Adjusts the cost basis of the asset
    #[serde(rename = "ERI")]
    Eri,
    // Adjusts the cost basis of the asset
    #[serde(rename = "Capital Return")]
    CapitalReturn,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EventKind::Buy => "Buy",
            EventKind::Sell => "Sell",
            EventKind::Vest => "Vest",
            EventKind::StockSplit => "Stock Split",
            EventKind::Income => "Income",
            EventKind::Dividend => "Dividend",
            EventKind::CashIncome => "Cash Income",
            EventKind::Eri => "ERI",
            EventKind::CapitalReturn => "Capital Return",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AssetType {
    Stocks,
    Crypto,
    // CFD support is partial; CFD events bypass share matching entirely
    #[serde(rename = "CFD")]
    Cfd,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AssetType::Stocks => "Stocks",
            AssetType::Crypto => "Crypto",
            AssetType::Cfd => "CFD",
        };
        write!(f, "{label}")
    }
}

/// HMRC share identification rule under which a quantity was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TaxRule {
    #[serde(rename = "SD")]
    SameDay,
    #[serde(rename = "B&B")]
    BedAndBreakfast,
    #[serde(rename = "S104")]
    Section104,
}

impl std::fmt::Display for TaxRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaxRule::SameDay => "SD",
            TaxRule::BedAndBreakfast => "B&B",
            TaxRule::Section104 => "S104",
        };
        write!(f, "{label}")
    }
}

/// A normalized tax-related event. Produced by the ledger parser, immutable
/// afterwards.
///
/// `quantity` is always recorded positive; sells are negated only when rows
/// are emitted. For stock splits `quantity` holds the split multiplier, not
/// a share count. For income-type events `price` holds the gross amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub event_type: EventKind,
    pub asset_type: AssetType,
    /// Milliseconds since the Unix epoch; the UTC day is the only
    /// granularity that matters for matching.
    pub timestamp: i64,
    pub asset: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub platform: String,
    pub currency: String,
    #[serde(default)]
    pub fee_value: Decimal,
}

impl Event {
    /// UTC calendar date of this event.
    pub fn date(&self) -> Result<NaiveDate, TaxError> {
        event_date(self.timestamp)
    }
}

/// UTC calendar date of a millisecond timestamp.
pub fn event_date(timestamp_ms: i64) -> Result<NaiveDate, TaxError> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.date_naive())
        .ok_or(TaxError::InvalidTimestamp(timestamp_ms))
}

/// One matched quantity: the counterparty's index in the event list, the
/// quantity covered, and the rule that bound them. S104 records point back
/// at the event itself.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct MatchRecord {
    pub counterparty: usize,
    pub quantity: Decimal,
    pub rule: TaxRule,
}

/// An event decorated with match annotations by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct MatchedEvent {
    pub event: Event,
    pub matched: Vec<MatchRecord>,
    pub remaining_quantity: Decimal,
}

impl MatchedEvent {
    pub fn new(event: Event) -> Self {
        let remaining_quantity = event.quantity;
        Self {
            event,
            matched: Vec::new(),
            remaining_quantity,
        }
    }
}

/// Section 104 holding for one asset. Persists across tax years: it
/// represents the taxpayer's lifetime pooled holding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct AssetPool {
    pub total_quantity: Decimal,
    pub total_cost: Decimal,
    /// Used to count same-day disposals as a single disposal event
    /// (HMRC CG51560).
    pub last_disposal_date: Option<NaiveDate>,
}

/// One entry of the taxable-event table, keyed by
/// `(year, asset, asset_type)` with the key fields inlined.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TaxableEvent {
    /// Calendar year the tax year starts in (2014 means 2014/15).
    pub year: i32,
    pub asset: String,
    pub asset_type: AssetType,
    pub event_type: EventKind,
    pub date: NaiveDate,
    /// 0 or 1; same-day and multi-match disposals are deduplicated to a
    /// single counted event.
    pub event_count: u32,
    pub disposal_proceeds: Decimal,
    pub allowable_cost: Decimal,
    pub chargeable_gain: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<TaxRule>,
    pub group: GainGroup,
}

/// A UK tax year, April 6 to April 5. Displays as `YYYY/YY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxYear(i32);

impl TaxYear {
    /// # Errors
    /// Returns `TaxError::InvalidYear` outside 1900-2100.
    pub fn new(start_year: i32) -> Result<Self, TaxError> {
        if !(1900..=2100).contains(&start_year) {
            return Err(TaxError::InvalidYear(start_year));
        }
        Ok(Self(start_year))
    }

    /// Tax year containing `date`: April 5 belongs to the year that started
    /// the previous calendar year, April 6 starts a new one.
    pub fn from_date(date: NaiveDate) -> Self {
        let year = date.year();
        if date.month() < 4 || (date.month() == 4 && date.day() < 6) {
            Self(year - 1)
        } else {
            Self(year)
        }
    }

    pub fn start_year(&self) -> i32 {
        self.0
    }

    pub fn end_year(&self) -> i32 {
        self.0 + 1
    }

    /// April 6 of the start year.
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 4, 6)
    }

    /// April 5 of the following year.
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0 + 1, 4, 5)
    }

    /// `"Apr 06 2014 - Apr 05 2015"`, the row-stream year banner.
    pub fn period_label(&self) -> Option<String> {
        Some(format!(
            "{} - {}",
            self.start_date()?.format("%b %d %Y"),
            self.end_date()?.format("%b %d %Y")
        ))
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let end_short = (self.0 + 1).rem_euclid(100);
        write!(f, "{}/{:02}", self.0, end_short)
    }
}

impl Serialize for TaxYear {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TaxYear {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Some((start, end_short)) = s.split_once('/') else {
            return Err(serde::de::Error::custom(format!(
                "invalid tax year format: expected 'YYYY/YY', got '{s}'"
            )));
        };
        let start: i32 = start
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid start year: '{start}'")))?;
        let end_short: i32 = end_short.parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid end year: '{end_short}'"))
        })?;

        let expected_end = (start + 1).rem_euclid(100);
        if end_short != expected_end {
            return Err(serde::de::Error::custom(format!(
                "tax years must be consecutive: '{s}' should end with '{expected_end:02}'"
            )));
        }

        TaxYear::new(start).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for TaxYear {
    fn schema_name() -> String {
        "TaxYear".to_owned()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = generator.subschema_for::<String>().into_object();
        schema.metadata().description =
            Some("UK tax year in 'YYYY/YY' format (e.g., '2014/15')".to_owned());
        schema.string().pattern = Some(r"^\d{4}/\d{2}$".to_owned());
        schema.into()
    }
}
