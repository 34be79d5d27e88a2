//! Assignment of taxable events to HMRC reporting groups.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{AssetType, EventKind};

/// HMRC reporting group for a taxable event.
///
/// The first three are capital-gains groups; the rest are income-type and
/// never contribute to CGT liability aggregates. `Other` is a synthesised
/// placeholder for combinations no rule covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GainGroup {
    UnlistedShares,
    ListedShares,
    OtherProperty,
    Dividends,
    OtherIncome,
    NotionalDividends,
    CapitalReturn,
    Other(String),
}

impl GainGroup {
    pub fn label(&self) -> &str {
        match self {
            GainGroup::UnlistedShares => "Unlisted shares and securities",
            GainGroup::ListedShares => "Listed shares and securities",
            GainGroup::OtherProperty => "Other property, assets and gains",
            GainGroup::Dividends => "Dividends",
            GainGroup::OtherIncome => "Other income",
            GainGroup::NotionalDividends => "Notional dividends / ERI",
            GainGroup::CapitalReturn => "Capital return",
            GainGroup::Other(name) => name,
        }
    }

    /// Whether this group feeds the capital-gains totals (as opposed to the
    /// income-type groups).
    pub fn is_capital_gains(&self) -> bool {
        matches!(
            self,
            GainGroup::UnlistedShares | GainGroup::ListedShares | GainGroup::OtherProperty
        )
    }
}

impl std::fmt::Display for GainGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for GainGroup {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for GainGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "Unlisted shares and securities" => GainGroup::UnlistedShares,
            "Listed shares and securities" => GainGroup::ListedShares,
            "Other property, assets and gains" => GainGroup::OtherProperty,
            "Dividends" => GainGroup::Dividends,
            "Other income" => GainGroup::OtherIncome,
            "Notional dividends / ERI" => GainGroup::NotionalDividends,
            "Capital return" => GainGroup::CapitalReturn,
            _ => GainGroup::Other(s),
        })
    }
}

impl JsonSchema for GainGroup {
    fn schema_name() -> String {
        "GainGroup".to_owned()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        let mut schema = generator.subschema_for::<String>().into_object();
        schema.metadata().description =
            Some("HMRC reporting group name (e.g., 'Listed shares and securities')".to_owned());
        schema.into()
    }
}

/// Map an asset/event combination to its HMRC reporting group.
///
/// Total: combinations no rule covers yield a placeholder group named
/// `<asset_type>_<event_type>` with a warning, so one surprising event
/// cannot abort a whole report.
pub fn classify(asset_type: AssetType, event_type: EventKind) -> GainGroup {
    match (asset_type, event_type) {
        (AssetType::Cfd, _) => GainGroup::UnlistedShares,
        (AssetType::Crypto, EventKind::Income) => GainGroup::OtherIncome,
        (AssetType::Crypto, _) => GainGroup::OtherProperty,
        (_, EventKind::Dividend) => GainGroup::Dividends,
        (_, EventKind::CashIncome) => GainGroup::OtherIncome,
        (_, EventKind::Sell) => GainGroup::ListedShares,
        (_, EventKind::Eri) => GainGroup::NotionalDividends,
        (_, EventKind::CapitalReturn) => GainGroup::CapitalReturn,
        (asset_type, event_type) => {
            log::warn!("no reporting group for asset type {asset_type} and event type {event_type}");
            GainGroup::Other(format!("{asset_type}_{event_type}"))
        }
    }
}
