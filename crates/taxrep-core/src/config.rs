//! Parser-facing configuration: how ledger accounts, tags and symbols map
//! onto normalized events.
//!
//! The ledger parser itself lives outside this crate; this module defines
//! the configuration object it consumes, with embedded TOML defaults and
//! optional override files.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::TaxError;
use crate::models::{AssetType, EventKind};

/// Built-in defaults, compiled into the binary.
static EMBEDDED_CONFIG: &str = include_str!("../data/config.toml");

/// Maps accounts matching `pattern` to a platform name and the asset type
/// assumed for assets held there.
#[derive(Debug, Clone)]
pub struct PlatformMapping {
    pub pattern: Regex,
    pub platform: String,
    pub default_asset_type: AssetType,
}

/// Canonical symbol and type for a raw ledger symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMapping {
    pub canonical: String,
    pub asset_type: AssetType,
}

/// Raw configuration as parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    commission_account: String,
    income_account: String,
    ignored_account: String,
    #[serde(default)]
    ignored_currencies: Vec<String>,
    #[serde(default)]
    platform: Vec<RawPlatformMapping>,
    #[serde(default)]
    asset: Vec<RawAssetMapping>,
    #[serde(default)]
    tag_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPlatformMapping {
    pattern: String,
    platform: String,
    #[serde(default = "default_asset_type")]
    asset_type: AssetType,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAssetMapping {
    symbol: String,
    canonical: String,
    #[serde(default = "default_asset_type")]
    asset_type: AssetType,
}

fn default_asset_type() -> AssetType {
    AssetType::Stocks
}

/// The configuration object handed to the ledger parser.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub platform_mappings: Vec<PlatformMapping>,
    pub asset_mappings: HashMap<String, AssetMapping>,
    pub tag_aliases: HashMap<String, String>,
    pub commission_account: Regex,
    pub income_account: Regex,
    pub ignored_account: Regex,
    pub ignored_currencies: Vec<String>,
}

impl LedgerConfig {
    /// Load the embedded default configuration.
    pub fn embedded() -> Result<Self, TaxError> {
        Self::from_toml(EMBEDDED_CONFIG)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, TaxError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|err| TaxError::InvalidConfig(err.to_string()))?;

        let platform_mappings = raw
            .platform
            .into_iter()
            .map(|mapping| {
                Ok(PlatformMapping {
                    pattern: compile(&mapping.pattern)?,
                    platform: mapping.platform,
                    default_asset_type: mapping.asset_type,
                })
            })
            .collect::<Result<Vec<_>, TaxError>>()?;

        let asset_mappings = raw
            .asset
            .into_iter()
            .map(|mapping| {
                (
                    mapping.symbol,
                    AssetMapping {
                        canonical: mapping.canonical,
                        asset_type: mapping.asset_type,
                    },
                )
            })
            .collect();

        Ok(Self {
            platform_mappings,
            asset_mappings,
            tag_aliases: raw.tag_aliases,
            commission_account: compile(&raw.commission_account)?,
            income_account: compile(&raw.income_account)?,
            ignored_account: compile(&raw.ignored_account)?,
            ignored_currencies: raw.ignored_currencies,
        })
    }

    /// Platform and default asset type for an account. Falls back to the
    /// account name itself with `Stocks` when nothing matches; two mappings
    /// claiming the same account for different platforms is a configuration
    /// error.
    pub fn platform_for(&self, account: &str) -> Result<(String, AssetType), TaxError> {
        let mut result: Option<(String, AssetType)> = None;
        for mapping in &self.platform_mappings {
            if mapping.pattern.is_match(account) {
                if let Some((existing, _)) = &result {
                    if *existing != mapping.platform {
                        return Err(TaxError::InvalidConfig(format!(
                            "account '{account}' matches both platform '{existing}' and '{}'",
                            mapping.platform
                        )));
                    }
                }
                result = Some((mapping.platform.clone(), mapping.default_asset_type));
            }
        }
        Ok(result.unwrap_or_else(|| (account.to_string(), AssetType::Stocks)))
    }

    /// Canonical symbol and asset type for a raw symbol, defaulting to the
    /// symbol itself with the platform's asset type.
    pub fn canonical_asset(&self, symbol: &str, default_type: AssetType) -> (String, AssetType) {
        match self.asset_mappings.get(symbol) {
            Some(mapping) => (mapping.canonical.clone(), mapping.asset_type),
            None => (symbol.to_string(), default_type),
        }
    }

    /// Resolve the tax-relevant event type for a transaction's tag set.
    ///
    /// Aliases are applied first, then the canonical tag table. At most one
    /// tag may be tax-relevant; two of them make the transaction ambiguous
    /// and that is fatal.
    pub fn resolve_tags<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a str>,
    ) -> Result<Option<EventKind>, TaxError> {
        let mut found: Option<(String, EventKind)> = None;
        for tag in tags {
            let mapped = self
                .tag_aliases
                .get(tag)
                .map(String::as_str)
                .unwrap_or(tag);
            if let Some(kind) = tag_event_type(mapped) {
                if let Some((first, _)) = &found {
                    return Err(TaxError::AmbiguousTag {
                        first: first.clone(),
                        second: tag.to_string(),
                    });
                }
                found = Some((tag.to_string(), kind));
            }
        }
        Ok(found.map(|(_, kind)| kind))
    }
}

/// Canonical ledger tag to event type table.
pub fn tag_event_type(tag: &str) -> Option<EventKind> {
    Some(match tag {
        "buy" => EventKind::Buy,
        "sell" => EventKind::Sell,
        "vest" => EventKind::Vest,
        "stock_split" => EventKind::StockSplit,
        "rewards_income" | "inflation_reward" | "staking_income" => EventKind::Income,
        "ERI" => EventKind::Eri,
        "capital_return" => EventKind::CapitalReturn,
        "interest" => EventKind::CashIncome,
        "dividend" => EventKind::Dividend,
        _ => return None,
    })
}

fn compile(pattern: &str) -> Result<Regex, TaxError> {
    Regex::new(pattern)
        .map_err(|err| TaxError::InvalidConfig(format!("bad pattern '{pattern}': {err}")))
}
