//! Pre-flight validation of the normalized event stream.
//!
//! Catches malformed input before the engine runs. Errors prevent a
//! calculation; warnings flag events the engine will process anyway (a
//! disposal with zero price is still recorded, per the recovery policy for
//! malformed events).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::models::{Event, EventKind};

/// Result of validating an event list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// True when there are no errors (warnings are allowed).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// True when there are no errors or warnings.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// A single finding, tied to the event's position in the input.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub asset: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.date {
            Some(date) => write!(
                f,
                "event #{}: {} on {} - {}",
                self.index, self.asset, date, self.message
            ),
            None => write!(f, "event #{}: {} - {}", self.index, self.asset, self.message),
        }
    }
}

/// Validate an event list before calculation. Never mutates events.
pub fn validate(events: &[Event]) -> ValidationResult {
    let mut result = ValidationResult::default();

    // First acquisition date per asset for the sell-before-buy warning.
    let mut first_acquisition: HashMap<&str, NaiveDate> = HashMap::new();
    for event in events {
        if matches!(event.event_type, EventKind::Buy | EventKind::Vest) {
            if let Ok(date) = event.date() {
                first_acquisition
                    .entry(event.asset.as_str())
                    .and_modify(|d| {
                        if date < *d {
                            *d = date;
                        }
                    })
                    .or_insert(date);
            }
        }
    }

    for (index, event) in events.iter().enumerate() {
        let date = event.date().ok();
        let error = |message: String, result: &mut ValidationResult| {
            result.errors.push(ValidationIssue {
                index,
                date,
                asset: event.asset.clone(),
                message,
            });
        };

        if date.is_none() {
            error(
                format!("unrepresentable timestamp {} ms", event.timestamp),
                &mut result,
            );
        }

        if event.quantity < Decimal::ZERO {
            error(
                format!("{} with negative quantity: {}", event.event_type, event.quantity),
                &mut result,
            );
        }

        if event.price < Decimal::ZERO {
            error(
                format!("{} with negative price: {}", event.event_type, event.price),
                &mut result,
            );
        }

        if event.fee_value < Decimal::ZERO {
            error(
                format!("{} with negative fee: {}", event.event_type, event.fee_value),
                &mut result,
            );
        }

        if event.event_type == EventKind::StockSplit && event.quantity.is_zero() {
            error("stock split with zero multiplier".to_string(), &mut result);
        }

        if event.event_type == EventKind::Sell {
            if event.price.is_zero() {
                result.warnings.push(ValidationIssue {
                    index,
                    date,
                    asset: event.asset.clone(),
                    message: "sell with zero price; disposal proceeds will be zero".to_string(),
                });
            }

            match (date, first_acquisition.get(event.asset.as_str())) {
                (Some(sell_date), Some(first)) if sell_date < *first => {
                    result.warnings.push(ValidationIssue {
                        index,
                        date,
                        asset: event.asset.clone(),
                        message: format!("sell before first acquisition (first: {first})"),
                    });
                }
                (_, None) => {
                    result.warnings.push(ValidationIssue {
                        index,
                        date,
                        asset: event.asset.clone(),
                        message: "sell with no acquisition for this asset".to_string(),
                    });
                }
                _ => {}
            }
        }
    }

    result
}
