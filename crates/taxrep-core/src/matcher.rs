//! Share matching under the HMRC identification rules.
//!
//! Two global passes run over the whole event list: Same Day first, then
//! Bed and Breakfast. The passes are global rather than per-disposal because
//! HMRC prioritises same-day matching across the board; a single combined
//! pass could let one disposal's B&B match consume shares a later disposal
//! needs for its own same-day match.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::TaxError;
use crate::models::{
    AssetType, Event, EventKind, MatchRecord, MatchedEvent, TaxRule, quantity_epsilon,
};

/// Repurchases up to this many days after a disposal are matched under the
/// Bed and Breakfast rule (TCGA92/S106A).
const BNB_WINDOW_DAYS: i64 = 30;

/// Decorate a time-sorted event list with match records.
///
/// Every disposal's quantity ends up covered by records binding it to
/// same-day buys, to buys within the 30-day window, or to the Section 104
/// pool. Events with unmatched remainder, and events with no matches at all
/// (so even zero-quantity ones like ERI), receive a trailing S104 record;
/// the report generator emits exactly one row per record.
pub fn generate_matches(events: Vec<Event>) -> Result<Vec<MatchedEvent>, TaxError> {
    let dates: Vec<NaiveDate> = events
        .iter()
        .map(|event| event.date())
        .collect::<Result<_, _>>()?;
    let mut list: Vec<MatchedEvent> = events.into_iter().map(MatchedEvent::new).collect();
    let eps = quantity_epsilon();

    for pass in [TaxRule::SameDay, TaxRule::BedAndBreakfast] {
        for i in 0..list.len() {
            if list[i].event.event_type != EventKind::Sell
                || list[i].event.asset_type == AssetType::Cfd
                || list[i].remaining_quantity < eps
            {
                continue;
            }

            // A same-day buy may be recorded before the sell it covers, so
            // candidates are scanned from the start of the list.
            for j in 0..list.len() {
                if list[j].event.asset_type == AssetType::Cfd
                    || list[j].event.event_type != EventKind::Buy
                    || list[j].event.asset != list[i].event.asset
                    || list[j].remaining_quantity < eps
                {
                    continue;
                }

                let window = dates[j] - dates[i];
                let hit = match pass {
                    TaxRule::SameDay => dates[j] == dates[i],
                    TaxRule::BedAndBreakfast => {
                        window.num_days() > 0 && window.num_days() <= BNB_WINDOW_DAYS
                    }
                    TaxRule::Section104 => false,
                };
                if hit {
                    bind(&mut list, i, j, pass);
                }

                if list[i].remaining_quantity < eps {
                    break;
                }
            }
        }
    }

    for i in 0..list.len() {
        if list[i].remaining_quantity >= eps || list[i].matched.is_empty() {
            let remaining = list[i].remaining_quantity;
            let quantity = if remaining < eps {
                Decimal::ZERO
            } else {
                remaining
            };
            list[i].matched.push(MatchRecord {
                counterparty: i,
                quantity,
                rule: TaxRule::Section104,
            });
            list[i].remaining_quantity = Decimal::ZERO;
        }
    }

    Ok(list)
}

/// Record a match between the sell at `i` and the buy at `j`, symmetric on
/// both sides, and reduce both remainders.
fn bind(list: &mut [MatchedEvent], i: usize, j: usize, rule: TaxRule) {
    let quantity = list[i]
        .remaining_quantity
        .min(list[j].remaining_quantity);

    log::debug!(
        "matched {} {}: sell #{} ({} left) with buy #{} ({} left) under {}",
        quantity,
        list[i].event.asset,
        i,
        list[i].remaining_quantity - quantity,
        j,
        list[j].remaining_quantity - quantity,
        rule
    );

    list[i].matched.push(MatchRecord {
        counterparty: j,
        quantity,
        rule,
    });
    list[j].matched.push(MatchRecord {
        counterparty: i,
        quantity,
        rule,
    });
    list[i].remaining_quantity -= quantity;
    list[j].remaining_quantity -= quantity;
}
