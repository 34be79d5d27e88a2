//! Per-year per-group aggregation of the taxable-event table.

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::classify::GainGroup;
use crate::models::TaxableEvent;

/// Totals for one `(year, group)` cell of the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
pub struct GroupTotals {
    /// Deduplicated disposal count (0/1 per record).
    pub event_count: u32,
    pub disposal_proceeds: Decimal,
    pub allowable_cost: Decimal,
    /// Sum of positive chargeable gains.
    pub total_gains: Decimal,
    /// Negated sum of negative chargeable gains, reported positive.
    pub total_losses: Decimal,
    pub total_taxable_gains: Decimal,
}

/// All group totals for one tax year.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct YearSummary {
    /// Calendar year the tax year starts in.
    pub year: i32,
    pub groups: BTreeMap<GainGroup, GroupTotals>,
    /// Sum of `total_taxable_gains` over the three capital-gains groups
    /// only; income-type groups never contribute.
    pub total_capital_gains: Decimal,
}

/// Fold the taxable-event table into per-year per-group totals, ordered by
/// year.
///
/// For the "Unlisted shares and securities" group, disposal proceeds are
/// reported as the sum of positive gains and allowable cost as the negated
/// sum of negative gains — the SA108 convention for that box.
pub fn summarize(taxable_events: &[TaxableEvent]) -> Vec<YearSummary> {
    let mut by_year: BTreeMap<i32, BTreeMap<GainGroup, Vec<&TaxableEvent>>> = BTreeMap::new();
    for record in taxable_events {
        by_year
            .entry(record.year)
            .or_default()
            .entry(record.group.clone())
            .or_default()
            .push(record);
    }

    by_year
        .into_iter()
        .map(|(year, by_group)| {
            let mut groups = BTreeMap::new();
            let mut total_capital_gains = Decimal::ZERO;

            for (group, records) in by_group {
                let totals = fold_group(&group, &records);
                if group.is_capital_gains() {
                    total_capital_gains += totals.total_taxable_gains;
                }
                groups.insert(group, totals);
            }

            YearSummary {
                year,
                groups,
                total_capital_gains,
            }
        })
        .collect()
}

fn fold_group(group: &GainGroup, records: &[&TaxableEvent]) -> GroupTotals {
    let mut totals = GroupTotals::default();

    for record in records {
        totals.event_count += record.event_count;
        if record.chargeable_gain > Decimal::ZERO {
            totals.total_gains += record.chargeable_gain;
        } else if record.chargeable_gain < Decimal::ZERO {
            totals.total_losses -= record.chargeable_gain;
        }
    }
    totals.total_taxable_gains = totals.total_gains - totals.total_losses;

    if *group == GainGroup::UnlistedShares {
        totals.disposal_proceeds = totals.total_gains;
        totals.allowable_cost = totals.total_losses;
    } else {
        for record in records {
            totals.disposal_proceeds += record.disposal_proceeds;
            totals.allowable_cost += record.allowable_cost;
        }
    }

    totals
}
