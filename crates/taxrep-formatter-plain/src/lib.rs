//! Plain text renderer for the tax report row stream.
//!
//! Walks the ordered rows, printing year banners, asset sections and event
//! lines, and expands each year-summary marker into the per-group totals.
//! All display rounding (2 dp) happens here and only here.

use rust_decimal::Decimal;
use std::fmt::Write;
use taxrep_core::{EventKind, EventRow, Row, TaxReport, YearSummary};

/// Render a report and its aggregated summaries as plain text.
pub fn format_report(report: &TaxReport, summaries: &[YearSummary]) -> String {
    let mut out = String::new();

    for row in &report.rows {
        match row {
            Row::YearHeader(header) => {
                let _ = writeln!(out, "\n# Tax year: {}", header.period);
            }
            Row::AssetSection(section) => {
                let asset_type = report
                    .asset_types
                    .get(&section.asset)
                    .map(|t| format!(" ({t})"))
                    .unwrap_or_default();
                let _ = writeln!(out, "\n## {}{}", section.asset, asset_type);
            }
            Row::Event(event_row) => {
                format_event_row(&mut out, event_row);
            }
            Row::YearSummary(marker) => {
                let _ = writeln!(out, "\nSummary for tax year ending {}", marker.year_end);
                if let Some(summary) = summaries.iter().find(|s| s.year == marker.year) {
                    format_year_summary(&mut out, summary);
                }
            }
        }
    }

    out.trim_start_matches('\n').to_string()
}

fn format_event_row(out: &mut String, row: &EventRow) {
    let date = row
        .date
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| " ".repeat(10));

    let detail = if let Some(multiplier) = row.split_multiplier {
        format!("x {}", format_decimal(multiplier))
    } else if let Some(quantity) = row.buy_quantity {
        format!(
            "buy {} @ {} {}",
            format_decimal(quantity),
            format_decimal(row.buy_price.unwrap_or(Decimal::ZERO)),
            row.currency
        )
    } else if let Some(quantity) = row.sell_quantity {
        format!(
            "sell {} @ {} {}",
            format_decimal(quantity),
            format_decimal(row.sell_price.unwrap_or(Decimal::ZERO)),
            row.currency
        )
    } else if let Some(value) = row.buy_value.or(row.sell_value) {
        format!("{} {}", format_decimal(value), row.currency)
    } else {
        String::new()
    };

    let gain = match (row.event, row.chargeable_gain) {
        (EventKind::Sell, Some(gain)) => format!("  gain {}", format_currency(gain)),
        _ => String::new(),
    };

    let _ = writeln!(
        out,
        "{date} {:<14} [{:<4}] {detail}{gain}  (pool: {} @ {})",
        row.event.to_string(),
        row.rule.to_string(),
        format_decimal(row.pool_quantity),
        format_currency(row.pool_cost)
    );
}

fn format_year_summary(out: &mut String, summary: &YearSummary) {
    for (group, totals) in &summary.groups {
        let _ = writeln!(out, "\n{group}");
        let _ = writeln!(out, "  Number of taxable events: {}", totals.event_count);
        if group.is_capital_gains() {
            let _ = writeln!(
                out,
                "  Disposal proceeds: {}",
                format_currency(totals.disposal_proceeds)
            );
            let _ = writeln!(
                out,
                "  Allowable costs: {}",
                format_currency(totals.allowable_cost)
            );
        }
        let _ = writeln!(
            out,
            "  Total year gains: {}",
            format_currency(totals.total_gains)
        );
        if group.is_capital_gains() {
            let _ = writeln!(
                out,
                "  Total year losses: {}",
                format_currency(totals.total_losses)
            );
        }
    }
    let _ = writeln!(
        out,
        "\nTotal capital gains: {}",
        format_currency(summary.total_capital_gains)
    );
}

/// `£1234.56` with display rounding to 2 dp; negatives as `-£19.60`.
fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded.is_sign_negative() {
        format!("-£{:.2}", -rounded)
    } else {
        format!("£{rounded:.2}")
    }
}

/// Quantities and prices with trailing zeros trimmed.
fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use taxrep_core::{
        AssetType, Event, EventKind, ReportOptions, generate_report, summarize,
    };
    use taxrep_rates::LedgerRates;

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_hms_opt(0, 0, 0)
            .expect("valid time")
            .and_utc()
            .timestamp_millis()
    }

    fn event(kind: EventKind, y: i32, m: u32, d: u32, quantity: Decimal, price: Decimal) -> Event {
        Event {
            event_type: kind,
            asset_type: AssetType::Stocks,
            timestamp: ts(y, m, d),
            asset: "ACME".to_string(),
            quantity,
            price,
            platform: "Broker".to_string(),
            currency: "GBP".to_string(),
            fee_value: Decimal::ZERO,
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::from(100)), "£100.00");
        assert_eq!(format_currency(Decimal::new(-196, 1)), "-£19.60");
        assert_eq!(format_currency(Decimal::new(123456, 3)), "£123.46");
    }

    #[test]
    fn test_format_decimal_trims_trailing_zeros() {
        assert_eq!(format_decimal(dec!(500.00)), "500");
        assert_eq!(format_decimal(dec!(2.90)), "2.9");
    }

    #[test]
    fn renders_year_banner_sections_and_summary() {
        let events = vec![
            event(EventKind::Buy, 2023, 1, 1, dec!(100), dec!(10)),
            event(EventKind::Sell, 2023, 6, 1, dec!(50), dec!(12)),
        ];
        let report = generate_report(
            events,
            &LedgerRates::new(),
            &ReportOptions {
                start_year: Some(2022),
                end_year: Some(2023),
            },
        )
        .expect("report");
        let summaries = summarize(&report.taxable_events);

        let output = format_report(&report, &summaries);

        assert!(output.contains("# Tax year: Apr 06 2022 - Apr 05 2023"));
        assert!(output.contains("## ACME (Stocks)"));
        assert!(output.contains("Summary for tax year ending Apr 05 2024"));
        assert!(output.contains("Listed shares and securities"));
        assert!(output.contains("Number of taxable events: 1"));
        // 50 × 12 proceeds against 50 × 10 cost.
        assert!(output.contains("Total year gains: £100.00"));
        assert!(output.contains("Total capital gains: £100.00"));
    }

    #[test]
    fn stock_split_rows_render_the_multiplier() {
        let events = vec![
            event(EventKind::Buy, 2023, 1, 1, dec!(100), dec!(10)),
            event(EventKind::StockSplit, 2023, 2, 1, dec!(2), Decimal::ZERO),
        ];
        let report = generate_report(
            events,
            &LedgerRates::new(),
            &ReportOptions {
                start_year: Some(2022),
                end_year: Some(2023),
            },
        )
        .expect("report");

        let output = format_report(&report, &[]);
        assert!(output.contains("x 2"));
    }
}
