#![allow(clippy::expect_used)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use taxrep_core::{
    AssetType, Event, EventKind, GainGroup, ReportOptions, Row, TaxError, TaxRule,
    generate_report,
};
use taxrep_rates::{LedgerRates, PricePoint};

fn ts(y: i32, m: u32, d: u32) -> i64 {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("valid date")
        .and_hms_opt(0, 0, 0)
        .expect("valid time")
        .and_utc()
        .timestamp_millis()
}

fn event(
    kind: EventKind,
    asset: &str,
    y: i32,
    m: u32,
    d: u32,
    quantity: Decimal,
    price: Decimal,
) -> Event {
    Event {
        event_type: kind,
        asset_type: AssetType::Stocks,
        timestamp: ts(y, m, d),
        asset: asset.to_string(),
        quantity,
        price,
        platform: "Broker".to_string(),
        currency: "GBP".to_string(),
        fee_value: Decimal::ZERO,
    }
}

fn options(start_year: i32, end_year: i32) -> ReportOptions {
    ReportOptions {
        start_year: Some(start_year),
        end_year: Some(end_year),
    }
}

fn no_rates() -> LedgerRates {
    LedgerRates::new()
}

// HMRC HS284 Example: a disposal repurchased within 30 days is matched
// under bed and breakfast; the untouched holding stays pooled.
#[test]
fn hmrc_bed_and_breakfast_example() {
    let events = vec![
        event(EventKind::Buy, "LOBSTER", 2014, 5, 1, dec!(1000), dec!(2.80)),
        event(EventKind::Sell, "LOBSTER", 2015, 3, 12, dec!(500), dec!(3.00)),
        event(EventKind::Buy, "LOBSTER", 2015, 4, 1, dec!(700), dec!(2.90)),
    ];

    let report = generate_report(events, &no_rates(), &options(2013, 2015)).expect("report");

    let disposals: Vec<_> = report
        .taxable_events
        .iter()
        .filter(|t| t.event_type == EventKind::Sell)
        .collect();
    assert_eq!(disposals.len(), 1);
    let disposal = disposals[0];
    assert_eq!(disposal.rule, Some(TaxRule::BedAndBreakfast));
    assert_eq!(disposal.disposal_proceeds, dec!(1500));
    assert_eq!(disposal.allowable_cost, dec!(1450));
    assert_eq!(disposal.chargeable_gain, dec!(50));
    assert_eq!(disposal.event_count, 1);
    assert_eq!(disposal.year, 2014);
    assert_eq!(disposal.group, GainGroup::ListedShares);

    // 1000 untouched from 2014 plus 200 left of the April buy.
    let pool = &report.pools["LOBSTER"];
    assert_eq!(pool.total_quantity, dec!(1200));
    assert_eq!(pool.total_cost, dec!(2800) + dec!(580));
}

// Two sells of the same asset on one day count as a single disposal event.
#[test]
fn same_day_disposals_merge_into_one_event() {
    let events = vec![
        event(EventKind::Buy, "TESTSTOCK", 2023, 1, 1, dec!(1000), dec!(10)),
        event(EventKind::Sell, "TESTSTOCK", 2023, 6, 1, dec!(100), dec!(12)),
        event(EventKind::Sell, "TESTSTOCK", 2023, 6, 1, dec!(50), dec!(12)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let counts: Vec<u32> = report
        .taxable_events
        .iter()
        .filter(|t| t.event_type == EventKind::Sell)
        .map(|t| t.event_count)
        .collect();
    assert_eq!(counts, vec![1, 0]);
}

// Commission on a disposal split between B&B and S104 is apportioned by
// matched share, never duplicated or lost.
#[test]
fn commission_splits_between_s104_and_bed_and_breakfast() {
    let mut sell = event(EventKind::Sell, "TESTSTOCK", 2023, 6, 1, dec!(500), dec!(12));
    sell.fee_value = dec!(20);
    let events = vec![
        event(EventKind::Buy, "TESTSTOCK", 2023, 1, 1, dec!(1000), dec!(10)),
        sell,
        event(EventKind::Buy, "TESTSTOCK", 2023, 6, 2, dec!(300), dec!(11)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let disposals: Vec<_> = report
        .taxable_events
        .iter()
        .filter(|t| t.event_type == EventKind::Sell)
        .collect();
    assert_eq!(disposals.len(), 2);

    let bnb = disposals
        .iter()
        .find(|t| t.rule == Some(TaxRule::BedAndBreakfast))
        .expect("B&B record");
    let s104 = disposals
        .iter()
        .find(|t| t.rule == Some(TaxRule::Section104))
        .expect("S104 record");

    // B&B: 300 × 11 buy cost plus 60% of the 20.00 commission.
    assert_eq!(bnb.allowable_cost, dec!(3312.00));
    // S104: 200/1000 of the 10000 pool plus 40% of the commission.
    assert_eq!(s104.allowable_cost, dec!(2008.00));

    // Total commission effect across both records is exactly 20.00.
    let commission_effect = (bnb.allowable_cost - dec!(3300)) + (s104.allowable_cost - dec!(2000));
    assert_eq!(commission_effect, dec!(20.00));

    // Gains reflect the same apportionment.
    assert_eq!(bnb.chargeable_gain, dec!(3600) - dec!(3300) - dec!(12));
    assert_eq!(s104.chargeable_gain, dec!(2400) - dec!(2000) - dec!(8));
}

// ERI raises the pool's cost basis and records notional-dividend income.
#[test]
fn eri_raises_cost_basis_and_records_income() {
    let mut eri = event(EventKind::Eri, "FUND", 2023, 3, 1, Decimal::ZERO, dec!(50));
    eri.quantity = Decimal::ZERO;
    let events = vec![
        event(EventKind::Buy, "FUND", 2023, 1, 1, dec!(100), dec!(10)),
        eri,
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let pool = &report.pools["FUND"];
    assert_eq!(pool.total_cost, dec!(1050));
    assert_eq!(pool.total_quantity, dec!(100));

    let record = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::Eri)
        .expect("ERI record");
    assert_eq!(record.chargeable_gain, dec!(50));
    assert_eq!(record.group, GainGroup::NotionalDividends);
    assert_eq!(record.year, 2022);
}

// A 2:1 split doubles the pooled quantity and leaves cost untouched.
#[test]
fn stock_split_multiplies_quantity_only() {
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(100), dec!(10)),
        event(EventKind::StockSplit, "ACME", 2023, 2, 1, dec!(2), Decimal::ZERO),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let pool = &report.pools["ACME"];
    assert_eq!(pool.total_quantity, dec!(200));
    assert_eq!(pool.total_cost, dec!(1000));
    // Splits are recorded but never taxable.
    assert!(
        report
            .taxable_events
            .iter()
            .all(|t| t.event_type != EventKind::StockSplit)
    );
}

// A capital return reduces the pool's cost basis and is reported in its
// own group.
#[test]
fn capital_return_reduces_cost_basis() {
    let mut cap = event(EventKind::CapitalReturn, "ACME", 2023, 3, 1, Decimal::ZERO, dec!(100));
    cap.quantity = Decimal::ZERO;
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(100), dec!(10)),
        cap,
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    assert_eq!(report.pools["ACME"].total_cost, dec!(900));

    let record = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::CapitalReturn)
        .expect("capital return record");
    assert_eq!(record.chargeable_gain, dec!(100));
    assert_eq!(record.group, GainGroup::CapitalReturn);
}

#[test]
fn capital_return_exceeding_pool_cost_underflows() {
    let mut cap = event(EventKind::CapitalReturn, "ACME", 2023, 3, 1, Decimal::ZERO, dec!(1200));
    cap.quantity = Decimal::ZERO;
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(100), dec!(10)),
        cap,
    ];

    let err = generate_report(events, &no_rates(), &options(2022, 2023)).expect_err("underflow");
    assert!(matches!(err, TaxError::PoolUnderflow { .. }));
}

#[test]
fn disposal_from_an_empty_pool_underflows() {
    let events = vec![event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(10), dec!(12))];

    let err = generate_report(events, &no_rates(), &options(2022, 2023)).expect_err("underflow");
    assert!(matches!(err, TaxError::PoolUnderflow { ref asset, .. } if asset == "ACME"));
}

// Matched shares inherit the buy's acquisition cost converted at the buy's
// own date and currency, not the sell's.
#[test]
fn bed_and_breakfast_cost_converts_at_the_buy_date() {
    let rates = LedgerRates::from_prices([
        PricePoint {
            date: NaiveDate::from_ymd_opt(2023, 1, 10).expect("valid date"),
            base: "GBP".to_string(),
            quote: "USD".to_string(),
            rate: dec!(1.20),
        },
        PricePoint {
            date: NaiveDate::from_ymd_opt(2023, 1, 20).expect("valid date"),
            base: "GBP".to_string(),
            quote: "USD".to_string(),
            rate: dec!(1.25),
        },
    ]);

    let mut buy = event(EventKind::Buy, "ACME", 2023, 1, 20, dec!(100), dec!(15));
    buy.currency = "USD".to_string();
    let events = vec![
        event(EventKind::Sell, "ACME", 2023, 1, 10, dec!(100), dec!(14)),
        buy,
    ];

    let report = generate_report(events, &rates, &options(2022, 2023)).expect("report");

    let disposal = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::Sell)
        .expect("disposal");
    assert_eq!(disposal.rule, Some(TaxRule::BedAndBreakfast));
    // 1500 USD at the buy-date rate of 1.25, not the sell-date 1.20.
    assert_eq!(disposal.allowable_cost, dec!(1200));
    assert_eq!(disposal.chargeable_gain, dec!(1400) - dec!(1200));
}

// GBX amounts are pence: fixed rate of 100 per GBP.
#[test]
fn gbx_amounts_convert_at_one_hundred() {
    let mut buy = event(EventKind::Buy, "VOD", 2023, 1, 1, dec!(100), dec!(250));
    buy.currency = "GBX".to_string();
    let events = vec![buy];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    // 100 × 250p = 25000p = £250.
    assert_eq!(report.pools["VOD"].total_cost, dec!(250));
}

// Income events add to the pool like buys and record income for the year.
#[test]
fn crypto_income_pools_and_reports_as_other_income() {
    let mut income = event(EventKind::Income, "ETH", 2023, 2, 1, dec!(2), dec!(1500));
    income.asset_type = AssetType::Crypto;
    let events = vec![income];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    assert_eq!(report.pools["ETH"].total_quantity, dec!(2));
    assert_eq!(report.pools["ETH"].total_cost, dec!(3000));

    let record = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::Income)
        .expect("income record");
    assert_eq!(record.chargeable_gain, dec!(3000));
    assert_eq!(record.group, GainGroup::OtherIncome);
}

#[test]
fn dividends_are_recorded_without_touching_the_pool() {
    let mut dividend = event(EventKind::Dividend, "ACME", 2023, 3, 1, Decimal::ZERO, dec!(75));
    dividend.quantity = Decimal::ZERO;
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(100), dec!(10)),
        dividend,
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    assert_eq!(report.pools["ACME"].total_cost, dec!(1000));
    let record = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::Dividend)
        .expect("dividend record");
    assert_eq!(record.chargeable_gain, dec!(75));
    assert_eq!(record.group, GainGroup::Dividends);
}

// CFD buys are skipped outright; CFD sells record their P&L in the
// unlisted-shares group without any share identification.
#[test]
fn cfd_events_bypass_share_matching() {
    let mut cfd_buy = event(EventKind::Buy, "US500", 2023, 1, 1, dec!(10), dec!(400));
    cfd_buy.asset_type = AssetType::Cfd;
    let mut cfd_sell = event(EventKind::Sell, "US500", 2023, 2, 1, dec!(10), dec!(350));
    cfd_sell.asset_type = AssetType::Cfd;

    let report =
        generate_report(vec![cfd_buy, cfd_sell], &no_rates(), &options(2022, 2023)).expect("report");

    let records: Vec<_> = report.taxable_events.iter().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].group, GainGroup::UnlistedShares);
    assert_eq!(records[0].chargeable_gain, dec!(350));

    // No pool accumulates for a CFD position.
    assert_eq!(
        report.pools.get("US500").map(|p| p.total_quantity),
        Some(Decimal::ZERO)
    );
}

// Apportioned commission summed over a disposal's records equals the
// original fee exactly.
#[test]
fn apportioned_fees_sum_to_the_original_commission() {
    let mut sell = event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(500), dec!(12));
    sell.fee_value = dec!(10);
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(250), dec!(10)),
        event(EventKind::Buy, "ACME", 2023, 6, 1, dec!(150), dec!(11)),
        sell,
        event(EventKind::Buy, "ACME", 2023, 6, 10, dec!(100), dec!(11.50)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let fee_total: Decimal = report
        .rows
        .iter()
        .filter_map(|row| match row {
            Row::Event(event_row) if event_row.event == EventKind::Sell => event_row.fee_value,
            _ => None,
        })
        .sum();
    assert_eq!(fee_total, dec!(10));

    // Three records: same-day 150, B&B 100, S104 250.
    let rules: Vec<_> = report
        .taxable_events
        .iter()
        .filter(|t| t.event_type == EventKind::Sell)
        .map(|t| t.rule)
        .collect();
    assert_eq!(
        rules,
        vec![
            Some(TaxRule::SameDay),
            Some(TaxRule::BedAndBreakfast),
            Some(TaxRule::Section104)
        ]
    );
}

// Only the first match record of an event carries Date, Asset and
// Platform; follow-ups leave them blank.
#[test]
fn follow_up_match_rows_leave_identity_columns_blank() {
    let mut sell = event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(500), dec!(12));
    sell.fee_value = dec!(20);
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(1000), dec!(10)),
        sell,
        event(EventKind::Buy, "ACME", 2023, 6, 2, dec!(300), dec!(11)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let sell_rows: Vec<_> = report
        .rows
        .iter()
        .filter_map(|row| match row {
            Row::Event(event_row) if event_row.event == EventKind::Sell => Some(event_row),
            _ => None,
        })
        .collect();
    assert_eq!(sell_rows.len(), 2);
    assert!(sell_rows[0].date.is_some());
    assert_eq!(sell_rows[0].asset.as_deref(), Some("ACME"));
    assert_eq!(sell_rows[0].platform.as_deref(), Some("Broker"));
    assert!(sell_rows[1].date.is_none());
    assert!(sell_rows[1].asset.is_none());
    assert!(sell_rows[1].platform.is_none());
}

// Every tax year in the stream is bracketed: header first, event rows
// grouped by asset section, then the year-summary marker.
#[test]
fn row_stream_brackets_each_tax_year() {
    let events = vec![
        event(EventKind::Buy, "ACME", 2022, 6, 1, dec!(100), dec!(10)),
        event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(50), dec!(12)),
    ];

    let report = generate_report(events, &no_rates(), &options(2021, 2023)).expect("report");

    let mut open_year: Option<String> = None;
    let mut seen_years = Vec::new();
    for row in &report.rows {
        match row {
            Row::YearHeader(header) => {
                assert!(open_year.is_none(), "year header inside an open year");
                open_year = Some(header.period.clone());
            }
            Row::AssetSection(_) | Row::Event(_) => {
                assert!(open_year.is_some(), "content outside a year segment");
            }
            Row::YearSummary(summary) => {
                let header = open_year.take().expect("summary without header");
                assert!(header.ends_with(&summary.year_end));
                seen_years.push(summary.year);
            }
        }
    }
    assert!(open_year.is_none());
    assert_eq!(seen_years, vec![2021, 2022, 2023]);
}

// Quantity conservation: everything bought is either pooled or was
// consumed by disposals.
#[test]
fn bought_quantity_is_conserved_across_pools_and_disposals() {
    let mut sell = event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(300), dec!(12));
    sell.fee_value = dec!(5);
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(400), dec!(10)),
        event(EventKind::Buy, "ACME", 2023, 2, 1, dec!(100), dec!(11)),
        sell,
        event(EventKind::Buy, "ACME", 2023, 6, 20, dec!(50), dec!(11)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let bought = dec!(400) + dec!(100) + dec!(50);
    let sold = dec!(300);
    assert_eq!(report.pools["ACME"].total_quantity, bought - sold);
}

// The sell-quantity column carries the matched quantity per record and the
// records cover the disposal exactly.
#[test]
fn sell_rows_cover_the_full_disposal_quantity() {
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(1000), dec!(10)),
        event(EventKind::Sell, "ACME", 2023, 6, 1, dec!(500), dec!(12)),
        event(EventKind::Buy, "ACME", 2023, 6, 2, dec!(300), dec!(11)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let total: Decimal = report
        .rows
        .iter()
        .filter_map(|row| match row {
            Row::Event(event_row) if event_row.event == EventKind::Sell => event_row.sell_quantity,
            _ => None,
        })
        .sum();
    assert_eq!(total, dec!(500));
}

// Buying and selling the same quantity at the same price on one day leaves
// the pool untouched: the same-day rule consumes the buy.
#[test]
fn same_day_round_trip_leaves_pool_unchanged() {
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 1, 1, dec!(100), dec!(10)),
        event(EventKind::Buy, "ACME", 2023, 5, 1, dec!(40), dec!(11)),
        event(EventKind::Sell, "ACME", 2023, 5, 1, dec!(40), dec!(11)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let pool = &report.pools["ACME"];
    assert_eq!(pool.total_quantity, dec!(100));
    assert_eq!(pool.total_cost, dec!(1000));

    let disposal = report
        .taxable_events
        .iter()
        .find(|t| t.event_type == EventKind::Sell)
        .expect("disposal");
    assert_eq!(disposal.chargeable_gain, Decimal::ZERO);
}

// An explicit year range that excludes nothing still buckets rows by the
// year boundaries; events on April 6 open the new year.
#[test]
fn april_sixth_starts_the_new_tax_year() {
    let events = vec![
        event(EventKind::Buy, "ACME", 2023, 4, 5, dec!(10), dec!(10)),
        event(EventKind::Buy, "ACME", 2023, 4, 6, dec!(10), dec!(10)),
    ];

    let report = generate_report(events, &no_rates(), &options(2022, 2023)).expect("report");

    let years: Vec<i32> = report
        .rows
        .iter()
        .filter_map(|row| match row {
            Row::YearSummary(summary) => Some(summary.year),
            _ => None,
        })
        .collect();
    assert_eq!(years, vec![2022, 2023]);
}
