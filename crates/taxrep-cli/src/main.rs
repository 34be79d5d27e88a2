use anyhow::{Context, Result};
use clap::Parser;
use schemars::schema_for;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use taxrep_core::{
    Event, ReportOptions, TaxError, generate_report, summarize, validate,
};
use taxrep_rates::{HmrcRates, LedgerRates, PricePoint, RateOracle};

mod commands;
use commands::{Commands, OutputFormat};

#[derive(Parser)]
#[command(author, version, about = "UK capital gains tax report generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// Exit codes: 1 for configuration or rate failures, 2 for a pool
/// invariant violation.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<TaxError>() {
        Some(TaxError::PoolUnderflow { .. }) => 2,
        _ => 1,
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Report {
            file,
            start_year,
            end_year,
            hmrc_rates,
            prices,
            format,
        } => {
            let events = load_events(file)?;

            let result = validate(&events);
            for warning in &result.warnings {
                log::warn!("{warning}");
            }
            if !result.is_valid() {
                for error in &result.errors {
                    eprintln!("invalid input: {error}");
                }
                return Err(TaxError::InvalidConfig(format!(
                    "{} invalid event(s) in {}",
                    result.errors.len(),
                    file.display()
                ))
                .into());
            }

            let oracle = build_oracle(hmrc_rates.as_deref(), prices.as_deref())?;
            let options = ReportOptions {
                start_year: *start_year,
                end_year: *end_year,
            };

            let report = generate_report(events, oracle.as_ref(), &options)?;
            let summaries = summarize(&report.taxable_events);

            match format {
                OutputFormat::Plain => {
                    print!("{}", taxrep_formatter_plain::format_report(&report, &summaries));
                }
                OutputFormat::Json => {
                    let output = json!({
                        "report": report,
                        "summaries": summaries,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
            Ok(())
        }
        Commands::Schema => {
            let schema = schema_for!(Vec<Event>);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn load_events(path: &Path) -> Result<Vec<Event>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading events from {}", path.display()))?;
    let events: Vec<Event> = serde_json::from_str(&content)
        .with_context(|| format!("parsing events from {}", path.display()))?;
    Ok(events)
}

fn build_oracle(
    hmrc_rates: Option<&Path>,
    prices: Option<&Path>,
) -> Result<Box<dyn RateOracle>> {
    if let Some(root) = hmrc_rates {
        return Ok(Box::new(HmrcRates::new(PathBuf::from(root))));
    }
    if let Some(path) = prices {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading prices from {}", path.display()))?;
        let points: Vec<PricePoint> = serde_json::from_str(&content)
            .with_context(|| format!("parsing prices from {}", path.display()))?;
        return Ok(Box::new(LedgerRates::from_prices(points)));
    }
    // GBP/GBX-only ledgers need no backing source at all.
    Ok(Box::new(LedgerRates::new()))
}
