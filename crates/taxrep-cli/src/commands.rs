use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a tax report from a normalized events file
    Report {
        /// JSON file with the normalized event list
        file: PathBuf,
        /// First tax year to report (default: year before the earliest event)
        #[arg(long)]
        start_year: Option<i32>,
        /// Last tax year to report (default: the current tax year)
        #[arg(long)]
        end_year: Option<i32>,
        /// Directory with HMRC monthly rate files (rate/<YYYY>/<MM>.json)
        #[arg(long)]
        hmrc_rates: Option<PathBuf>,
        /// JSON file with ledger price points, used when no HMRC directory
        /// is given
        #[arg(long)]
        prices: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },
    /// Print the JSON Schema of the event input
    Schema,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}
