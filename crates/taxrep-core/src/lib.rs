pub mod classify;
pub mod config;
pub mod error;
pub mod matcher;
pub mod models;
pub mod report;
pub mod rows;
pub mod summary;
pub mod validation;

pub use classify::{GainGroup, classify};
pub use config::{AssetMapping, LedgerConfig, PlatformMapping, tag_event_type};
pub use error::TaxError;
pub use matcher::generate_matches;
pub use models::*;
pub use report::{ReportOptions, TaxReport, generate_report, generate_report_at};
pub use rows::{AssetSectionRow, EventRow, Row, YearHeaderRow, YearSummaryRow};
pub use summary::{GroupTotals, YearSummary, summarize};
pub use validation::{ValidationIssue, ValidationResult, validate};
