//! Error taxonomy for conditions that abort a pipeline run

use chrono::NaiveDate;
use thiserror::Error;

/// Fatal pipeline errors
///
/// Data-quality problems in individual rows never reach this type: the loader
/// drops them. Degenerate quantiles and undefined correlations are reported
/// values, not errors.
#[derive(Debug, Error, PartialEq)]
pub enum RfmError {
    /// No valid transaction survived loading
    #[error("no valid transactions found after filtering")]
    EmptyTransactions,

    /// The historical window holds no transactions, so no customer can be scored
    #[error("no historical transactions before cutoff {cutoff}")]
    NoHistoricalCustomers { cutoff: NaiveDate },

    /// A required input column is absent
    #[error("missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    /// The cutoff could not be parsed or derived
    #[error("invalid cutoff date: {0}")]
    InvalidCutoff(String),
}
