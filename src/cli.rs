//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::data::ColumnMapping;
use crate::error::RfmError;
use crate::feasibility::DEFAULT_WEAK_SIGNAL_THRESHOLD;
use crate::pipeline::{CutoffPolicy, PipelineConfig, DEFAULT_FUTURE_WINDOW_DAYS};

/// RFM feature engineering and descriptive customer segmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the transaction CSV file
    #[arg(short, long, env = "RFMFORGE_INPUT", default_value = "data.csv")]
    pub input: PathBuf,

    /// Cutoff date (YYYY-MM-DD) separating history from the outcome window
    #[arg(short, long, env = "RFMFORGE_CUTOFF")]
    pub cutoff: Option<String>,

    /// Outcome window length in days, used when no cutoff is given
    #[arg(long, env = "RFMFORGE_FUTURE_WINDOW_DAYS", default_value_t = DEFAULT_FUTURE_WINDOW_DAYS)]
    pub future_window_days: i64,

    /// Optional CSV with customer_id,segment columns overriding computed segments
    #[arg(short, long, env = "RFMFORGE_SEGMENTS")]
    pub segments: Option<PathBuf>,

    /// Directory for exported tables
    #[arg(short, long, env = "RFMFORGE_OUTPUT_DIR", default_value = "rfm_output")]
    pub output_dir: PathBuf,

    /// Maximum absolute correlation below which the signal is considered weak
    #[arg(long, env = "RFMFORGE_THRESHOLD", default_value_t = DEFAULT_WEAK_SIGNAL_THRESHOLD)]
    pub threshold: f64,

    /// Customer identifier column
    #[arg(long, default_value = "Customer ID")]
    pub customer_column: String,

    /// Order date column (month/day/year)
    #[arg(long, default_value = "Order Date")]
    pub date_column: String,

    /// Sale amount column
    #[arg(long, default_value = "Sales")]
    pub sales_column: String,

    /// Product category column
    #[arg(long, default_value = "Category")]
    pub category_column: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the cutoff flag; `None` means derive it from the data
    pub fn parse_cutoff(&self) -> crate::Result<Option<NaiveDate>> {
        match self.cutoff.as_deref() {
            Some(raw) => {
                let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| RfmError::InvalidCutoff(format!("'{raw}' is not YYYY-MM-DD")))?;
                Ok(Some(date))
            }
            None => Ok(None),
        }
    }

    /// Validate flags into a library-level configuration
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        if !(self.threshold.is_finite() && (0.0..=1.0).contains(&self.threshold)) {
            anyhow::bail!("Threshold must be between 0 and 1, got {}", self.threshold);
        }
        if self.future_window_days <= 0 {
            anyhow::bail!("Future window must be a positive number of days");
        }

        let cutoff = match self.parse_cutoff()? {
            Some(date) => CutoffPolicy::Fixed(date),
            None => CutoffPolicy::TrailingWindow(self.future_window_days),
        };

        Ok(PipelineConfig {
            cutoff,
            weak_signal_threshold: self.threshold,
        })
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            customer_id: self.customer_column.clone(),
            order_date: self.date_column.clone(),
            sales: self.sales_column.clone(),
            category: Some(self.category_column.clone()).filter(|c| !c.is_empty()),
        }
    }
}
