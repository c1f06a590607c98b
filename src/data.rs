//! Transaction loading and cleaning using Polars

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::RfmError;

/// Date format of the order date column (month/day/year)
pub const ORDER_DATE_FORMAT: &str = "%m/%d/%Y";

/// A single cleaned sale line
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: String,
    pub order_date: NaiveDate,
    /// Always strictly positive once loaded
    pub sales: f64,
    pub category: Option<String>,
}

impl Transaction {
    pub fn new(customer_id: impl Into<String>, order_date: NaiveDate, sales: f64) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_date,
            sales,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Names of the input columns the loader reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub customer_id: String,
    pub order_date: String,
    pub sales: String,
    /// Optional; when absent every transaction is uncategorized
    pub category: Option<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            customer_id: "Customer ID".to_string(),
            order_date: "Order Date".to_string(),
            sales: "Sales".to_string(),
            category: Some("Category".to_string()),
        }
    }
}

/// Customer id to segment label, as supplied by an external segmentation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalSegments {
    labels: HashMap<String, String>,
}

impl ExternalSegments {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    pub fn get(&self, customer_id: &str) -> Option<&str> {
        self.labels.get(customer_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Load a transaction CSV and drop rows that fail validation
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `columns` - Column names to read
///
/// # Returns
/// * Valid transactions in file order, or `RfmError::EmptyTransactions`
pub fn load_transactions(file_path: &Path, columns: &ColumnMapping) -> crate::Result<Vec<Transaction>> {
    let df = read_csv(file_path)?;
    let source_name = file_path.display().to_string();

    let customer_ids = string_column(&df, &columns.customer_id, &source_name)?;
    let order_dates = string_column(&df, &columns.order_date, &source_name)?;
    let sales = string_column(&df, &columns.sales, &source_name)?;
    let categories = match &columns.category {
        Some(name) if df.get_column_names().contains(&name.as_str()) => {
            string_column(&df, name, &source_name)?
        }
        _ => vec![None; df.height()],
    };

    let mut transactions = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = parse_row(
            customer_ids[i].as_deref(),
            order_dates[i].as_deref(),
            sales[i].as_deref(),
            categories[i].as_deref(),
        );
        if let Some(transaction) = row {
            transactions.push(transaction);
        }
    }

    let dropped = df.height() - transactions.len();
    info!(
        rows = df.height(),
        kept = transactions.len(),
        dropped,
        "loaded transactions from {}",
        source_name
    );

    if transactions.is_empty() {
        return Err(RfmError::EmptyTransactions.into());
    }

    Ok(transactions)
}

/// Load an external segment table with `customer_id` and `segment` columns
pub fn load_external_segments(file_path: &Path) -> crate::Result<ExternalSegments> {
    let df = read_csv(file_path)?;
    let source_name = file_path.display().to_string();

    let ids = string_column(&df, "customer_id", &source_name)?;
    let segments = string_column(&df, "segment", &source_name)?;

    let labels: HashMap<String, String> = ids
        .into_iter()
        .zip(segments)
        .filter_map(|(id, segment)| {
            let id = id?.trim().to_string();
            let segment = segment?.trim().to_string();
            (!id.is_empty() && !segment.is_empty()).then_some((id, segment))
        })
        .collect();

    debug!(customers = labels.len(), "loaded external segments");
    Ok(ExternalSegments::new(labels))
}

/// Columnar view of transactions for Polars aggregation
///
/// Columns: `customer_id` (str), `order_day` (i32 days from CE), `sales`
/// (f64) and `category` (nullable str).
pub fn transactions_frame(transactions: &[Transaction]) -> crate::Result<DataFrame> {
    let df = df!(
        "customer_id" => transactions.iter().map(|t| t.customer_id.as_str()).collect::<Vec<&str>>(),
        "order_day" => transactions.iter().map(|t| t.order_date.num_days_from_ce()).collect::<Vec<i32>>(),
        "sales" => transactions.iter().map(|t| t.sales).collect::<Vec<f64>>(),
        "category" => transactions.iter().map(|t| t.category.as_deref()).collect::<Vec<Option<&str>>>(),
    )?;
    Ok(df)
}

/// Inverse of the `order_day` encoding used by [`transactions_frame`]
pub fn date_from_day(day: i32) -> crate::Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day)
        .ok_or_else(|| anyhow::anyhow!("order day {day} is out of range"))
}

/// Parse a month/day/year order date
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ORDER_DATE_FORMAT).ok()
}

/// Parse a sale amount, tolerating currency symbols and thousands separators
pub fn parse_sales(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_row(
    customer_id: Option<&str>,
    order_date: Option<&str>,
    sales: Option<&str>,
    category: Option<&str>,
) -> Option<Transaction> {
    let customer_id = customer_id.map(str::trim).filter(|id| !id.is_empty())?;
    let order_date = parse_order_date(order_date?)?;
    let sales = parse_sales(sales?).filter(|s| *s > 0.0)?;
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Some(Transaction {
        customer_id: customer_id.to_string(),
        order_date,
        sales,
        category,
    })
}

fn read_csv(file_path: &Path) -> crate::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|opts| opts.with_encoding(CsvEncoding::LossyUtf8))
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))
        .with_context(|| format!("failed to open {}", file_path.display()))?
        .finish()
        .with_context(|| format!("failed to parse {}", file_path.display()))?;
    Ok(df)
}

/// Read a column as optional strings regardless of its inferred dtype
fn string_column(df: &DataFrame, name: &str, source_name: &str) -> crate::Result<Vec<Option<String>>> {
    let column = df.column(name).map_err(|_| RfmError::MissingColumn {
        column: name.to_string(),
        source_name: source_name.to_string(),
    })?;
    let as_str = column.cast(&DataType::String)?;
    let values = as_str
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}
