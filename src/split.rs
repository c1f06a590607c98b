//! Temporal split of transactions into a feature window and an outcome window

use chrono::{NaiveDate, TimeDelta};

use crate::data::Transaction;

/// Transactions partitioned around a cutoff date
#[derive(Debug, Clone, Default)]
pub struct TemporalSplit {
    /// Orders strictly before the cutoff
    pub historical: Vec<Transaction>,
    /// Orders on or after the cutoff
    pub future: Vec<Transaction>,
}

/// Partition transactions so that `order_date < cutoff` is historical and
/// everything else, including orders placed on the cutoff day, is future
pub fn split_at_cutoff(transactions: &[Transaction], cutoff: NaiveDate) -> TemporalSplit {
    let (historical, future) = transactions
        .iter()
        .cloned()
        .partition(|t| t.order_date < cutoff);
    TemporalSplit { historical, future }
}

/// Cutoff that leaves the last `future_window_days` of data as the outcome window
///
/// `None` for empty input or a window that does not fit in the date range.
pub fn default_cutoff(transactions: &[Transaction], future_window_days: i64) -> Option<NaiveDate> {
    let latest = transactions.iter().map(|t| t.order_date).max()?;
    latest.checked_sub_signed(TimeDelta::try_days(future_window_days)?)
}
