//! RFM feature computation and quintile scoring using Polars

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::data::{date_from_day, transactions_frame, Transaction};

/// Number of score buckets
pub const SCORE_BINS: usize = 5;

/// Historical features for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRfmRecord {
    pub customer_id: String,
    /// Days between the last historical order and the cutoff
    pub recency: i64,
    pub frequency: u32,
    pub monetary: f64,
    pub first_purchase: NaiveDate,
    pub last_purchase: NaiveDate,
    pub avg_order_value: f64,
    /// Days between the first historical order and the cutoff
    pub tenure_days: i64,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
}

/// Whether the quintile scores rest on enough customers to be meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCoverage {
    /// No customers at all
    Empty,
    /// Fewer customers than score buckets; scores are valid but uneven
    Degenerate { customers: usize },
    Full,
}

/// Output of the feature builder
#[derive(Debug, Clone)]
pub struct RfmFeatureSet {
    /// One record per customer, ordered by customer id
    pub records: Vec<CustomerRfmRecord>,
    pub cutoff: NaiveDate,
    pub coverage: ScoreCoverage,
}

impl RfmFeatureSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn monetary_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.monetary).collect()
    }
}

/// Aggregate historical transactions into per-customer RFM records
///
/// # Arguments
/// * `historical` - Transactions strictly before the cutoff
/// * `cutoff` - Reference date for recency and tenure
///
/// # Returns
/// * Feature set with scores; empty input yields an empty set
pub fn build_rfm_features(historical: &[Transaction], cutoff: NaiveDate) -> crate::Result<RfmFeatureSet> {
    let cutoff_day = cutoff.num_days_from_ce();

    let rfm_df = transactions_frame(historical)?
        .lazy()
        .group_by([col("customer_id")])
        .agg([
            // Last and first purchase as day numbers
            col("order_day").max().alias("last_day"),
            col("order_day").min().alias("first_day"),
            // Frequency: number of orders
            col("sales").count().cast(DataType::UInt32).alias("frequency"),
            // Monetary: total spending
            col("sales").sum().alias("monetary"),
        ])
        .with_columns([
            (lit(cutoff_day) - col("last_day"))
                .cast(DataType::Int64)
                .alias("recency"),
            (lit(cutoff_day) - col("first_day"))
                .cast(DataType::Int64)
                .alias("tenure_days"),
            (col("monetary") / col("frequency").cast(DataType::Float64)).alias("avg_order_value"),
        ])
        .collect()?;

    let mut records = records_from_frame(&rfm_df)?;
    records.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    let neg_recency: Vec<f64> = records.iter().map(|r| -(r.recency as f64)).collect();
    let frequency: Vec<f64> = records.iter().map(|r| f64::from(r.frequency)).collect();
    let monetary: Vec<f64> = records.iter().map(|r| r.monetary).collect();

    let r_scores = quintile_scores(&neg_recency);
    let f_scores = quintile_scores(&frequency);
    let m_scores = quintile_scores(&monetary);

    for (i, record) in records.iter_mut().enumerate() {
        record.r_score = r_scores[i];
        record.f_score = f_scores[i];
        record.m_score = m_scores[i];
    }

    let coverage = match records.len() {
        0 => ScoreCoverage::Empty,
        n if n < SCORE_BINS => ScoreCoverage::Degenerate { customers: n },
        _ => ScoreCoverage::Full,
    };
    if let ScoreCoverage::Degenerate { customers } = coverage {
        warn!(
            customers,
            "insufficient data for quintile scoring; scores are uneven"
        );
    }
    debug!(customers = records.len(), %cutoff, "built RFM features");

    Ok(RfmFeatureSet {
        records,
        cutoff,
        coverage,
    })
}

/// Convert the aggregated frame into unscored records
fn records_from_frame(df: &DataFrame) -> crate::Result<Vec<CustomerRfmRecord>> {
    let ids = df.column("customer_id")?.str()?;
    let recency = df.column("recency")?.i64()?;
    let frequency = df.column("frequency")?.u32()?;
    let monetary = df.column("monetary")?.f64()?;
    let first_day = df.column("first_day")?.i32()?;
    let last_day = df.column("last_day")?.i32()?;
    let avg_order_value = df.column("avg_order_value")?.f64()?;
    let tenure_days = df.column("tenure_days")?.i64()?;

    let missing = |column: &str, row: usize| anyhow!("null {column} in aggregated row {row}");

    (0..df.height())
        .map(|i| -> crate::Result<CustomerRfmRecord> {
            Ok(CustomerRfmRecord {
                customer_id: ids.get(i).ok_or_else(|| missing("customer_id", i))?.to_string(),
                recency: recency.get(i).ok_or_else(|| missing("recency", i))?,
                frequency: frequency.get(i).ok_or_else(|| missing("frequency", i))?,
                monetary: monetary.get(i).ok_or_else(|| missing("monetary", i))?,
                first_purchase: date_from_day(first_day.get(i).ok_or_else(|| missing("first_day", i))?)?,
                last_purchase: date_from_day(last_day.get(i).ok_or_else(|| missing("last_day", i))?)?,
                avg_order_value: avg_order_value
                    .get(i)
                    .ok_or_else(|| missing("avg_order_value", i))?,
                tenure_days: tenure_days.get(i).ok_or_else(|| missing("tenure_days", i))?,
                r_score: 0,
                f_score: 0,
                m_score: 0,
            })
        })
        .collect()
}

/// Rank-based quintile scores in 1..=5
///
/// Values are ranked ascending with ties kept in input order, then
/// `score = ceil(5 * rank / n)`. Works for any non-empty length, including
/// fewer than five values.
pub fn quintile_scores(values: &[f64]) -> Vec<u8> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut scores = vec![0u8; n];
    for (position, &index) in order.iter().enumerate() {
        let rank = position + 1;
        let bucket = (SCORE_BINS * rank).div_ceil(n);
        scores[index] = bucket.clamp(1, SCORE_BINS) as u8;
    }
    scores
}

/// Percentile `q` in [0, 1] with linear interpolation between closest ranks
///
/// Returns `None` for an empty input.
pub fn percentile(values: &[f64], q: f64) -> crate::Result<Option<f64>> {
    let series = Float64Chunked::from_slice("values", values);
    Ok(series.quantile(q, QuantileInterpolOptions::Linear)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_churned_frequent_buyer_features() {
        let cutoff = date(2017, 1, 1);
        let last = date(2016, 12, 2);
        let transactions: Vec<Transaction> = (0..10)
            .map(|i| Transaction::new("X", last - chrono::Duration::days(i * 10), 100.0))
            .collect();

        let features = build_rfm_features(&transactions, cutoff).unwrap();
        let x = &features.records[0];
        assert_eq!(x.recency, 30);
        assert_eq!(x.frequency, 10);
        assert_abs_diff_eq!(x.monetary, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(x.avg_order_value, 100.0, epsilon = 1e-9);
        assert_eq!(x.tenure_days, 120);
        assert_eq!(x.first_purchase, date(2016, 9, 3));
        assert_eq!(x.last_purchase, last);
    }

    #[test]
    fn test_feature_invariants() {
        let cutoff = date(2017, 1, 1);
        let transactions = vec![
            Transaction::new("B", date(2016, 3, 1), 5.0),
            Transaction::new("A", date(2016, 1, 1), 10.0),
            Transaction::new("A", date(2016, 6, 1), 15.0),
            Transaction::new("C", date(2016, 12, 31), 1.0),
        ];

        let features = build_rfm_features(&transactions, cutoff).unwrap();
        let ids: Vec<&str> = features.records.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        for record in &features.records {
            assert!(record.frequency >= 1);
            assert!(record.monetary > 0.0);
            assert!(record.tenure_days >= record.recency);
            for score in [record.r_score, record.f_score, record.m_score] {
                assert!((1..=5).contains(&score));
            }
        }
        let a = &features.records[0];
        assert_eq!(a.frequency, 2);
        assert_abs_diff_eq!(a.monetary, 25.0, epsilon = 1e-9);
        assert_eq!(a.recency, 214);
        assert_eq!(features.records[2].recency, 1);
        assert_eq!(features.coverage, ScoreCoverage::Degenerate { customers: 3 });
    }

    #[test]
    fn test_recent_customers_score_higher() {
        let cutoff = date(2017, 1, 1);
        let transactions: Vec<Transaction> = (0..10)
            .map(|i| Transaction::new(format!("C{i}"), date(2016, 1, 1 + i as u32), 10.0))
            .collect();

        let features = build_rfm_features(&transactions, cutoff).unwrap();
        assert_eq!(features.coverage, ScoreCoverage::Full);
        let oldest = features.records.iter().find(|r| r.customer_id == "C0").unwrap();
        let newest = features.records.iter().find(|r| r.customer_id == "C9").unwrap();
        assert_eq!(oldest.r_score, 1);
        assert_eq!(newest.r_score, 5);
    }

    #[test]
    fn test_empty_history() {
        let features = build_rfm_features(&[], date(2017, 1, 1)).unwrap();
        assert!(features.is_empty());
        assert_eq!(features.coverage, ScoreCoverage::Empty);
    }

    #[test]
    fn test_quintile_scores_equal_groups() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(quintile_scores(&values), vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_quintile_scores_ties_keep_input_order() {
        let values = vec![7.0; 5];
        assert_eq!(quintile_scores(&values), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_quintile_scores_small_sets() {
        assert_eq!(quintile_scores(&[42.0]), vec![5]);
        assert_eq!(quintile_scores(&[2.0, 1.0]), vec![5, 3]);
        assert!(quintile_scores(&[]).is_empty());
        let seven: Vec<f64> = (1..=7).map(f64::from).collect();
        assert_eq!(quintile_scores(&seven), vec![1, 2, 3, 3, 4, 5, 5]);
    }

    #[test]
    fn test_percentile() {
        let values = vec![100.0, 200.0, 300.0, 400.0, 500.0];
        assert_abs_diff_eq!(percentile(&values, 0.75).unwrap().unwrap(), 400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(percentile(&values, 0.25).unwrap().unwrap(), 200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(percentile(&[1.0, 2.0], 0.5).unwrap().unwrap(), 1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(percentile(&[9.0], 0.75).unwrap().unwrap(), 9.0, epsilon = 1e-9);
        assert_eq!(percentile(&[], 0.5).unwrap(), None);
    }
}
