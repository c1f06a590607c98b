//! End-to-end batch run over an in-memory transaction set

use chrono::NaiveDate;
use tracing::info;

use crate::data::Transaction;
use crate::error::RfmError;
use crate::feasibility::{evaluate_feasibility, FeasibilityVerdict, DEFAULT_WEAK_SIGNAL_THRESHOLD};
use crate::features::{build_rfm_features, ScoreCoverage};
use crate::model::{join_model_data, CustomerProfile};
use crate::outcome::build_outcomes;
use crate::priority::{select_priority_lists, PriorityLists};
use crate::segment::{segment_customers, top_categories, MonetaryThresholds, SegmentSource};
use crate::split::{default_cutoff, split_at_cutoff};
use crate::summary::{
    category_performance, retention_by_segment, retention_by_strategic_segment, segment_profiles,
    GroupOutcome, SegmentProfile,
};

/// Days of trailing data used as the outcome window when no cutoff is given
pub const DEFAULT_FUTURE_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutoffPolicy {
    Fixed(NaiveDate),
    /// Latest order date minus this many days
    TrailingWindow(i64),
}

/// Library-level settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub cutoff: CutoffPolicy,
    pub weak_signal_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cutoff: CutoffPolicy::TrailingWindow(DEFAULT_FUTURE_WINDOW_DAYS),
            weak_signal_threshold: DEFAULT_WEAK_SIGNAL_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn resolve_cutoff(&self, transactions: &[Transaction]) -> crate::Result<NaiveDate> {
        match self.cutoff {
            CutoffPolicy::Fixed(date) => Ok(date),
            CutoffPolicy::TrailingWindow(days) => default_cutoff(transactions, days).ok_or_else(|| {
                RfmError::InvalidCutoff(format!("cannot derive a cutoff {days} days before the data")).into()
            }),
        }
    }
}

/// Everything a run produces for reporting
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub cutoff: NaiveDate,
    pub historical_transactions: usize,
    pub future_transactions: usize,
    pub coverage: ScoreCoverage,
    pub thresholds: MonetaryThresholds,
    pub profiles: Vec<CustomerProfile>,
    pub verdict: FeasibilityVerdict,
    pub priority: PriorityLists,
    pub retention_by_segment: Vec<GroupOutcome>,
    pub retention_by_strategic_segment: Vec<GroupOutcome>,
    pub category_performance: Vec<GroupOutcome>,
    pub segment_profiles: Vec<SegmentProfile>,
}

impl PipelineOutput {
    pub fn churn_rate(&self) -> f64 {
        if self.profiles.is_empty() {
            return 0.0;
        }
        self.profiles.iter().filter(|p| p.is_churn).count() as f64 / self.profiles.len() as f64
    }
}

/// Run every stage over `transactions`
///
/// # Arguments
/// * `transactions` - Cleaned transactions
/// * `config` - Cutoff policy and feasibility threshold
/// * `source` - Segment strategy, resolved by the caller before the run
///
/// # Returns
/// * The full output, or an error if no customer can be scored
pub fn run_pipeline(
    transactions: &[Transaction],
    config: &PipelineConfig,
    source: &SegmentSource,
) -> crate::Result<PipelineOutput> {
    if transactions.is_empty() {
        return Err(RfmError::EmptyTransactions.into());
    }

    let cutoff = config.resolve_cutoff(transactions)?;
    let split = split_at_cutoff(transactions, cutoff);
    info!(
        %cutoff,
        historical = split.historical.len(),
        future = split.future.len(),
        "split transactions"
    );

    let features = build_rfm_features(&split.historical, cutoff)?;
    let thresholds = MonetaryThresholds::from_values(&features.monetary_values())?
        .ok_or(RfmError::NoHistoricalCustomers { cutoff })?;
    let outcomes = build_outcomes(&split.future, &features)?;

    let categories = top_categories(&split.historical)?;
    let segmentations = segment_customers(&features.records, &thresholds, source, &categories);
    let profiles = join_model_data(&features.records, &outcomes, &segmentations)?;
    info!(customers = profiles.len(), "built customer profiles");

    let verdict = evaluate_feasibility(&profiles, config.weak_signal_threshold);
    let priority = select_priority_lists(&profiles, &thresholds);

    Ok(PipelineOutput {
        cutoff,
        historical_transactions: split.historical.len(),
        future_transactions: split.future.len(),
        coverage: features.coverage,
        thresholds,
        retention_by_segment: retention_by_segment(&profiles)?,
        retention_by_strategic_segment: retention_by_strategic_segment(&profiles)?,
        category_performance: category_performance(&profiles)?,
        segment_profiles: segment_profiles(&profiles)?,
        profiles,
        verdict,
        priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_transactions_is_fatal() {
        let err = run_pipeline(&[], &PipelineConfig::default(), &SegmentSource::Computed).unwrap_err();
        assert_eq!(err.downcast_ref::<RfmError>(), Some(&RfmError::EmptyTransactions));
    }

    #[test]
    fn test_cutoff_before_all_data_is_fatal() {
        let transactions = vec![Transaction::new("A", date(2016, 5, 1), 10.0)];
        let config = PipelineConfig {
            cutoff: CutoffPolicy::Fixed(date(2010, 1, 1)),
            ..PipelineConfig::default()
        };

        let err = run_pipeline(&transactions, &config, &SegmentSource::Computed).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RfmError>(),
            Some(&RfmError::NoHistoricalCustomers { cutoff: date(2010, 1, 1) })
        );
    }

    #[test]
    fn test_cutoff_after_all_data_churns_everyone() {
        let transactions = vec![
            Transaction::new("A", date(2016, 5, 1), 10.0),
            Transaction::new("B", date(2016, 6, 1), 20.0),
        ];
        let config = PipelineConfig {
            cutoff: CutoffPolicy::Fixed(date(2020, 1, 1)),
            ..PipelineConfig::default()
        };

        let output = run_pipeline(&transactions, &config, &SegmentSource::Computed).unwrap();
        assert_eq!(output.profiles.len(), 2);
        assert_eq!(output.future_transactions, 0);
        assert_eq!(output.churn_rate(), 1.0);
        assert!(output.verdict.weak_signal);
        assert_eq!(output.verdict.sample_size, 0);
    }

    #[test]
    fn test_trailing_window_cutoff() {
        let transactions = vec![
            Transaction::new("A", date(2016, 1, 1), 10.0),
            Transaction::new("A", date(2017, 1, 1), 10.0),
        ];
        let config = PipelineConfig {
            cutoff: CutoffPolicy::TrailingWindow(100),
            ..PipelineConfig::default()
        };
        assert_eq!(config.resolve_cutoff(&transactions).unwrap(), date(2016, 9, 23));
    }

    #[test]
    fn test_oversized_trailing_window_is_invalid_cutoff() {
        let transactions = vec![Transaction::new("A", date(2016, 5, 1), 10.0)];
        let config = PipelineConfig {
            cutoff: CutoffPolicy::TrailingWindow(i64::MAX / 1000),
            ..PipelineConfig::default()
        };

        let err = run_pipeline(&transactions, &config, &SegmentSource::Computed).unwrap_err();
        assert!(matches!(err.downcast_ref::<RfmError>(), Some(RfmError::InvalidCutoff(_))));
    }
}
