//! Feasibility check: do historical RFM features predict future spend?

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::CustomerProfile;

/// Below this maximum absolute correlation the signal is considered weak
pub const DEFAULT_WEAK_SIGNAL_THRESHOLD: f64 = 0.1;

/// Features correlated against future spend, in column order
pub const FEATURE_NAMES: [&str; 4] = ["recency", "frequency", "monetary", "tenure_days"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalyticPath {
    /// Segment and describe customers
    Descriptive,
    /// Features carry enough signal to attempt predictive modelling
    Predictive,
}

impl fmt::Display for AnalyticPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticPath::Descriptive => f.write_str("descriptive"),
            AnalyticPath::Predictive => f.write_str("predictive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCorrelation {
    pub feature: String,
    /// `None` when undefined (too few rows or zero variance)
    pub coefficient: Option<f64>,
}

impl FeatureCorrelation {
    /// Absolute strength; undefined counts as no signal
    pub fn strength(&self) -> f64 {
        self.coefficient.map_or(0.0, f64::abs)
    }
}

/// Verdict record produced for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityVerdict {
    pub correlations: Vec<FeatureCorrelation>,
    pub max_abs_correlation: f64,
    pub threshold: f64,
    pub weak_signal: bool,
    pub recommended_path: AnalyticPath,
    /// Returning customers used for the correlations
    pub sample_size: usize,
    /// Features whose correlation could not be computed
    pub insufficient_data: Vec<String>,
}

impl FeasibilityVerdict {
    /// Decide from precomputed correlations
    pub fn from_correlations(
        correlations: Vec<FeatureCorrelation>,
        threshold: f64,
        sample_size: usize,
    ) -> Self {
        let max_abs_correlation = correlations
            .iter()
            .map(FeatureCorrelation::strength)
            .fold(0.0, f64::max);
        let weak_signal = max_abs_correlation < threshold;
        let insufficient_data = correlations
            .iter()
            .filter(|c| c.coefficient.is_none())
            .map(|c| c.feature.clone())
            .collect();

        Self {
            correlations,
            max_abs_correlation,
            threshold,
            weak_signal,
            recommended_path: if weak_signal {
                AnalyticPath::Descriptive
            } else {
                AnalyticPath::Predictive
            },
            sample_size,
            insufficient_data,
        }
    }
}

/// Correlate each historical feature with future spend over returning customers
///
/// Churned customers (future spend of zero) are left out so the zero mass does
/// not dominate. The verdict is advisory; segmentation runs either way.
pub fn evaluate_feasibility(profiles: &[CustomerProfile], threshold: f64) -> FeasibilityVerdict {
    let returning: Vec<&CustomerProfile> = profiles.iter().filter(|p| p.future_spend > 0.0).collect();

    let mut features = Array2::<f64>::zeros((returning.len(), FEATURE_NAMES.len()));
    for (mut row, profile) in features.axis_iter_mut(Axis(0)).zip(&returning) {
        row[0] = profile.rfm.recency as f64;
        row[1] = f64::from(profile.rfm.frequency);
        row[2] = profile.rfm.monetary;
        row[3] = profile.rfm.tenure_days as f64;
    }
    let target: Array1<f64> = returning.iter().map(|p| p.future_spend).collect();

    let correlations: Vec<FeatureCorrelation> = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| FeatureCorrelation {
            feature: name.to_string(),
            coefficient: pearson(features.column(i), target.view()),
        })
        .collect();

    let verdict = FeasibilityVerdict::from_correlations(correlations, threshold, returning.len());

    if !verdict.insufficient_data.is_empty() {
        warn!(
            features = ?verdict.insufficient_data,
            sample_size = verdict.sample_size,
            "insufficient data for correlation"
        );
    }
    if verdict.weak_signal {
        warn!(
            max_abs_correlation = verdict.max_abs_correlation,
            threshold,
            "weak predictive signal; recommending descriptive analytics"
        );
    } else {
        info!(
            max_abs_correlation = verdict.max_abs_correlation,
            threshold,
            "features correlate with future spend"
        );
    }

    verdict
}

/// Pearson correlation over complete cases
///
/// Pairs with a non-finite value on either side are dropped. Returns `None`
/// for fewer than two pairs or when either side has zero variance.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
    let complete = || {
        x.iter()
            .zip(y.iter())
            .filter(|(a, b)| a.is_finite() && b.is_finite())
    };

    let (n, sum_x, sum_y) = complete().fold((0usize, 0.0_f64, 0.0_f64), |(n, sx, sy), (a, b)| {
        (n + 1, sx + a, sy + b)
    });
    if n < 2 {
        return None;
    }
    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;

    let (covariance, var_x, var_y) = complete().fold((0.0_f64, 0.0_f64, 0.0_f64), |(c, vx, vy), (a, b)| {
        let dx = a - mean_x;
        let dy = b - mean_y;
        (c + dx * dy, vx + dx * dx, vy + dy * dy)
    });

    let denominator = (var_x * var_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    let r = covariance / denominator;
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}
