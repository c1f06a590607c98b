//! Per-customer model data: features joined with outcomes and segment labels

use anyhow::ensure;
use polars::prelude::*;

use crate::features::CustomerRfmRecord;
use crate::outcome::OutcomeRecord;
use crate::segment::Segmentation;

/// One row of the comprehensive customer table
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub rfm: CustomerRfmRecord,
    pub future_spend: f64,
    pub future_orders: u32,
    pub is_churn: bool,
    pub segmentation: Segmentation,
}

impl CustomerProfile {
    pub fn customer_id(&self) -> &str {
        &self.rfm.customer_id
    }

    pub fn recency(&self) -> i64 {
        self.rfm.recency
    }

    pub fn frequency(&self) -> u32 {
        self.rfm.frequency
    }

    pub fn monetary(&self) -> f64 {
        self.rfm.monetary
    }
}

/// Left-join features with outcomes and segment labels
///
/// All three inputs must be aligned by position (one entry per historical
/// customer, same order), which is how the builders produce them.
///
/// # Returns
/// * One profile per historical customer
pub fn join_model_data(
    records: &[CustomerRfmRecord],
    outcomes: &[OutcomeRecord],
    segmentations: &[Segmentation],
) -> crate::Result<Vec<CustomerProfile>> {
    ensure!(
        records.len() == outcomes.len() && records.len() == segmentations.len(),
        "misaligned inputs: {} features, {} outcomes, {} segmentations",
        records.len(),
        outcomes.len(),
        segmentations.len()
    );

    records
        .iter()
        .zip(outcomes)
        .zip(segmentations)
        .map(|((rfm, outcome), segmentation)| -> crate::Result<CustomerProfile> {
            ensure!(
                rfm.customer_id == outcome.customer_id,
                "outcome for '{}' joined to features of '{}'",
                outcome.customer_id,
                rfm.customer_id
            );
            Ok(CustomerProfile {
                rfm: rfm.clone(),
                future_spend: outcome.future_spend,
                future_orders: outcome.future_orders,
                is_churn: outcome.is_churn,
                segmentation: segmentation.clone(),
            })
        })
        .collect()
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Columnar form of the customer table, one row per profile
pub fn profiles_frame(profiles: &[CustomerProfile]) -> crate::Result<DataFrame> {
    let text = |f: fn(&CustomerProfile) -> String| -> Vec<String> { profiles.iter().map(f).collect() };

    let df = DataFrame::new(vec![
        Series::new("customer_id", text(|p| p.rfm.customer_id.clone())),
        Series::new("recency", profiles.iter().map(|p| p.rfm.recency).collect::<Vec<i64>>()),
        Series::new("frequency", profiles.iter().map(|p| p.rfm.frequency).collect::<Vec<u32>>()),
        Series::new("monetary", profiles.iter().map(|p| p.rfm.monetary).collect::<Vec<f64>>()),
        Series::new(
            "first_purchase",
            text(|p| p.rfm.first_purchase.format(DATE_FORMAT).to_string()),
        ),
        Series::new(
            "last_purchase",
            text(|p| p.rfm.last_purchase.format(DATE_FORMAT).to_string()),
        ),
        Series::new(
            "avg_order_value",
            profiles.iter().map(|p| p.rfm.avg_order_value).collect::<Vec<f64>>(),
        ),
        Series::new("tenure_days", profiles.iter().map(|p| p.rfm.tenure_days).collect::<Vec<i64>>()),
        Series::new("r_score", profiles.iter().map(|p| u32::from(p.rfm.r_score)).collect::<Vec<u32>>()),
        Series::new("f_score", profiles.iter().map(|p| u32::from(p.rfm.f_score)).collect::<Vec<u32>>()),
        Series::new("m_score", profiles.iter().map(|p| u32::from(p.rfm.m_score)).collect::<Vec<u32>>()),
        Series::new("future_spend", profiles.iter().map(|p| p.future_spend).collect::<Vec<f64>>()),
        Series::new("future_orders", profiles.iter().map(|p| p.future_orders).collect::<Vec<u32>>()),
        Series::new("is_churn", profiles.iter().map(|p| p.is_churn).collect::<Vec<bool>>()),
        Series::new("segment", text(|p| p.segmentation.segment.clone())),
        Series::new("value_tier", text(|p| p.segmentation.value_tier.to_string())),
        Series::new("engagement_tier", text(|p| p.segmentation.engagement_tier.to_string())),
        Series::new("strategic_segment", text(|p| p.segmentation.strategic_segment.clone())),
        Series::new("top_category", text(|p| p.segmentation.top_category.clone())),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Transaction;
    use crate::features::build_rfm_features;
    use crate::outcome::build_outcomes;
    use crate::segment::{segment_customers, MonetaryThresholds, SegmentSource};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_join_model_data_keeps_every_customer() {
        let cutoff = date(2017, 1, 1);
        let historical = vec![
            Transaction::new("A", date(2016, 5, 1), 10.0),
            Transaction::new("B", date(2016, 6, 1), 20.0),
            Transaction::new("C", date(2016, 7, 1), 30.0),
        ];
        let future = vec![Transaction::new("B", date(2017, 2, 1), 5.0)];

        let features = build_rfm_features(&historical, cutoff).unwrap();
        let outcomes = build_outcomes(&future, &features).unwrap();
        let thresholds = MonetaryThresholds::from_values(&features.monetary_values())
            .unwrap()
            .unwrap();
        let segmentations = segment_customers(
            &features.records,
            &thresholds,
            &SegmentSource::Computed,
            &HashMap::new(),
        );

        let profiles = join_model_data(&features.records, &outcomes, &segmentations).unwrap();
        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[1].customer_id(), "B");
        assert!(!profiles[1].is_churn);
        assert!(profiles[0].is_churn && profiles[2].is_churn);
    }

    #[test]
    fn test_join_model_data_rejects_misaligned_inputs() {
        let cutoff = date(2017, 1, 1);
        let historical = vec![Transaction::new("A", date(2016, 5, 1), 10.0)];
        let features = build_rfm_features(&historical, cutoff).unwrap();

        let result = join_model_data(&features.records, &[], &[]);
        assert!(result.is_err());
    }
}
