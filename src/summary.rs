//! Group-level summaries over the customer table using Polars

use anyhow::anyhow;
use polars::prelude::*;

use crate::model::{profiles_frame, CustomerProfile};

/// Churn and spend for one group of customers
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOutcome {
    pub group: String,
    pub customers: usize,
    pub churn_rate: f64,
    pub avg_future_spend: f64,
}

/// Mean RFM values for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentProfile {
    pub segment: String,
    pub customers: usize,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
    pub avg_order_value: f64,
}

/// Churn rate and average future spend per RFM segment
pub fn retention_by_segment(profiles: &[CustomerProfile]) -> crate::Result<Vec<GroupOutcome>> {
    group_outcomes(profiles, "segment")
}

pub fn retention_by_strategic_segment(profiles: &[CustomerProfile]) -> crate::Result<Vec<GroupOutcome>> {
    group_outcomes(profiles, "strategic_segment")
}

/// Average future spend and churn rate per top category
pub fn category_performance(profiles: &[CustomerProfile]) -> crate::Result<Vec<GroupOutcome>> {
    group_outcomes(profiles, "top_category")
}

pub fn segment_profiles(profiles: &[CustomerProfile]) -> crate::Result<Vec<SegmentProfile>> {
    let summary = grouped(
        profiles,
        "segment",
        vec![
            col("recency").cast(DataType::Float64).mean().alias("avg_recency"),
            col("frequency").cast(DataType::Float64).mean().alias("avg_frequency"),
            col("monetary").mean().alias("avg_monetary"),
            col("avg_order_value").mean().alias("avg_order_value"),
        ],
    )?;

    let segments = summary.column("segment")?.str()?;
    let customers = summary.column("customers")?.u32()?;
    let recency = summary.column("avg_recency")?.f64()?;
    let frequency = summary.column("avg_frequency")?.f64()?;
    let monetary = summary.column("avg_monetary")?.f64()?;
    let order_value = summary.column("avg_order_value")?.f64()?;

    (0..summary.height())
        .map(|i| -> crate::Result<SegmentProfile> {
            let missing = || anyhow!("incomplete segment profile row {i}");
            Ok(SegmentProfile {
                segment: segments.get(i).ok_or_else(missing)?.to_string(),
                customers: customers.get(i).ok_or_else(missing)? as usize,
                avg_recency: recency.get(i).ok_or_else(missing)?,
                avg_frequency: frequency.get(i).ok_or_else(missing)?,
                avg_monetary: monetary.get(i).ok_or_else(missing)?,
                avg_order_value: order_value.get(i).ok_or_else(missing)?,
            })
        })
        .collect()
}

fn group_outcomes(profiles: &[CustomerProfile], key: &str) -> crate::Result<Vec<GroupOutcome>> {
    let summary = grouped(
        profiles,
        key,
        vec![
            col("is_churn").cast(DataType::Float64).mean().alias("churn_rate"),
            col("future_spend").mean().alias("avg_future_spend"),
        ],
    )?;

    let groups = summary.column(key)?.str()?;
    let customers = summary.column("customers")?.u32()?;
    let churn_rate = summary.column("churn_rate")?.f64()?;
    let spend = summary.column("avg_future_spend")?.f64()?;

    (0..summary.height())
        .map(|i| -> crate::Result<GroupOutcome> {
            let missing = || anyhow!("incomplete {key} summary row {i}");
            Ok(GroupOutcome {
                group: groups.get(i).ok_or_else(missing)?.to_string(),
                customers: customers.get(i).ok_or_else(missing)? as usize,
                churn_rate: churn_rate.get(i).ok_or_else(missing)?,
                avg_future_spend: spend.get(i).ok_or_else(missing)?,
            })
        })
        .collect()
}

/// Group the customer table by `key` with a customer count, ordered by group label
fn grouped(profiles: &[CustomerProfile], key: &str, aggs: Vec<Expr>) -> crate::Result<DataFrame> {
    let mut exprs = vec![col("customer_id").count().cast(DataType::UInt32).alias("customers")];
    exprs.extend(aggs);

    let df = profiles_frame(profiles)?
        .lazy()
        .group_by([col(key)])
        .agg(exprs)
        .sort_by_exprs([col(key)], SortMultipleOptions::default())
        .collect()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::CustomerRfmRecord;
    use crate::segment::{EngagementTier, Segmentation, ValueTier};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn profile(id: &str, segment: &str, category: &str, monetary: f64, future_spend: f64) -> CustomerProfile {
        CustomerProfile {
            rfm: CustomerRfmRecord {
                customer_id: id.to_string(),
                recency: 30,
                frequency: 2,
                monetary,
                first_purchase: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
                last_purchase: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
                avg_order_value: monetary / 2.0,
                tenure_days: 400,
                r_score: 3,
                f_score: 3,
                m_score: 3,
            },
            future_spend,
            future_orders: u32::from(future_spend > 0.0),
            is_churn: future_spend == 0.0,
            segmentation: Segmentation {
                segment: segment.to_string(),
                value_tier: ValueTier::Medium,
                engagement_tier: EngagementTier::Occasional,
                strategic_segment: "Medium Value - Occasional".to_string(),
                top_category: category.to_string(),
            },
        }
    }

    #[test]
    fn test_retention_by_segment() {
        let profiles = vec![
            profile("A", "Champion", "Technology", 1000.0, 300.0),
            profile("B", "Champion", "Furniture", 800.0, 0.0),
            profile("C", "At Risk", "Technology", 100.0, 0.0),
        ];

        let summary = retention_by_segment(&profiles).unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].group, "At Risk");
        assert_abs_diff_eq!(summary[0].churn_rate, 1.0);
        assert_eq!(summary[1].group, "Champion");
        assert_eq!(summary[1].customers, 2);
        assert_abs_diff_eq!(summary[1].churn_rate, 0.5);
        assert_abs_diff_eq!(summary[1].avg_future_spend, 150.0);
    }

    #[test]
    fn test_category_performance() {
        let profiles = vec![
            profile("A", "Champion", "Technology", 1000.0, 300.0),
            profile("C", "At Risk", "Technology", 100.0, 100.0),
        ];

        let summary = category_performance(&profiles).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].group, "Technology");
        assert_abs_diff_eq!(summary[0].avg_future_spend, 200.0);
        assert_abs_diff_eq!(summary[0].churn_rate, 0.0);
    }

    #[test]
    fn test_segment_profiles() {
        let profiles = vec![
            profile("A", "Champion", "Technology", 1000.0, 300.0),
            profile("B", "Champion", "Furniture", 800.0, 0.0),
        ];

        let summary = segment_profiles(&profiles).unwrap();
        assert_eq!(summary.len(), 1);
        assert_abs_diff_eq!(summary[0].avg_monetary, 900.0);
        assert_abs_diff_eq!(summary[0].avg_order_value, 450.0);
        assert_abs_diff_eq!(summary[0].avg_recency, 30.0);
        assert_abs_diff_eq!(summary[0].avg_frequency, 2.0);
        assert_eq!(summary[0].customers, 2);
    }

    #[test]
    fn test_retention_groups_are_sorted_by_label() {
        let profiles = vec![
            profile("A", "Potential Loyalist", "Technology", 10.0, 5.0),
            profile("B", "Champion", "Furniture", 20.0, 0.0),
            profile("C", "At Risk", "Office Supplies", 30.0, 0.0),
            profile("D", "Champion", "Furniture", 40.0, 10.0),
        ];

        let labels: Vec<String> = retention_by_segment(&profiles)
            .unwrap()
            .into_iter()
            .map(|g| g.group)
            .collect();
        assert_eq!(labels, vec!["At Risk", "Champion", "Potential Loyalist"]);

        let total: usize = category_performance(&profiles).unwrap().iter().map(|g| g.customers).sum();
        assert_eq!(total, profiles.len());
    }

    #[test]
    fn test_empty_summaries() {
        assert!(retention_by_segment(&[]).unwrap().is_empty());
        assert!(retention_by_strategic_segment(&[]).unwrap().is_empty());
        assert!(category_performance(&[]).unwrap().is_empty());
        assert!(segment_profiles(&[]).unwrap().is_empty());
    }
}
