//! Rule-based customer segmentation
//!
//! Two independent labelings are derived from the RFM features: a score-based
//! RFM segment (or an externally supplied one) and a strategic segment built
//! from a monetary value tier and a recency/frequency engagement tier.

use std::collections::HashMap;
use std::fmt;

use polars::prelude::*;
use tracing::{info, warn};

use crate::data::{transactions_frame, ExternalSegments, Transaction};
use crate::features::{percentile, CustomerRfmRecord};

/// Label for customers absent from an external segment table
pub const UNASSIGNED_SEGMENT: &str = "Unassigned";

/// Label for customers without any categorized purchase
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Recency (days) within which a customer counts as recently active
pub const RECENT_DAYS: i64 = 90;
/// Recency (days) beyond which a customer is inactive
pub const INACTIVE_DAYS: i64 = 180;
/// Order count for the highly engaged and loyal thresholds
pub const HIGH_FREQUENCY: u32 = 8;
pub const MODERATE_FREQUENCY: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RfmSegment {
    Champion,
    LoyalCustomer,
    PotentialLoyalist,
    NeedsAttention,
    AtRisk,
}

impl RfmSegment {
    /// Score rules, first match wins
    pub fn from_scores(r: u8, f: u8, m: u8) -> Self {
        if r >= 4 && f >= 4 && m >= 4 {
            RfmSegment::Champion
        } else if r >= 4 && f >= 3 && m >= 3 {
            RfmSegment::LoyalCustomer
        } else if r >= 4 && f >= 3 && m <= 2 {
            RfmSegment::PotentialLoyalist
        } else if r >= 3 && f <= 2 && m <= 2 {
            RfmSegment::NeedsAttention
        } else {
            RfmSegment::AtRisk
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RfmSegment::Champion => "Champion",
            RfmSegment::LoyalCustomer => "Loyal Customer",
            RfmSegment::PotentialLoyalist => "Potential Loyalist",
            RfmSegment::NeedsAttention => "Needs Attention",
            RfmSegment::AtRisk => "At Risk",
        }
    }
}

impl fmt::Display for RfmSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueTier {
    Low,
    Medium,
    High,
}

impl ValueTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::Low => "Low Value",
            ValueTier::Medium => "Medium Value",
            ValueTier::High => "High Value",
        }
    }
}

impl fmt::Display for ValueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngagementTier {
    Inactive,
    Occasional,
    ModeratelyEngaged,
    HighlyEngaged,
}

impl EngagementTier {
    /// Fixed evaluation order, first match wins
    ///
    /// The predicates overlap; the order is part of the classification.
    pub fn classify(recency: i64, frequency: u32) -> Self {
        if recency <= RECENT_DAYS && frequency >= HIGH_FREQUENCY {
            EngagementTier::HighlyEngaged
        } else if recency <= INACTIVE_DAYS && frequency >= MODERATE_FREQUENCY {
            EngagementTier::ModeratelyEngaged
        } else if recency > INACTIVE_DAYS {
            EngagementTier::Inactive
        } else {
            EngagementTier::Occasional
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementTier::Inactive => "Inactive",
            EngagementTier::Occasional => "Occasional",
            EngagementTier::ModeratelyEngaged => "Moderately Engaged",
            EngagementTier::HighlyEngaged => "Highly Engaged",
        }
    }
}

impl fmt::Display for EngagementTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monetary quartile cut points of the current run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonetaryThresholds {
    pub p25: f64,
    pub p75: f64,
}

impl MonetaryThresholds {
    /// Compute from the monetary values of all customers; `None` when empty
    pub fn from_values(monetary: &[f64]) -> crate::Result<Option<Self>> {
        let (Some(p25), Some(p75)) = (percentile(monetary, 0.25)?, percentile(monetary, 0.75)?) else {
            return Ok(None);
        };
        Ok(Some(Self { p25, p75 }))
    }

    pub fn value_tier(&self, monetary: f64) -> ValueTier {
        if monetary >= self.p75 {
            ValueTier::High
        } else if monetary >= self.p25 {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }

    pub fn is_high_value(&self, monetary: f64) -> bool {
        monetary >= self.p75
    }
}

/// Combined "<value tier> - <engagement tier>" label
pub fn strategic_segment(value: ValueTier, engagement: EngagementTier) -> String {
    format!("{} - {}", value, engagement)
}

/// Where RFM segment labels come from, decided once per run
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSource {
    /// An external table overrides the score rules for every customer
    External(ExternalSegments),
    /// Score rules from [`RfmSegment::from_scores`]
    Computed,
}

impl SegmentSource {
    pub fn resolve(external: Option<ExternalSegments>) -> Self {
        match external {
            Some(table) => {
                info!(customers = table.len(), "using external segment table");
                SegmentSource::External(table)
            }
            None => {
                info!("no external segment table; using computed RFM segments");
                SegmentSource::Computed
            }
        }
    }

    pub fn label_for(&self, record: &CustomerRfmRecord) -> String {
        match self {
            SegmentSource::External(table) => table
                .get(&record.customer_id)
                .unwrap_or(UNASSIGNED_SEGMENT)
                .to_string(),
            SegmentSource::Computed => {
                RfmSegment::from_scores(record.r_score, record.f_score, record.m_score)
                    .as_str()
                    .to_string()
            }
        }
    }
}

/// All segment labels attached to one customer
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub segment: String,
    pub value_tier: ValueTier,
    pub engagement_tier: EngagementTier,
    pub strategic_segment: String,
    pub top_category: String,
}

/// Label every customer; output is aligned with `records`
pub fn segment_customers(
    records: &[CustomerRfmRecord],
    thresholds: &MonetaryThresholds,
    source: &SegmentSource,
    top_categories: &HashMap<String, String>,
) -> Vec<Segmentation> {
    let segmentations: Vec<Segmentation> = records
        .iter()
        .map(|record| {
            let value_tier = thresholds.value_tier(record.monetary);
            let engagement_tier = EngagementTier::classify(record.recency, record.frequency);
            Segmentation {
                segment: source.label_for(record),
                value_tier,
                engagement_tier,
                strategic_segment: strategic_segment(value_tier, engagement_tier),
                top_category: top_categories
                    .get(&record.customer_id)
                    .cloned()
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            }
        })
        .collect();

    if let SegmentSource::External(_) = source {
        let unassigned = segmentations
            .iter()
            .filter(|s| s.segment == UNASSIGNED_SEGMENT)
            .count();
        if unassigned > 0 {
            warn!(unassigned, "customers missing from the external segment table");
        }
    }

    segmentations
}

/// Highest-spend category per customer
///
/// Ties in total spend resolve to the alphabetically first category.
/// Uncategorized transactions are ignored.
pub fn top_categories(transactions: &[Transaction]) -> crate::Result<HashMap<String, String>> {
    let top_df = transactions_frame(transactions)?
        .lazy()
        .filter(col("category").is_not_null())
        .group_by([col("customer_id"), col("category")])
        .agg([col("sales").sum().alias("category_spend")])
        .sort_by_exprs(
            [col("category_spend"), col("category")],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        // Row order inside each group follows the sort above
        .group_by([col("customer_id")])
        .agg([col("category").first()])
        .collect()?;

    let ids = top_df.column("customer_id")?.str()?;
    let categories = top_df.column("category")?.str()?;
    let top = ids
        .into_iter()
        .zip(categories)
        .filter_map(|(id, category)| Some((id?.to_string(), category?.to_string())))
        .collect();
    Ok(top)
}
