//! Future-window outcomes: spend and churn per historical customer

use anyhow::anyhow;
use polars::prelude::*;
use tracing::debug;

use crate::data::{transactions_frame, Transaction};
use crate::features::RfmFeatureSet;

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub customer_id: String,
    /// Sum of future-window sales, 0 when the customer did not return
    pub future_spend: f64,
    pub future_orders: u32,
    /// True iff the customer has no future-window transactions
    pub is_churn: bool,
}

/// Build one outcome per historical customer, in feature order
///
/// Future totals are left-joined onto the historical customer ids, so
/// customers that only appear in the future window are dropped and absent
/// customers get zero spend.
pub fn build_outcomes(future: &[Transaction], features: &RfmFeatureSet) -> crate::Result<Vec<OutcomeRecord>> {
    let future_totals = transactions_frame(future)?
        .lazy()
        .group_by([col("customer_id")])
        .agg([
            col("sales").sum().alias("future_spend"),
            col("sales").count().cast(DataType::UInt32).alias("future_orders"),
        ])
        .collect()?;

    let customer_ids: Vec<&str> = features.records.iter().map(|r| r.customer_id.as_str()).collect();
    let outcome_df = df!("customer_id" => customer_ids)?
        .lazy()
        .join(
            future_totals.clone().lazy(),
            [col("customer_id")],
            [col("customer_id")],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            // Churn is absence from the future window, not a spend comparison
            col("future_orders").is_null().alias("is_churn"),
            col("future_spend").fill_null(lit(0.0)),
            col("future_orders").fill_null(lit(0u32).cast(DataType::UInt32)),
        ])
        .collect()?;

    let mut outcomes = records_from_frame(&outcome_df)?;
    outcomes.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));

    let returning = outcomes.iter().filter(|o| !o.is_churn).count();
    debug!(
        customers = outcomes.len(),
        churned = outcomes.len() - returning,
        new_customers = future_totals.height() - returning,
        "built outcomes"
    );

    Ok(outcomes)
}

fn records_from_frame(df: &DataFrame) -> crate::Result<Vec<OutcomeRecord>> {
    let ids = df.column("customer_id")?.str()?;
    let spend = df.column("future_spend")?.f64()?;
    let orders = df.column("future_orders")?.u32()?;
    let churn = df.column("is_churn")?.bool()?;

    (0..df.height())
        .map(|i| -> crate::Result<OutcomeRecord> {
            let missing = || anyhow!("incomplete outcome row {i}");
            Ok(OutcomeRecord {
                customer_id: ids.get(i).ok_or_else(missing)?.to_string(),
                future_spend: spend.get(i).ok_or_else(missing)?,
                future_orders: orders.get(i).ok_or_else(missing)?,
                is_churn: churn.get(i).ok_or_else(missing)?,
            })
        })
        .collect()
}
