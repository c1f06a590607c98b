//! Flat-table exports of a pipeline run using Polars

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;
use tracing::info;

use crate::model::profiles_frame;
use crate::pipeline::PipelineOutput;
use crate::summary::{GroupOutcome, SegmentProfile};

pub fn group_outcomes_frame(rows: &[GroupOutcome], group_column: &str) -> crate::Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(group_column, rows.iter().map(|r| r.group.clone()).collect::<Vec<String>>()),
        Series::new("customers", rows.iter().map(|r| r.customers as u64).collect::<Vec<u64>>()),
        Series::new("churn_rate", rows.iter().map(|r| r.churn_rate).collect::<Vec<f64>>()),
        Series::new(
            "avg_future_spend",
            rows.iter().map(|r| r.avg_future_spend).collect::<Vec<f64>>(),
        ),
    ])?;
    Ok(df)
}

pub fn segment_profiles_frame(rows: &[SegmentProfile]) -> crate::Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new("segment", rows.iter().map(|r| r.segment.clone()).collect::<Vec<String>>()),
        Series::new("customers", rows.iter().map(|r| r.customers as u64).collect::<Vec<u64>>()),
        Series::new("avg_recency", rows.iter().map(|r| r.avg_recency).collect::<Vec<f64>>()),
        Series::new("avg_frequency", rows.iter().map(|r| r.avg_frequency).collect::<Vec<f64>>()),
        Series::new("avg_monetary", rows.iter().map(|r| r.avg_monetary).collect::<Vec<f64>>()),
        Series::new(
            "avg_order_value",
            rows.iter().map(|r| r.avg_order_value).collect::<Vec<f64>>(),
        ),
    ])?;
    Ok(df)
}

/// Write every output table and the feasibility verdict into `output_dir`
///
/// # Returns
/// * Paths of the files written, in write order
pub fn write_outputs(output: &PipelineOutput, output_dir: &Path) -> crate::Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let tables = vec![
        ("customer_profiles.csv", profiles_frame(&output.profiles)?),
        (
            "high_risk_high_value.csv",
            profiles_frame(&output.priority.high_risk_high_value)?,
        ),
        ("vip_recent.csv", profiles_frame(&output.priority.vip_recent)?),
        ("loyal_inactive.csv", profiles_frame(&output.priority.loyal_inactive)?),
        (
            "retention_by_segment.csv",
            group_outcomes_frame(&output.retention_by_segment, "segment")?,
        ),
        (
            "retention_by_strategic_segment.csv",
            group_outcomes_frame(&output.retention_by_strategic_segment, "strategic_segment")?,
        ),
        (
            "category_performance.csv",
            group_outcomes_frame(&output.category_performance, "top_category")?,
        ),
        ("segment_profiles.csv", segment_profiles_frame(&output.segment_profiles)?),
    ];

    let mut written = Vec::with_capacity(tables.len() + 1);
    for (name, mut df) in tables {
        let path = output_dir.join(name);
        write_csv(&mut df, &path)?;
        written.push(path);
    }

    let verdict_path = output_dir.join("feasibility.json");
    let json = serde_json::to_string_pretty(&output.verdict)?;
    fs::write(&verdict_path, json)
        .with_context(|| format!("failed to write {}", verdict_path.display()))?;
    written.push(verdict_path);

    info!(files = written.len(), "wrote outputs to {}", output_dir.display());
    Ok(written)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> crate::Result<()> {
    let mut file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
