//! RfmForge: RFM segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, the feature
//! and segmentation pipeline, reporting, and export.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use rfmforge::{
    load_external_segments, load_transactions, run_pipeline, write_outputs, Args, PipelineOutput,
    ScoreCoverage, SegmentSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.pipeline_config()?;
    let columns = args.column_mapping();

    // Segment strategy is fixed before any computation starts
    let external = match &args.segments {
        Some(path) if path.exists() => Some(load_external_segments(path)?),
        Some(path) => {
            tracing::warn!("segment table {} not found; using computed segments", path.display());
            None
        }
        None => None,
    };
    let source = SegmentSource::resolve(external);

    println!("=== RFM Segmentation Pipeline ===\n");
    let start_time = Instant::now();

    // Step 1: Load transactions
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input.display());
    }
    let transactions = load_transactions(&args.input, &columns)?;
    println!("✓ Data loaded: {} transactions", transactions.len());

    // Step 2: Features, outcomes, feasibility, segments
    let pipeline_start = Instant::now();
    let output = run_pipeline(&transactions, &config, &source)?;
    if args.verbose {
        println!(
            "  Pipeline time: {:.2}s",
            pipeline_start.elapsed().as_secs_f64()
        );
    }

    print_report(&output);

    // Step 3: Export tables
    let written = write_outputs(&output, &args.output_dir)?;

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("Outputs saved to: {}", args.output_dir.display());
    if args.verbose {
        for path in written {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RFMFORGE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(output: &PipelineOutput) {
    println!("\n=== Temporal Split ===");
    println!("Cutoff date: {}", output.cutoff);
    println!(
        "Historical transactions: {} | Future transactions: {}",
        output.historical_transactions, output.future_transactions
    );
    println!(
        "Customers: {} | Churn rate: {:.1}%",
        output.profiles.len(),
        output.churn_rate() * 100.0
    );
    if let ScoreCoverage::Degenerate { customers } = output.coverage {
        println!("! Insufficient data: only {} customers for quintile scoring", customers);
    }

    println!("\n=== Feasibility ===");
    for correlation in &output.verdict.correlations {
        match correlation.coefficient {
            Some(r) => println!("  {:12} r = {:+.3}", correlation.feature, r),
            None => println!("  {:12} r = n/a (insufficient data)", correlation.feature),
        }
    }
    println!(
        "Max |r| = {:.3} (threshold {}) over {} returning customers",
        output.verdict.max_abs_correlation, output.verdict.threshold, output.verdict.sample_size
    );
    if output.verdict.weak_signal {
        println!("Verdict: weak predictive signal, proceeding with descriptive analytics");
    } else {
        println!("Verdict: features carry signal; predictive modelling is an option");
    }

    println!("\n=== Retention by Segment ===");
    println!("  {:20} | {:>9} | {:>10} | {:>12}", "Segment", "Customers", "Churn rate", "Avg spend");
    for row in &output.retention_by_segment {
        println!(
            "  {:20} | {:9} | {:9.1}% | {:12.2}",
            row.group,
            row.customers,
            row.churn_rate * 100.0,
            row.avg_future_spend
        );
    }

    println!("\n=== Category Performance ===");
    for row in &output.category_performance {
        println!(
            "  {:20} | {:9} customers | churn {:5.1}% | avg spend {:10.2}",
            row.group,
            row.customers,
            row.churn_rate * 100.0,
            row.avg_future_spend
        );
    }

    println!("\n=== Priority Lists ===");
    println!(
        "High-value threshold (p75 monetary): {:.2}",
        output.thresholds.p75
    );
    println!("High risk, high value: {}", output.priority.high_risk_high_value.len());
    println!("VIP recent:            {}", output.priority.vip_recent.len());
    println!("Loyal inactive:        {}", output.priority.loyal_inactive.len());
}
