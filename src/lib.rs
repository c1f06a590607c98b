//! RfmForge: RFM feature engineering and descriptive customer segmentation
//!
//! This library splits transaction history at a cutoff date, builds
//! Recency/Frequency/Monetary features and outcomes per customer, checks
//! whether the features predict future spend, and derives segments and
//! priority lists for marketing use.

pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod feasibility;
pub mod features;
pub mod model;
pub mod outcome;
pub mod pipeline;
pub mod priority;
pub mod segment;
pub mod split;
pub mod summary;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_external_segments, load_transactions, ColumnMapping, ExternalSegments, Transaction};
pub use error::RfmError;
pub use export::write_outputs;
pub use feasibility::{evaluate_feasibility, AnalyticPath, FeasibilityVerdict};
pub use features::{build_rfm_features, quintile_scores, CustomerRfmRecord, RfmFeatureSet, ScoreCoverage};
pub use model::{join_model_data, CustomerProfile};
pub use outcome::{build_outcomes, OutcomeRecord};
pub use pipeline::{run_pipeline, CutoffPolicy, PipelineConfig, PipelineOutput};
pub use priority::{select_priority_lists, PriorityLists};
pub use segment::{EngagementTier, MonetaryThresholds, RfmSegment, SegmentSource, ValueTier};
pub use split::{split_at_cutoff, TemporalSplit};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
