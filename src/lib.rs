//! SegmentForge: RFM customer segmentation for retail transaction data
//!
//! This library derives per-customer Recency/Frequency/Monetary metrics
//! from raw invoice lines, scores each metric on a 1-5 quintile scale,
//! assigns every customer to a named marketing segment, and exports
//! fixed campaign cohorts.

pub mod cli;
pub mod config;
pub mod data;
pub mod export;
pub mod score;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use config::PipelineConfig;
pub use data::{
    aggregate_customers, clean_transactions, load_transactions, CleanStats, CustomerMetrics,
};
pub use export::{export_cohort, export_cohorts};
pub use score::{
    cap_upper_outliers, outlier_limits, quintile_scores, score_customers, ScoreDirection,
    ScoredCustomer, ScoringOutcome,
};
pub use segment::{
    assign_segment, filter_cohort, segment_customers, summarize_segments, Cohort, Segment,
    SegmentSummary, SegmentedCustomer, ABOUT_TO_LEAVE, EXPORT_COHORTS, HIGH_PAID, NEW_HIGH_PAID,
    POTENTIAL_HIGH_PAID,
};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
