//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::config::{PipelineConfig, DEFAULT_REFERENCE_DATE};

/// Customer segmentation CLI using RFM scoring on retail transaction data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Directory the cohort CSV files are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: String,

    /// Analysis date (YYYY-MM-DD); must be later than the last invoice date
    #[arg(short, long, default_value = DEFAULT_REFERENCE_DATE)]
    pub reference_date: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the pipeline configuration, failing fast on a malformed date.
    pub fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        PipelineConfig::from_date_str(&self.reference_date)
    }
}
