//! SegmentForge: RFM customer segmentation CLI for retail transaction data
//!
//! This is the main entrypoint that orchestrates loading, cleaning,
//! aggregation, scoring, segmentation, and cohort export.

use anyhow::Result;
use clap::Parser;
use segmentforge::{
    aggregate_customers, clean_transactions, export_cohorts, load_transactions, score_customers,
    segment_customers, summarize_segments, Args,
};
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    if args.verbose {
        println!("SegmentForge - Customer Segmentation using RFM scoring");
        println!("======================================================\n");
    }

    // Reference date and capping parameters are checked before any data
    // is read
    let config = args.pipeline_config()?;
    let start_time = Instant::now();

    // Step 1: Load raw transactions
    if args.verbose {
        println!("Step 1: Loading transactions");
        println!("  Input file: {}", args.input);
    }
    let load_start = Instant::now();
    let raw = load_transactions(&args.input)?;
    println!("✓ Loaded {} transaction lines", raw.height());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_start.elapsed().as_secs_f64());
    }

    // Step 2: Clean
    if args.verbose {
        println!("\nStep 2: Cleaning transaction lines");
    }
    let (cleaned, stats) = clean_transactions(raw)?;
    println!("✓ Cleaned: {} lines kept", cleaned.height());
    if args.verbose {
        println!("  Dropped {} incomplete lines", stats.dropped_incomplete);
        println!(
            "  Retained {} cancellation lines as returns",
            stats.cancelled_retained
        );
        println!("  {} lines carry a negative total", stats.negative_totals);
    }

    // Step 3: Aggregate per customer
    if args.verbose {
        println!("\nStep 3: Aggregating per customer");
        println!("  Reference date: {}", config.reference_date);
    }
    let metrics = aggregate_customers(cleaned, &config)?;
    println!("✓ Aggregated {} customers", metrics.len());

    // Step 4: Score
    if args.verbose {
        println!("\nStep 4: Scoring recency, frequency, monetary");
    }
    let outcome = score_customers(&metrics, &config)?;
    println!("✓ Scored {} customers", outcome.customers.len());
    if args.verbose {
        println!("  Capped {} monetary outliers", outcome.capped_outliers);
    }

    // Step 5: Segment
    let segmented = segment_customers(&outcome.customers)?;

    println!("\n=== Segment Summary ===");
    println!(
        "{:<20} {:>9} {:>12} {:>14} {:>15}",
        "segment", "customers", "avg recency", "avg frequency", "total monetary"
    );
    for summary in summarize_segments(&segmented) {
        println!(
            "{:<20} {:>9} {:>12.1} {:>14.1} {:>15.2}",
            summary.segment,
            summary.customers,
            summary.avg_recency,
            summary.avg_frequency,
            summary.total_monetary
        );
    }

    // Step 6: Export campaign cohorts
    let exports = export_cohorts(&segmented, Path::new(&args.output_dir))?;
    println!("\n=== Cohort Exports ===");
    for (path, rows) in &exports {
        println!("✓ {} ({} customers)", path.display(), rows);
    }

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
