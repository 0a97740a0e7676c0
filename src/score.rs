//! Outlier capping and quintile scoring for RFM metrics

use crate::config::PipelineConfig;
use crate::data::CustomerMetrics;

/// Interior quintile cut points.
const QUINTILES: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// How bin order maps to score labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    /// Lowest bin scores 1, highest bin scores 5 (frequency, monetary).
    Ascending,
    /// Lowest bin scores 5, highest bin scores 1 (recency: the most
    /// recent buyers carry the smallest recency).
    Descending,
}

/// A customer with 1-5 metric scores and the composite RF / RFM codes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCustomer {
    pub customer_id: i64,
    pub recency: i64,
    pub frequency: u32,
    /// Monetary value after upper-outlier capping.
    pub monetary: f64,
    pub recency_score: u8,
    pub frequency_score: u8,
    pub monetary_score: u8,
    /// Recency and frequency scores as a two-digit code, e.g. "51".
    pub rf_code: String,
    /// All three scores as a three-digit code, e.g. "514".
    pub rfm_code: String,
}

/// Result of the scoring stage.
#[derive(Debug)]
pub struct ScoringOutcome {
    pub customers: Vec<ScoredCustomer>,
    /// How many monetary values were clamped to the upper outlier limit.
    pub capped_outliers: usize,
}

/// Lower and upper outlier limits for a metric column.
///
/// The limits extend `cap_multiplier` times the inter-percentile range
/// beyond the configured percentiles — the usual IQR rule, but anchored
/// at the 1st/99th percentiles because only a handful of extreme values
/// sit away from the rest of this distribution.
pub fn outlier_limits(values: &[f64], config: &PipelineConfig) -> crate::Result<(f64, f64)> {
    config.validate()?;
    if values.is_empty() {
        anyhow::bail!("cannot derive outlier limits from an empty column");
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q_low = quantile_sorted(&sorted, config.cap_lower_quantile);
    let q_high = quantile_sorted(&sorted, config.cap_upper_quantile);
    let range = q_high - q_low;
    Ok((
        q_low - config.cap_multiplier * range,
        q_high + config.cap_multiplier * range,
    ))
}

/// Clamp values above the upper outlier limit to it, returning how many
/// were capped.
///
/// The lower limit is computed but never enforced: the monetary column
/// is already filtered to strictly positive values upstream, so the low
/// end needs no clamp.
pub fn cap_upper_outliers(values: &mut [f64], config: &PipelineConfig) -> crate::Result<usize> {
    let (_low_limit, up_limit) = outlier_limits(values, config)?;
    let mut capped = 0;
    for value in values.iter_mut() {
        if *value > up_limit {
            *value = up_limit;
            capped += 1;
        }
    }
    Ok(capped)
}

/// Linearly interpolated quantile of an ascending-sorted slice.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let lower = sorted[lo];
    let upper = sorted[hi];
    lower + (upper - lower) * (pos - lo as f64)
}

/// Ascending 1-based ranks, ties resolved by original position.
pub(crate) fn stable_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    // sort_by is stable, so equal values keep their input order
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    for (position, &index) in order.iter().enumerate() {
        ranks[index] = (position + 1) as f64;
    }
    ranks
}

/// Six bin edges (min, 20/40/60/80th percentiles, max) over `values`.
fn quintile_edges(values: &[f64]) -> [f64; 6] {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut edges = [0.0; 6];
    edges[0] = sorted[0];
    for (i, &q) in QUINTILES.iter().enumerate() {
        edges[i + 1] = quantile_sorted(&sorted, q);
    }
    edges[5] = sorted[sorted.len() - 1];
    edges
}

/// Right-closed interval lookup; the first bin also includes its left edge.
fn bin_of(value: f64, edges: &[f64; 6]) -> usize {
    for bin in 0..4 {
        if value <= edges[bin + 1] {
            return bin;
        }
    }
    4
}

/// Quintile invariant: every bin holds between floor(n/5) and ceil(n/5)
/// values.
fn is_balanced(bins: &[usize]) -> bool {
    let n = bins.len();
    let mut counts = [0usize; 5];
    for &bin in bins {
        counts[bin] += 1;
    }
    let floor = n / 5;
    let ceil = (n + 4) / 5;
    counts.iter().all(|&count| (floor..=ceil).contains(&count))
}

/// Assign each value to one of five equal-population bins (0..=4).
///
/// Quantile edges over the raw values can collapse, or leave a run of
/// tied values straddling an edge; whenever the resulting split is
/// uneven the values are re-binned through their stable rank transform,
/// whose distinct ranks always divide evenly.
fn quintile_bins(values: &[f64]) -> Vec<usize> {
    if values.is_empty() {
        return Vec::new();
    }
    let edges = quintile_edges(values);
    let bins: Vec<usize> = values.iter().map(|&v| bin_of(v, &edges)).collect();
    if is_balanced(&bins) {
        return bins;
    }
    let ranks = stable_ranks(values);
    let rank_edges = quintile_edges(&ranks);
    ranks.iter().map(|&r| bin_of(r, &rank_edges)).collect()
}

/// Score a metric column into 1-5 quintile labels.
pub fn quintile_scores(values: &[f64], direction: ScoreDirection) -> Vec<u8> {
    quintile_bins(values)
        .into_iter()
        .map(|bin| match direction {
            ScoreDirection::Ascending => bin as u8 + 1,
            ScoreDirection::Descending => 5 - bin as u8,
        })
        .collect()
}

/// Score every customer: cap monetary outliers, then quintile-score the
/// three metrics and build the composite codes.
///
/// Recency scores descending. Frequency is rank-transformed before
/// binning: distinct invoice counts repeat heavily, and cuts on the raw
/// counts would leave empty or lopsided bins. Monetary scores ascending
/// on the capped values.
pub fn score_customers(
    metrics: &[CustomerMetrics],
    config: &PipelineConfig,
) -> crate::Result<ScoringOutcome> {
    if metrics.is_empty() {
        anyhow::bail!("no customers to score");
    }

    let recency: Vec<f64> = metrics.iter().map(|m| m.recency as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| f64::from(m.frequency)).collect();
    let mut monetary: Vec<f64> = metrics.iter().map(|m| m.monetary).collect();

    let capped_outliers = cap_upper_outliers(&mut monetary, config)?;

    let recency_scores = quintile_scores(&recency, ScoreDirection::Descending);
    let frequency_scores = quintile_scores(&stable_ranks(&frequency), ScoreDirection::Ascending);
    let monetary_scores = quintile_scores(&monetary, ScoreDirection::Ascending);

    let customers = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let (r, f, mo) = (recency_scores[i], frequency_scores[i], monetary_scores[i]);
            ScoredCustomer {
                customer_id: m.customer_id,
                recency: m.recency,
                frequency: m.frequency,
                monetary: monetary[i],
                recency_score: r,
                frequency_score: f,
                monetary_score: mo,
                rf_code: format!("{r}{f}"),
                rfm_code: format!("{r}{f}{mo}"),
            }
        })
        .collect();

    Ok(ScoringOutcome {
        customers,
        capped_outliers,
    })
}
