//! Pipeline configuration: analysis reference date and outlier capping parameters

use anyhow::{bail, Context};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Default analysis date, two days after the newest invoice in the
/// 2009-2010 Online Retail export.
pub const DEFAULT_REFERENCE_DATE: &str = "2010-12-11";

/// Configuration shared by the aggregation and scoring stages.
///
/// The reference date anchors recency; the capping parameters define the
/// percentile range and multiplier used to derive the monetary outlier
/// limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Analysis date; must be strictly later than the last invoice date.
    pub reference_date: NaiveDate,
    /// Lower percentile of the outlier range (0.01 = 1st percentile).
    pub cap_lower_quantile: f64,
    /// Upper percentile of the outlier range (0.99 = 99th percentile).
    pub cap_upper_quantile: f64,
    /// Multiplier applied to the inter-percentile range.
    pub cap_multiplier: f64,
}

impl PipelineConfig {
    /// Configuration with the stock capping parameters (1%/99%, 1.5x).
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            cap_lower_quantile: 0.01,
            cap_upper_quantile: 0.99,
            cap_multiplier: 1.5,
        }
    }

    /// Parse a `YYYY-MM-DD` reference date into a configuration.
    ///
    /// Fails before any data is read, so a malformed date never makes it
    /// into the pipeline.
    pub fn from_date_str(date: &str) -> crate::Result<Self> {
        let reference_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid reference date '{date}', expected YYYY-MM-DD"))?;
        let config = Self::new(reference_date);
        config.validate()?;
        Ok(config)
    }

    /// Reject capping parameters that cannot define a percentile range.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cap_lower_quantile <= 0.0 || self.cap_lower_quantile >= 1.0 {
            bail!(
                "lower capping quantile {} must lie strictly between 0 and 1",
                self.cap_lower_quantile
            );
        }
        if self.cap_upper_quantile <= 0.0 || self.cap_upper_quantile >= 1.0 {
            bail!(
                "upper capping quantile {} must lie strictly between 0 and 1",
                self.cap_upper_quantile
            );
        }
        if self.cap_lower_quantile >= self.cap_upper_quantile {
            bail!(
                "lower capping quantile {} must be below the upper quantile {}",
                self.cap_lower_quantile,
                self.cap_upper_quantile
            );
        }
        if self.cap_multiplier <= 0.0 {
            bail!("capping multiplier {} must be positive", self.cap_multiplier);
        }
        Ok(())
    }

    /// Reference date at midnight.
    pub fn reference_datetime(&self) -> NaiveDateTime {
        self.reference_date.and_time(NaiveTime::MIN)
    }

    /// Reference date at midnight, in epoch seconds.
    pub fn reference_timestamp_secs(&self) -> i64 {
        self.reference_datetime().and_utc().timestamp()
    }
}
