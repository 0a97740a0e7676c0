//! CSV loading, cleaning, and per-customer RFM aggregation using Polars

use anyhow::{bail, Context};
use polars::prelude::*;

use crate::config::PipelineConfig;

/// Columns the input export must carry.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
];

/// Raw RFM metrics for one customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: i64,
    /// Whole days between the last purchase and the reference date.
    pub recency: i64,
    /// Distinct invoices.
    pub frequency: u32,
    /// Sum of line totals; strictly positive after filtering.
    pub monetary: f64,
}

/// Row counts observed while cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanStats {
    pub input_rows: usize,
    /// Rows dropped for a missing customer id or description.
    pub dropped_incomplete: usize,
    /// Cancellation lines (invoice prefixed with C) kept as returns.
    pub cancelled_retained: usize,
    /// Lines whose computed total is negative.
    pub negative_totals: usize,
}

/// Load the raw transaction export.
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * The raw `DataFrame`, with `InvoiceDate` parsed as a datetime column
pub fn load_transactions(path: &str) -> crate::Result<DataFrame> {
    let df = CsvReader::from_path(path)
        .with_context(|| format!("failed to open input file {path}"))?
        .has_header(true)
        .with_try_parse_dates(true)
        .finish()
        .with_context(|| format!("failed to read {path}"))?;

    let columns = df.get_column_names();
    for required in REQUIRED_COLUMNS {
        if !columns.contains(&required) {
            bail!("input file {path} is missing required column {required}");
        }
    }
    Ok(df)
}

/// Drop incomplete rows and attach the line total.
///
/// Rows missing a customer id or description are removed. Cancelled
/// invoices and their negative line totals stay in: they are returns,
/// and they must keep reducing the customer's monetary value.
pub fn clean_transactions(df: DataFrame) -> crate::Result<(DataFrame, CleanStats)> {
    let input_rows = df.height();

    let cleaned = df
        .lazy()
        .filter(
            col("CustomerID")
                .is_not_null()
                .and(col("Description").is_not_null()),
        )
        .with_columns([
            col("InvoiceNo").cast(DataType::Utf8),
            col("CustomerID").cast(DataType::Int64),
            (col("Quantity").cast(DataType::Float64) * col("UnitPrice")).alias("TotalPrice"),
        ])
        .collect()?;

    let cancelled_retained = cleaned
        .column("InvoiceNo")?
        .utf8()?
        .into_iter()
        .flatten()
        .filter(|invoice| invoice.starts_with('C'))
        .count();
    let negative_totals = cleaned
        .column("TotalPrice")?
        .f64()?
        .into_iter()
        .flatten()
        .filter(|total| *total < 0.0)
        .count();

    let stats = CleanStats {
        input_rows,
        dropped_incomplete: input_rows - cleaned.height(),
        cancelled_retained,
        negative_totals,
    };
    Ok((cleaned, stats))
}

/// Reduce cleaned lines to one `CustomerMetrics` row per customer.
///
/// The reference date must be strictly later than the newest invoice in
/// the data, otherwise recency goes negative. Customers whose total
/// spend is not positive are net creditors (the company owes them) and
/// are dropped from the segmentation.
pub fn aggregate_customers(
    cleaned: DataFrame,
    config: &PipelineConfig,
) -> crate::Result<Vec<CustomerMetrics>> {
    if cleaned.height() == 0 {
        bail!("no transaction lines left after cleaning");
    }

    let (mul, div) = timestamp_to_secs_factors(cleaned.column("InvoiceDate")?.dtype())?;
    let reference_secs = config.reference_timestamp_secs();

    let newest = cleaned
        .column("InvoiceDate")?
        .cast(&DataType::Int64)?
        .i64()?
        .max()
        .ok_or_else(|| anyhow::anyhow!("InvoiceDate column holds no values"))?;
    if newest * mul / div >= reference_secs {
        bail!(
            "reference date {} does not postdate the latest invoice; pick a later analysis date",
            config.reference_date
        );
    }

    let grouped = cleaned
        .lazy()
        .group_by([col("CustomerID")])
        .agg([
            col("InvoiceDate")
                .max()
                .cast(DataType::Int64)
                .alias("LastPurchase"),
            col("InvoiceNo")
                .n_unique()
                .cast(DataType::UInt32)
                .alias("Frequency"),
            col("TotalPrice").sum().alias("Monetary"),
        ])
        .filter(col("Monetary").gt(lit(0.0)))
        .sort("CustomerID", Default::default())
        .collect()?;

    let ids = grouped.column("CustomerID")?.i64()?;
    let last_purchases = grouped.column("LastPurchase")?.i64()?;
    let frequencies = grouped.column("Frequency")?.u32()?;
    let monetary = grouped.column("Monetary")?.f64()?;

    let mut metrics = Vec::with_capacity(grouped.height());
    for row in 0..grouped.height() {
        let (Some(customer_id), Some(last), Some(frequency), Some(total)) = (
            ids.get(row),
            last_purchases.get(row),
            frequencies.get(row),
            monetary.get(row),
        ) else {
            continue;
        };
        let recency = (reference_secs - last * mul / div) / 86_400;
        metrics.push(CustomerMetrics {
            customer_id,
            recency,
            frequency,
            monetary: total,
        });
    }
    Ok(metrics)
}

/// Multiplier/divisor converting the physical time representation of
/// `InvoiceDate` to epoch seconds.
fn timestamp_to_secs_factors(dtype: &DataType) -> crate::Result<(i64, i64)> {
    match dtype {
        DataType::Datetime(TimeUnit::Nanoseconds, _) => Ok((1, 1_000_000_000)),
        DataType::Datetime(TimeUnit::Microseconds, _) => Ok((1, 1_000_000)),
        DataType::Datetime(TimeUnit::Milliseconds, _) => Ok((1, 1_000)),
        DataType::Date => Ok((86_400, 1)),
        other => bail!(
            "InvoiceDate has type {other}, expected a datetime column; check the timestamp format in the input file"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_for(year: i32, month: u32, day: u32) -> PipelineConfig {
        PipelineConfig::new(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country"
        )
        .unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn cleaning_drops_incomplete_rows_and_keeps_cancellations() {
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01T08:26:00,2.55,17850,United Kingdom",
            "536365,71053,,6,2010-12-01T08:26:00,3.39,17850,United Kingdom",
            "536366,22633,HAND WARMER UNION JACK,6,2010-12-01T08:28:00,1.85,,United Kingdom",
            "C536379,D,Discount,-1,2010-12-02T09:41:00,27.50,14527,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        assert_eq!(raw.height(), 4);

        let (cleaned, stats) = clean_transactions(raw).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(stats.input_rows, 4);
        assert_eq!(stats.dropped_incomplete, 2);
        assert_eq!(stats.cancelled_retained, 1);
        assert_eq!(stats.negative_totals, 1);

        // no surviving line is missing a customer id or description
        assert_eq!(cleaned.column("CustomerID").unwrap().null_count(), 0);
        assert_eq!(cleaned.column("Description").unwrap().null_count(), 0);
    }

    #[test]
    fn aggregation_computes_recency_frequency_monetary() {
        // customer 17850: two lines on one invoice plus a later invoice
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01T08:26:00,2.50,17850,United Kingdom",
            "536365,71053,WHITE METAL LANTERN,4,2010-12-01T08:26:00,3.25,17850,United Kingdom",
            "536370,22633,HAND WARMER UNION JACK,10,2010-12-05T10:00:00,1.85,17850,United Kingdom",
            "536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-03T08:34:00,2.75,13047,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        let (cleaned, _) = clean_transactions(raw).unwrap();
        let metrics = aggregate_customers(cleaned, &config_for(2010, 12, 11)).unwrap();

        assert_eq!(metrics.len(), 2);
        // sorted by customer id
        assert_eq!(metrics[0].customer_id, 13047);
        assert_eq!(metrics[1].customer_id, 17850);

        let big = &metrics[1];
        // last purchase 2010-12-05 10:00, reference 2010-12-11 00:00
        assert_eq!(big.recency, 5);
        assert_eq!(big.frequency, 2);
        assert!((big.monetary - (6.0 * 2.50 + 4.0 * 3.25 + 10.0 * 1.85)).abs() < 1e-9);

        let small = &metrics[0];
        assert_eq!(small.recency, 7);
        assert_eq!(small.frequency, 1);
    }

    #[test]
    fn net_creditors_are_dropped() {
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01T08:26:00,2.50,17850,United Kingdom",
            "C536380,22960,JAM MAKING SET WITH JARS,-10,2010-12-02T09:41:00,4.25,12345,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        let (cleaned, _) = clean_transactions(raw).unwrap();
        let metrics = aggregate_customers(cleaned, &config_for(2010, 12, 11)).unwrap();

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].customer_id, 17850);
        assert!(metrics.iter().all(|m| m.monetary > 0.0));
    }

    #[test]
    fn returns_reduce_monetary_without_dropping_the_customer() {
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,10,2010-12-01T08:26:00,5.00,17850,United Kingdom",
            "C536380,85123A,WHITE HANGING HEART T-LIGHT HOLDER,-4,2010-12-02T09:41:00,5.00,17850,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        let (cleaned, _) = clean_transactions(raw).unwrap();
        let metrics = aggregate_customers(cleaned, &config_for(2010, 12, 11)).unwrap();

        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].monetary - 30.0).abs() < 1e-9);
        // the cancellation counts as a distinct invoice
        assert_eq!(metrics[0].frequency, 2);
    }

    #[test]
    fn reference_date_must_postdate_invoices() {
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-05T08:26:00,2.50,17850,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        let (cleaned, _) = clean_transactions(raw).unwrap();

        let err = aggregate_customers(cleaned, &config_for(2010, 12, 1)).unwrap_err();
        assert!(err.to_string().contains("reference date"));
    }

    #[test]
    fn missing_columns_are_rejected_at_load() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceNo,Quantity,InvoiceDate,UnitPrice,CustomerID").unwrap();
        writeln!(file, "536365,6,2010-12-01T08:26:00,2.55,17850").unwrap();

        let err = load_transactions(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("missing required column"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_transactions("/nonexistent/transactions.csv").is_err());
    }

    #[test]
    fn numeric_invoice_ids_still_aggregate() {
        // no cancellation markers: the invoice column parses as integers
        let file = write_csv(&[
            "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01T08:26:00,2.50,17850,United Kingdom",
            "536366,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-02T08:26:00,2.50,17850,United Kingdom",
        ]);
        let raw = load_transactions(file.path().to_str().unwrap()).unwrap();
        let (cleaned, stats) = clean_transactions(raw).unwrap();
        assert_eq!(stats.cancelled_retained, 0);

        let metrics = aggregate_customers(cleaned, &config_for(2010, 12, 11)).unwrap();
        assert_eq!(metrics[0].frequency, 2);
    }
}
