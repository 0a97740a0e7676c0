//! Cohort CSV export using the Polars CSV writer

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use polars::prelude::*;

use crate::segment::{filter_cohort, Cohort, SegmentedCustomer, EXPORT_COHORTS};

/// Build the export table for a set of segmented rows.
fn cohort_dataframe(rows: &[&SegmentedCustomer]) -> crate::Result<DataFrame> {
    let df = df!(
        "CustomerID" => rows.iter().map(|c| c.customer_id).collect::<Vec<i64>>(),
        "recency" => rows.iter().map(|c| c.recency).collect::<Vec<i64>>(),
        "frequency" => rows.iter().map(|c| c.frequency).collect::<Vec<u32>>(),
        "monetary" => rows.iter().map(|c| c.monetary).collect::<Vec<f64>>(),
        "RF_SCORE" => rows.iter().map(|c| c.rf_code.as_str()).collect::<Vec<&str>>(),
        "RFM_SCORE" => rows.iter().map(|c| c.rfm_code.as_str()).collect::<Vec<&str>>(),
        "segment" => rows.iter().map(|c| c.segment.as_str()).collect::<Vec<&str>>(),
    )?;
    Ok(df)
}

/// Write one cohort to `<output_dir>/<name>_customers.csv`.
///
/// # Returns
/// * The written path and the number of exported rows
pub fn export_cohort(
    customers: &[SegmentedCustomer],
    cohort: &Cohort,
    output_dir: &Path,
) -> crate::Result<(PathBuf, usize)> {
    let rows = filter_cohort(customers, cohort);
    let mut df = cohort_dataframe(&rows)?;

    let path = output_dir.join(format!("{}_customers.csv", cohort.name));
    let mut file = File::create(&path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok((path, rows.len()))
}

/// Export the four campaign cohorts.
pub fn export_cohorts(
    customers: &[SegmentedCustomer],
    output_dir: &Path,
) -> crate::Result<Vec<(PathBuf, usize)>> {
    EXPORT_COHORTS
        .iter()
        .map(|cohort| export_cohort(customers, cohort, output_dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{Segment, ABOUT_TO_LEAVE};

    fn customer(customer_id: i64, rf_code: &str, rfm_code: &str, segment: Segment) -> SegmentedCustomer {
        SegmentedCustomer {
            customer_id,
            recency: 45,
            frequency: 3,
            monetary: 180.0,
            rf_code: rf_code.to_string(),
            rfm_code: rfm_code.to_string(),
            segment,
        }
    }

    #[test]
    fn exported_rows_match_the_cohort_filter() {
        let customers = vec![
            customer(1, "21", "211", Segment::Hibernating),
            customer(2, "55", "555", Segment::Champions),
            customer(3, "24", "243", Segment::AtRisk),
        ];
        let dir = tempfile::tempdir().unwrap();

        let (path, rows) = export_cohort(&customers, &ABOUT_TO_LEAVE, dir.path()).unwrap();
        assert_eq!(rows, 2);
        assert!(path.ends_with("about_to_leave_customers.csv"));

        let exported = CsvReader::from_path(&path).unwrap().finish().unwrap();
        assert_eq!(exported.height(), 2);
        assert_eq!(
            exported.get_column_names(),
            vec![
                "CustomerID",
                "recency",
                "frequency",
                "monetary",
                "RF_SCORE",
                "RFM_SCORE",
                "segment"
            ]
        );

        let codes = exported
            .column("RFM_SCORE")
            .unwrap()
            .cast(&DataType::Utf8)
            .unwrap();
        for code in codes.utf8().unwrap().into_iter().flatten() {
            assert!(ABOUT_TO_LEAVE.contains(code));
        }
    }

    #[test]
    fn empty_cohorts_still_export_headers() {
        let customers = vec![customer(9, "55", "555", Segment::Champions)];
        let dir = tempfile::tempdir().unwrap();

        let (path, rows) = export_cohort(&customers, &ABOUT_TO_LEAVE, dir.path()).unwrap();
        assert_eq!(rows, 0);

        let exported = CsvReader::from_path(&path).unwrap().finish().unwrap();
        assert_eq!(exported.height(), 0);
        assert_eq!(exported.width(), 7);
    }

    #[test]
    fn all_four_cohorts_are_written() {
        let customers = vec![
            customer(1, "51", "514", Segment::NewCustomers),
            customer(2, "54", "544", Segment::Champions),
            customer(3, "33", "333", Segment::NeedAttention),
            customer(4, "22", "222", Segment::Hibernating),
        ];
        let dir = tempfile::tempdir().unwrap();

        let exports = export_cohorts(&customers, dir.path()).unwrap();
        assert_eq!(exports.len(), 4);
        for (path, rows) in exports {
            assert!(path.exists());
            assert_eq!(rows, 1);
        }
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let customers = vec![customer(1, "55", "555", Segment::Champions)];
        let result = export_cohort(
            &customers,
            &ABOUT_TO_LEAVE,
            Path::new("/nonexistent/output/dir"),
        );
        assert!(result.is_err());
    }
}
