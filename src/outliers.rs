//! IQR outlier fences for numeric columns.

use crate::frame::Column;

/// Quartile fences and outlier counts for one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierSummary {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub low: f64,
    pub high: f64,
    pub outlier_count: usize,
    pub outlier_ratio: f64,
}

/// Computes IQR fences over the non-missing values of a numeric column.
/// Returns `None` when the column is not numeric or has no observations;
/// absence is the signal, never a zeroed summary.
pub fn detect_column(column: &Column) -> Option<OutlierSummary> {
    detect(&column.numeric_observations()?)
}

pub fn detect(values: &[f64]) -> Option<OutlierSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let low = q1 - 1.5 * iqr;
    let high = q3 + 1.5 * iqr;
    let outlier_count = values.iter().filter(|&&v| v < low || v > high).count();

    Some(OutlierSummary {
        q1,
        q3,
        iqr,
        low,
        high,
        outlier_count,
        outlier_ratio: outlier_count as f64 / values.len().max(1) as f64,
    })
}

/// Linear-interpolation quantile estimate over a sorted, non-empty slice:
/// `pos = q * (n - 1)`, interpolating between the bracketing order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, ColumnData};

    #[test]
    fn worked_example_matches_expected_fences() {
        let summary = detect(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert!((summary.q1 - 2.25).abs() < 1e-12);
        assert!((summary.q3 - 4.75).abs() < 1e-12);
        assert!((summary.iqr - 2.5).abs() < 1e-12);
        assert!((summary.low - -1.5).abs() < 1e-12);
        assert!((summary.high - 8.5).abs() < 1e-12);
        assert_eq!(summary.outlier_count, 1);
        assert!((summary.outlier_ratio - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn fence_identity_holds() {
        let summary = detect(&[3.0, 9.0, 4.5, 7.0, 2.0, 8.0, 6.0]).unwrap();
        assert_eq!(summary.low, summary.q1 - 1.5 * summary.iqr);
        assert_eq!(summary.high, summary.q3 + 1.5 * summary.iqr);
        assert!(summary.outlier_ratio >= 0.0 && summary.outlier_ratio <= 1.0);
    }

    #[test]
    fn empty_input_yields_no_data() {
        assert_eq!(detect(&[]), None);
    }

    #[test]
    fn values_on_the_fence_are_not_outliers() {
        // Constant column: iqr = 0, fences collapse onto the value, and
        // nothing is strictly outside them.
        let summary = detect(&[2.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(summary.iqr, 0.0);
        assert_eq!(summary.low, 2.0);
        assert_eq!(summary.high, 2.0);
        assert_eq!(summary.outlier_count, 0);
    }

    #[test]
    fn missing_values_are_dropped_before_quartiles() {
        let column = Column::new(
            "v",
            ColumnData::Float(vec![Some(1.0), None, Some(2.0), Some(3.0), None]),
        );
        let summary = detect_column(&column).unwrap();
        assert!((summary.q1 - 1.5).abs() < 1e-12);
        assert!((summary.q3 - 2.5).abs() < 1e-12);
    }

    #[test]
    fn all_missing_numeric_column_is_no_data() {
        let column = Column::new("v", ColumnData::Float(vec![None, None]));
        assert_eq!(detect_column(&column), None);
    }

    #[test]
    fn single_value_has_degenerate_quartiles() {
        let summary = detect(&[42.0]).unwrap();
        assert_eq!(summary.q1, 42.0);
        assert_eq!(summary.q3, 42.0);
        assert_eq!(summary.outlier_count, 0);
        assert_eq!(summary.outlier_ratio, 0.0);
    }
}
