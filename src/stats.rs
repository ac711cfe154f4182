//! Descriptive statistics over the loaded table: missingness, numeric
//! summaries, Pearson correlations, and categorical group means.
//!
//! Everything here is a pure in-memory transformation; missing values are
//! excluded from every aggregate rather than treated as zero.

use std::collections::HashMap;

use itertools::Itertools;

use crate::{frame::Table, outliers, roles::RoleAssignment};

/// Columns shown in the missingness table and the numeric describe table.
pub const REPORT_COLUMN_CAP: usize = 30;
/// Categorical/numeric column caps for group summaries.
pub const GROUP_CATEGORICAL_CAP: usize = 2;
pub const GROUP_NUMERIC_CAP: usize = 2;
/// Groups kept per summary after sorting.
pub const GROUP_TOP: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Missingness {
    pub name: String,
    pub ratio: f64,
}

/// Per-column missing ratios, sorted descending (ties keep table order).
pub fn missingness(table: &Table) -> Vec<Missingness> {
    let rows = table.row_count();
    let mut entries: Vec<Missingness> = table
        .columns()
        .iter()
        .map(|column| Missingness {
            name: column.name.clone(),
            ratio: if rows == 0 {
                0.0
            } else {
                column.missing_count() as f64 / rows as f64
            },
        })
        .collect();
    entries.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));
    entries
}

/// Count/mean/std/min/quartiles/max for one numeric column.
#[derive(Debug, Clone)]
pub struct NumericProfile {
    pub name: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Describe-table rows for up to [`REPORT_COLUMN_CAP`] numeric columns, in
/// role order.
pub fn describe(table: &Table, roles: &RoleAssignment) -> Vec<NumericProfile> {
    roles
        .numeric
        .iter()
        .take(REPORT_COLUMN_CAP)
        .filter_map(|name| table.column(name))
        .map(|column| {
            let values = column.numeric_observations().unwrap_or_default();
            profile(&column.name, &values)
        })
        .collect()
}

fn profile(name: &str, values: &[f64]) -> NumericProfile {
    let count = values.len();
    if count == 0 {
        return NumericProfile {
            name: name.to_string(),
            count,
            mean: None,
            std_dev: None,
            min: None,
            p25: None,
            p50: None,
            p75: None,
            max: None,
        };
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mean = values.iter().sum::<f64>() / count as f64;
    let std_dev = (count >= 2).then(|| {
        let sum_sq = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
        (sum_sq / (count as f64 - 1.0)).sqrt()
    });
    NumericProfile {
        name: name.to_string(),
        count,
        mean: Some(mean),
        std_dev,
        min: sorted.first().copied(),
        p25: Some(outliers::quantile(&sorted, 0.25)),
        p50: Some(outliers::quantile(&sorted, 0.50)),
        p75: Some(outliers::quantile(&sorted, 0.75)),
        max: sorted.last().copied(),
    }
}

/// Pearson correlations over pairwise-complete observations. `values[i][j]`
/// is `None` when fewer than two complete pairs exist or either side has
/// zero variance.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation_matrix(table: &Table, columns: &[String]) -> CorrelationMatrix {
    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|name| {
            table
                .column(name)
                .and_then(|c| c.numeric_values())
                .unwrap_or_default()
        })
        .collect();

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = Some(1.0);
    }
    for (i, j) in (0..n).tuple_combinations() {
        let r = pearson(&series[i], &series[j]);
        values[i][j] = r;
        values[j][i] = r;
    }
    CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    }
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

/// Strongest-magnitude off-diagonal pair, walking the upper triangle in
/// column order so ties resolve to the first-encountered pair.
pub fn strongest_pair(matrix: &CorrelationMatrix) -> Option<(String, String, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for (i, j) in (0..matrix.columns.len()).tuple_combinations() {
        if let Some(r) = matrix.values[i][j] {
            let better = match best {
                Some((_, _, current)) => r.abs() > current.abs(),
                None => true,
            };
            if better {
                best = Some((i, j, r));
            }
        }
    }
    best.map(|(i, j, r)| (matrix.columns[i].clone(), matrix.columns[j].clone(), r))
}

/// Per-category means of up to two numeric columns, grouped by one
/// categorical column.
#[derive(Debug, Clone)]
pub struct GroupSummary {
    pub category_column: String,
    pub numeric_columns: Vec<String>,
    /// (category value, mean per numeric column), sorted descending by the
    /// first numeric column's mean, truncated to [`GROUP_TOP`].
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

pub fn group_summaries(table: &Table, roles: &RoleAssignment) -> Vec<GroupSummary> {
    let numeric_columns: Vec<&String> = roles.numeric.iter().take(GROUP_NUMERIC_CAP).collect();
    if numeric_columns.is_empty() {
        return Vec::new();
    }
    let numeric_series: Vec<Vec<Option<f64>>> = numeric_columns
        .iter()
        .map(|name| {
            table
                .column(name)
                .and_then(|c| c.numeric_values())
                .unwrap_or_default()
        })
        .collect();

    roles
        .categorical
        .iter()
        .take(GROUP_CATEGORICAL_CAP)
        .filter_map(|name| summarize_group(table, name, &numeric_columns, &numeric_series))
        .collect()
}

fn summarize_group(
    table: &Table,
    category_column: &str,
    numeric_columns: &[&String],
    numeric_series: &[Vec<Option<f64>>],
) -> Option<GroupSummary> {
    let column = table.column(category_column)?;
    let rows = column.len();

    // Group keys in first-encounter order for deterministic tie handling.
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, Vec<(f64, usize)>> = HashMap::new();
    for row in 0..rows {
        let key = match &column.data {
            crate::frame::ColumnData::Text(values) => values.get(row).and_then(|v| v.clone()),
            _ => {
                let display = column.display_value(row);
                (!display.is_empty()).then_some(display)
            }
        };
        // Rows with a missing category value stay out of every group.
        let Some(key) = key else { continue };
        let entry = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            vec![(0.0, 0); numeric_series.len()]
        });
        for (slot, series) in entry.iter_mut().zip(numeric_series) {
            if let Some(Some(value)) = series.get(row) {
                slot.0 += value;
                slot.1 += 1;
            }
        }
    }

    let mut summary_rows: Vec<(String, Vec<Option<f64>>)> = order
        .into_iter()
        .map(|key| {
            let means = sums[&key]
                .iter()
                .map(|(sum, count)| (*count > 0).then(|| sum / *count as f64))
                .collect();
            (key, means)
        })
        .collect();

    // Descending by the first numeric mean; groups without observations last.
    summary_rows.sort_by(|a, b| {
        match (
            a.1.first().copied().flatten(),
            b.1.first().copied().flatten(),
        ) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    summary_rows.truncate(GROUP_TOP);

    Some(GroupSummary {
        category_column: category_column.to_string(),
        numeric_columns: numeric_columns.iter().map(|s| s.to_string()).collect(),
        rows: summary_rows,
    })
}
