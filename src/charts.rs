//! Chart selection and rendering.
//!
//! Selection is a pure function of the role assignment and the configured
//! caps, so it stays deterministic and testable without touching the bitmap
//! backend. Rendering failures are isolated per chart: a column that turns
//! out to be empty, or a backend draw error, skips that one chart (removing
//! any partial file) and the run continues.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime};
use log::{info, warn};
use plotters::prelude::*;

use crate::{
    fonts::{self, CHART_FONT_FAMILY},
    frame::Table,
    roles::{RoleAssignment, parse_datetime_value},
    stats,
};

pub const HIST_BINS: usize = 30;
pub const BAR_TOP_K: usize = 20;
pub const HEATMAP_COLUMN_CAP: usize = 12;

const CHART_SIZE: (u32, u32) = (1000, 620);

/// Chart-count caps for the selection policy.
#[derive(Debug, Clone, Copy)]
pub struct ChartOptions {
    pub max_numeric_hists: usize,
    pub max_cat_bars: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            max_numeric_hists: 6,
            max_cat_bars: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Histogram,
    TopKBar,
    Trend,
    CorrHeatmap,
}

/// A successfully rendered chart, referenced from the report gallery.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// Image path relative to the output directory.
    pub image: PathBuf,
}

/// One selected chart before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedChart {
    Histogram { column: String },
    TopKBar { column: String },
    Trend { time: String, value: String },
    CorrHeatmap { columns: Vec<String> },
}

impl PlannedChart {
    pub fn kind(&self) -> ChartKind {
        match self {
            PlannedChart::Histogram { .. } => ChartKind::Histogram,
            PlannedChart::TopKBar { .. } => ChartKind::TopKBar,
            PlannedChart::Trend { .. } => ChartKind::Trend,
            PlannedChart::CorrHeatmap { .. } => ChartKind::CorrHeatmap,
        }
    }

    /// Deterministic file name under the images directory.
    pub fn file_name(&self) -> String {
        match self {
            PlannedChart::Histogram { column } => format!("hist_{}.png", sanitize(column)),
            PlannedChart::TopKBar { column } => format!("bar_{}.png", sanitize(column)),
            PlannedChart::Trend { time, value } => {
                format!("trend_{}_by_{}.png", sanitize(value), sanitize(time))
            }
            PlannedChart::CorrHeatmap { .. } => "corr_heatmap.png".to_string(),
        }
    }

    /// Gallery heading used in the report.
    pub fn gallery_title(&self) -> String {
        match self {
            PlannedChart::Histogram { column } => format!("直方图：{column}"),
            PlannedChart::TopKBar { column } => format!("Top 类别：{column}"),
            PlannedChart::Trend { time, value } => format!("趋势图：{value} vs {time}"),
            PlannedChart::CorrHeatmap { .. } => {
                format!("相关性热力图（前 {HEATMAP_COLUMN_CAP} 个数值列）")
            }
        }
    }
}

/// Applies the selection policy in role order: capped histograms, capped
/// top-k bars, at most one trend chart, at most one correlation heatmap.
/// Families with no eligible columns are silently omitted.
pub fn plan_charts(roles: &RoleAssignment, options: &ChartOptions) -> Vec<PlannedChart> {
    let mut plans = Vec::new();
    for column in roles.numeric.iter().take(options.max_numeric_hists) {
        plans.push(PlannedChart::Histogram {
            column: column.clone(),
        });
    }
    for column in roles.categorical.iter().take(options.max_cat_bars) {
        plans.push(PlannedChart::TopKBar {
            column: column.clone(),
        });
    }
    if let (Some(time), Some(value)) = (roles.datetime.first(), roles.numeric.first()) {
        plans.push(PlannedChart::Trend {
            time: time.clone(),
            value: value.clone(),
        });
    }
    if roles.numeric.len() >= 2 {
        plans.push(PlannedChart::CorrHeatmap {
            columns: roles
                .numeric
                .iter()
                .take(HEATMAP_COLUMN_CAP)
                .cloned()
                .collect(),
        });
    }
    plans
}

/// Renders every selected chart under `<outdir>/images/`, returning specs
/// for the charts that actually succeeded.
pub fn render_charts(
    table: &Table,
    roles: &RoleAssignment,
    outdir: &Path,
    options: &ChartOptions,
) -> Vec<ChartSpec> {
    let bilingual = fonts::ensure_chart_font().cjk();
    let plans = plan_charts(roles, options);
    let file_names = assign_file_names(&plans);
    let mut rendered = Vec::new();
    for (plan, file_name) in plans.iter().zip(file_names) {
        let relative = PathBuf::from("images").join(file_name);
        let target = outdir.join(&relative);
        match render_plan(table, plan, &target, bilingual) {
            Ok(()) => {
                info!("Rendered {}", relative.display());
                rendered.push(ChartSpec {
                    kind: plan.kind(),
                    title: plan.gallery_title(),
                    image: relative,
                });
            }
            Err(err) => {
                warn!("Skipping chart {}: {err:#}", relative.display());
                let _ = fs::remove_file(&target);
            }
        }
    }
    rendered
}

/// Resolves the plans' derived file names, suffixing an ordinal when
/// sanitization maps distinct columns to the same name ("A b" and "a_b"
/// must not overwrite each other).
fn assign_file_names(plans: &[PlannedChart]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    plans
        .iter()
        .map(|plan| {
            let base = plan.file_name();
            if used.insert(base.clone()) {
                return base;
            }
            let stem = base.strip_suffix(".png").unwrap_or(&base).to_string();
            let mut ordinal = 2;
            loop {
                let candidate = format!("{stem}_{ordinal}.png");
                if used.insert(candidate.clone()) {
                    return candidate;
                }
                ordinal += 1;
            }
        })
        .collect()
}

fn render_plan(table: &Table, plan: &PlannedChart, target: &Path, bilingual: bool) -> Result<()> {
    match plan {
        PlannedChart::Histogram { column } => {
            let values = table
                .column(column)
                .and_then(|c| c.numeric_observations())
                .unwrap_or_default();
            if values.is_empty() {
                return Err(anyhow!("column '{column}' has no non-missing values"));
            }
            let caption = if bilingual {
                format!("分布直方图: {column}")
            } else {
                format!("Histogram: {column}")
            };
            draw_histogram(target, &caption, column, &values)
        }
        PlannedChart::TopKBar { column } => {
            let categories = top_categories(table, column, BAR_TOP_K);
            if categories.is_empty() {
                return Err(anyhow!("column '{column}' has no non-missing values"));
            }
            let caption = if bilingual {
                format!("Top {BAR_TOP_K} 类别频数: {column}")
            } else {
                format!("Top {BAR_TOP_K} categories: {column}")
            };
            draw_bar(target, &caption, column, &categories)
        }
        PlannedChart::Trend { time, value } => {
            let points = trend_points(table, time, value);
            if points.is_empty() {
                return Err(anyhow!("no rows with both a valid '{time}' and '{value}'"));
            }
            let caption = if bilingual {
                format!("时间趋势: {value} vs {time}")
            } else {
                format!("Trend: {value} vs {time}")
            };
            draw_trend(target, &caption, time, value, &points)
        }
        PlannedChart::CorrHeatmap { columns } => {
            let matrix = stats::correlation_matrix(table, columns);
            let caption = if bilingual {
                "相关系数热力图".to_string()
            } else {
                "Correlation heatmap".to_string()
            };
            draw_heatmap(target, &caption, &matrix)
        }
    }
}

/// Top-k most frequent category values; ties keep first-encountered order.
fn top_categories(table: &Table, column: &str, k: usize) -> Vec<(String, usize)> {
    let Some(column) = table.column(column) else {
        return Vec::new();
    };
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in 0..column.len() {
        let display = column.display_value(row);
        if display.is_empty() {
            continue;
        }
        if !counts.contains_key(&display) {
            order.push(display.clone());
        }
        *counts.entry(display).or_insert(0) += 1;
    }
    let mut items: Vec<(String, usize)> = order
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            (value, count)
        })
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items.truncate(k);
    items
}

/// Rows with a parseable timestamp and a present value, sorted by time.
fn trend_points(table: &Table, time: &str, value: &str) -> Vec<(NaiveDateTime, f64)> {
    let Some(time_column) = table.column(time) else {
        return Vec::new();
    };
    let Some(values) = table.column(value).and_then(|c| c.numeric_values()) else {
        return Vec::new();
    };
    let Some(raw_times) = time_column.text_values() else {
        return Vec::new();
    };
    let mut points: Vec<(NaiveDateTime, f64)> = raw_times
        .iter()
        .zip(values)
        .filter_map(|(raw, v)| {
            let timestamp = parse_datetime_value(raw.as_deref()?)?;
            Some((timestamp, v?))
        })
        .collect();
    points.sort_by_key(|(timestamp, _)| *timestamp);
    points
}

fn draw_histogram(target: &Path, caption: &str, xlabel: &str, values: &[f64]) -> Result<()> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (hi - lo) / HIST_BINS as f64;
    let mut counts = vec![0usize; HIST_BINS];
    for &value in values {
        let bin = (((value - lo) / width) as usize).min(HIST_BINS - 1);
        counts[bin] += 1;
    }
    let y_max = headroom(counts.iter().copied().max().unwrap_or(1));

    let root = BitMapBackend::new(target, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (CHART_FONT_FAMILY, 26))
        .margin(12)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(lo..hi, 0usize..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(xlabel)
        .y_desc("Count")
        .label_style((CHART_FONT_FAMILY, 14))
        .axis_desc_style((CHART_FONT_FAMILY, 16))
        .draw()?;
    chart.draw_series(counts.iter().enumerate().map(|(bin, &count)| {
        let x0 = lo + width * bin as f64;
        Rectangle::new([(x0, 0), (x0 + width, count)], BLUE.mix(0.6).filled())
    }))?;
    root.present()
        .with_context(|| format!("Writing chart file {target:?}"))?;
    Ok(())
}

fn draw_bar(
    target: &Path,
    caption: &str,
    xlabel: &str,
    categories: &[(String, usize)],
) -> Result<()> {
    let y_max = headroom(categories.iter().map(|(_, c)| *c).max().unwrap_or(1));
    let count = categories.len() as i32;

    let root = BitMapBackend::new(target, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (CHART_FONT_FAMILY, 26))
        .margin(12)
        .x_label_area_size(96)
        .y_label_area_size(64)
        .build_cartesian_2d((0..count).into_segmented(), 0usize..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(xlabel)
        .y_desc("Count")
        .x_labels(categories.len())
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(idx) => categories
                .get(*idx as usize)
                .map(|(name, _)| truncate_label(name))
                .unwrap_or_default(),
            _ => String::new(),
        })
        .label_style((CHART_FONT_FAMILY, 12))
        .axis_desc_style((CHART_FONT_FAMILY, 16))
        .draw()?;
    chart.draw_series(categories.iter().enumerate().map(|(idx, (_, value))| {
        Rectangle::new(
            [
                (SegmentValue::Exact(idx as i32), 0),
                (SegmentValue::Exact(idx as i32 + 1), *value),
            ],
            BLUE.mix(0.6).filled(),
        )
    }))?;
    root.present()
        .with_context(|| format!("Writing chart file {target:?}"))?;
    Ok(())
}

fn draw_trend(
    target: &Path,
    caption: &str,
    xlabel: &str,
    ylabel: &str,
    points: &[(NaiveDateTime, f64)],
) -> Result<()> {
    let series: Vec<(f64, f64)> = points
        .iter()
        .map(|(timestamp, value)| (timestamp.and_utc().timestamp() as f64, *value))
        .collect();
    let (x_min, x_max) = span(series.iter().map(|(x, _)| *x));
    let (y_min, y_max) = span(series.iter().map(|(_, y)| *y));

    let root = BitMapBackend::new(target, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (CHART_FONT_FAMILY, 26))
        .margin(12)
        .x_label_area_size(56)
        .y_label_area_size(72)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(xlabel)
        .y_desc(ylabel)
        .x_label_formatter(&|seconds| {
            DateTime::from_timestamp(*seconds as i64, 0)
                .map(|dt| dt.naive_utc().format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        })
        .label_style((CHART_FONT_FAMILY, 13))
        .axis_desc_style((CHART_FONT_FAMILY, 16))
        .draw()?;
    chart.draw_series(LineSeries::new(series, BLUE.stroke_width(2)))?;
    root.present()
        .with_context(|| format!("Writing chart file {target:?}"))?;
    Ok(())
}

fn draw_heatmap(target: &Path, caption: &str, matrix: &stats::CorrelationMatrix) -> Result<()> {
    let n = matrix.columns.len();
    if n < 2 {
        return Err(anyhow!("correlation heatmap needs at least two columns"));
    }
    let size = n as f64;

    let root = BitMapBackend::new(target, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (CHART_FONT_FAMILY, 26))
        .margin(12)
        .x_label_area_size(110)
        .y_label_area_size(130)
        .build_cartesian_2d(0.0..size, 0.0..size)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|x| column_label(matrix, *x, false))
        .y_label_formatter(&|y| column_label(matrix, *y, true))
        .label_style((CHART_FONT_FAMILY, 12))
        .draw()?;
    // Row 0 at the top, matching the usual correlation-matrix orientation.
    chart.draw_series((0..n).flat_map(|row| {
        let values = &matrix.values[row];
        (0..n).map(move |col| {
            let y0 = (n - 1 - row) as f64;
            Rectangle::new(
                [(col as f64, y0), (col as f64 + 1.0, y0 + 1.0)],
                correlation_color(values[col]).filled(),
            )
        })
    }))?;
    root.present()
        .with_context(|| format!("Writing chart file {target:?}"))?;
    Ok(())
}

fn column_label(matrix: &stats::CorrelationMatrix, position: f64, flipped: bool) -> String {
    let n = matrix.columns.len();
    let mut index = position.floor() as usize;
    if index >= n {
        index = n - 1;
    }
    if flipped {
        index = n - 1 - index;
    }
    truncate_label(&matrix.columns[index])
}

/// Diverging blue/white/red map over [-1, 1]; undefined cells are grey.
fn correlation_color(value: Option<f64>) -> RGBColor {
    let Some(r) = value else {
        return RGBColor(200, 200, 200);
    };
    let r = r.clamp(-1.0, 1.0);
    let blend = |from: (u8, u8, u8), to: (u8, u8, u8), t: f64| {
        let channel = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        RGBColor(
            channel(from.0, to.0),
            channel(from.1, to.1),
            channel(from.2, to.2),
        )
    };
    if r < 0.0 {
        blend((255, 255, 255), (59, 76, 192), -r)
    } else {
        blend((255, 255, 255), (180, 4, 38), r)
    }
}

fn headroom(max_count: usize) -> usize {
    max_count + max_count / 20 + 1
}

fn span(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

fn truncate_label(name: &str) -> String {
    const MAX: usize = 18;
    if name.chars().count() <= MAX {
        name.to_string()
    } else {
        let head: String = name.chars().take(MAX - 1).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, ColumnData};
    use crate::roles::infer_roles;

    fn roles_with(
        datetime: &[&str],
        numeric: &[&str],
        categorical: &[&str],
    ) -> RoleAssignment {
        RoleAssignment {
            datetime: datetime.iter().map(|s| s.to_string()).collect(),
            numeric: numeric.iter().map(|s| s.to_string()).collect(),
            categorical: categorical.iter().map(|s| s.to_string()).collect(),
            id_like: Vec::new(),
        }
    }

    #[test]
    fn selection_respects_caps_and_order() {
        let roles = roles_with(
            &[],
            &["n1", "n2", "n3"],
            &["c1", "c2", "c3"],
        );
        let options = ChartOptions {
            max_numeric_hists: 2,
            max_cat_bars: 1,
        };
        let plans = plan_charts(&roles, &options);
        assert_eq!(
            plans,
            vec![
                PlannedChart::Histogram { column: "n1".into() },
                PlannedChart::Histogram { column: "n2".into() },
                PlannedChart::TopKBar { column: "c1".into() },
                PlannedChart::CorrHeatmap {
                    columns: vec!["n1".into(), "n2".into(), "n3".into()]
                },
            ]
        );
    }

    #[test]
    fn trend_needs_both_a_datetime_and_a_numeric_column() {
        let no_datetime = plan_charts(&roles_with(&[], &["n1"], &[]), &ChartOptions::default());
        assert!(
            !no_datetime
                .iter()
                .any(|p| matches!(p, PlannedChart::Trend { .. }))
        );

        let plans = plan_charts(
            &roles_with(&["d1", "d2"], &["n1", "n2"], &[]),
            &ChartOptions::default(),
        );
        let trend = plans
            .iter()
            .find(|p| matches!(p, PlannedChart::Trend { .. }))
            .unwrap();
        assert_eq!(
            trend,
            &PlannedChart::Trend {
                time: "d1".into(),
                value: "n1".into()
            }
        );
    }

    #[test]
    fn heatmap_needs_two_numeric_columns_and_caps_at_twelve() {
        let single = plan_charts(&roles_with(&[], &["n1"], &[]), &ChartOptions::default());
        assert!(
            !single
                .iter()
                .any(|p| matches!(p, PlannedChart::CorrHeatmap { .. }))
        );

        let names: Vec<String> = (0..15).map(|i| format!("n{i}")).collect();
        let roles = RoleAssignment {
            numeric: names,
            ..RoleAssignment::default()
        };
        let plans = plan_charts(&roles, &ChartOptions::default());
        let heatmap = plans
            .iter()
            .find_map(|p| match p {
                PlannedChart::CorrHeatmap { columns } => Some(columns),
                _ => None,
            })
            .unwrap();
        assert_eq!(heatmap.len(), HEATMAP_COLUMN_CAP);
    }

    #[test]
    fn file_names_are_deterministic_and_sanitized() {
        let plan = PlannedChart::Trend {
            time: "Order Date".into(),
            value: "Net Sales".into(),
        };
        assert_eq!(plan.file_name(), "trend_net_sales_by_order_date.png");
        let hist = PlannedChart::Histogram {
            column: "价格/单位".into(),
        };
        assert_eq!(hist.file_name(), "hist_价格_单位.png");
    }

    #[test]
    fn colliding_file_names_get_ordinal_suffixes() {
        let plans = vec![
            PlannedChart::Histogram {
                column: "A b".into(),
            },
            PlannedChart::Histogram {
                column: "a_b".into(),
            },
            PlannedChart::Histogram {
                column: "a b".into(),
            },
        ];
        assert_eq!(
            assign_file_names(&plans),
            vec!["hist_a_b.png", "hist_a_b_2.png", "hist_a_b_3.png"]
        );
    }

    #[test]
    fn top_categories_break_ties_by_first_encounter() {
        let values = ["b", "a", "b", "a", "c"]
            .iter()
            .map(|s| Some(s.to_string()))
            .collect();
        let table = Table::new(vec![Column::new("cat", ColumnData::Text(values))]).unwrap();
        let top = top_categories(&table, "cat", 20);
        assert_eq!(
            top,
            vec![
                ("b".to_string(), 2),
                ("a".to_string(), 2),
                ("c".to_string(), 1)
            ]
        );
    }

    #[test]
    fn trend_points_drop_invalid_rows_and_sort_ascending() {
        let dates = [Some("2024-01-03"), Some("bogus"), Some("2024-01-01"), None]
            .iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect();
        let table = Table::new(vec![
            Column::new("date", ColumnData::Text(dates)),
            Column::new(
                "v",
                ColumnData::Float(vec![Some(3.0), Some(9.0), Some(1.0), Some(7.0)]),
            ),
        ])
        .unwrap();
        let points = trend_points(&table, "date", "v");
        assert_eq!(points.len(), 2);
        assert!(points[0].0 < points[1].0);
        assert_eq!(points[0].1, 1.0);
        assert_eq!(points[1].1, 3.0);
    }

    #[test]
    fn scenario_one_trend_one_hist_one_bar() {
        let dates: Vec<Option<String>> = (1..=10)
            .map(|day| Some(format!("2024-01-{day:02}")))
            .collect();
        let regions: Vec<Option<String>> = (0..10)
            .map(|i| Some(if i % 2 == 0 { "East" } else { "West" }.to_string()))
            .collect();
        let sales: Vec<Option<f64>> = (0..10)
            .map(|i| if i == 4 { None } else { Some(10.0 + i as f64) })
            .collect();
        let table = Table::new(vec![
            Column::new("date", ColumnData::Text(dates)),
            Column::new("region", ColumnData::Text(regions)),
            Column::new("sales", ColumnData::Float(sales)),
        ])
        .unwrap();
        let roles = infer_roles(&table);
        let plans = plan_charts(&roles, &ChartOptions::default());
        assert_eq!(
            plans,
            vec![
                PlannedChart::Histogram {
                    column: "sales".into()
                },
                PlannedChart::TopKBar {
                    column: "region".into()
                },
                PlannedChart::Trend {
                    time: "date".into(),
                    value: "sales".into()
                },
            ]
        );
    }
}
