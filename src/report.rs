//! Markdown report synthesis.
//!
//! Composition is a pure function of already-computed results; nothing here
//! touches the table again and nothing embeds wall-clock time, so a rerun on
//! identical input yields a byte-identical document. The file hits disk via
//! a temp-file rename, never as a partial write.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{
    charts::ChartSpec,
    frame::Table,
    outliers::OutlierSummary,
    roles::RoleAssignment,
    stats::{GroupSummary, Missingness, NumericProfile, REPORT_COLUMN_CAP},
};

pub const REPORT_FILE_NAME: &str = "report.md";
/// Columns quoted in the missingness and outlier insight paragraphs.
const INSIGHT_TOP: usize = 3;

/// Everything the synthesizer needs, borrowed from the pipeline stages.
pub struct ReportInputs<'a> {
    pub table: &'a Table,
    pub roles: &'a RoleAssignment,
    pub missing: &'a [Missingness],
    pub profiles: &'a [NumericProfile],
    pub outliers: &'a [(String, Option<OutlierSummary>)],
    pub groups: &'a [GroupSummary],
    pub charts: &'a [ChartSpec],
    pub correlation: &'a Option<(String, String, f64)>,
}

/// Assembles the full report in the fixed section order.
pub fn compose(inputs: &ReportInputs<'_>) -> String {
    let mut out = String::new();
    out.push_str("# 自动数据分析报告 (Auto EDA v2)\n\n");
    out.push_str(&format!("- 行数: **{}**\n", inputs.table.row_count()));
    out.push_str(&format!("- 列数: **{}**\n", inputs.table.column_count()));

    push_missingness(&mut out, inputs.missing);
    push_roles(&mut out, inputs.roles);
    if !inputs.roles.numeric.is_empty() {
        push_describe(&mut out, inputs.profiles);
        push_outliers(&mut out, inputs.outliers);
    }
    push_groups(&mut out, inputs.groups);
    push_charts(&mut out, inputs.charts);
    out.push_str(&bilingual_insights(
        inputs.missing,
        inputs.outliers,
        inputs.correlation,
    ));
    out
}

/// Writes the finished document through a temp file and rename so a report
/// is either fully present or absent.
pub fn write_atomic(outdir: &Path, contents: &str) -> Result<PathBuf> {
    let target = outdir.join(REPORT_FILE_NAME);
    let staging = outdir.join(format!("{REPORT_FILE_NAME}.tmp"));
    fs::write(&staging, contents).with_context(|| format!("Writing report to {staging:?}"))?;
    fs::rename(&staging, &target)
        .with_context(|| format!("Moving report into place at {target:?}"))?;
    Ok(target)
}

fn push_missingness(out: &mut String, missing: &[Missingness]) {
    out.push_str("\n## 缺失值概览\n\n");
    out.push_str("|列名|缺失率|\n|---|---|\n");
    for entry in missing.iter().take(REPORT_COLUMN_CAP) {
        out.push_str(&format!(
            "|{}|{}|\n",
            escape_cell(&entry.name),
            format_percent(entry.ratio)
        ));
    }
}

fn push_roles(out: &mut String, roles: &RoleAssignment) {
    out.push_str("\n## 字段类型推断\n\n");
    for (role, columns) in roles.buckets() {
        let listing = if columns.is_empty() {
            "(无)".to_string()
        } else {
            columns.join(", ")
        };
        out.push_str(&format!("- **{}**: {}\n", role.label(), listing));
    }
}

fn push_describe(out: &mut String, profiles: &[NumericProfile]) {
    out.push_str("\n## 数值字段统计摘要\n\n");
    out.push_str("|字段|count|mean|std|min|25%|50%|75%|max|\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---:|---:|---:|\n");
    for p in profiles {
        out.push_str(&format!(
            "|{}|{}|{}|{}|{}|{}|{}|{}|{}|\n",
            escape_cell(&p.name),
            p.count,
            format_opt(p.mean),
            format_opt(p.std_dev),
            format_opt(p.min),
            format_opt(p.p25),
            format_opt(p.p50),
            format_opt(p.p75),
            format_opt(p.max),
        ));
    }
}

fn push_outliers(out: &mut String, outliers: &[(String, Option<OutlierSummary>)]) {
    out.push_str("\n## 异常值（IQR 快速检测）\n\n");
    out.push_str("|字段|异常数|异常比例|下界|上界|\n|---|---:|---:|---:|---:|\n");
    for (name, summary) in outliers {
        let Some(summary) = summary else { continue };
        out.push_str(&format!(
            "|{}|{}|{}|{}|{}|\n",
            escape_cell(name),
            summary.outlier_count,
            format_percent(summary.outlier_ratio),
            format_sig(summary.low, 3),
            format_sig(summary.high, 3),
        ));
    }
}

fn push_groups(out: &mut String, groups: &[GroupSummary]) {
    if groups.is_empty() {
        return;
    }
    out.push_str("\n## 分组洞察（类别字段 → 数值字段均值）\n");
    for group in groups {
        out.push_str(&format!(
            "\n### 按 {} 分组（Top 15）\n\n",
            group.category_column
        ));
        out.push_str(&format!(
            "|{}|{}|\n",
            escape_cell(&group.category_column),
            group
                .numeric_columns
                .iter()
                .map(|name| escape_cell(name))
                .collect::<Vec<_>>()
                .join("|")
        ));
        out.push_str(&format!(
            "|---|{}|\n",
            group
                .numeric_columns
                .iter()
                .map(|_| "---:")
                .collect::<Vec<_>>()
                .join("|")
        ));
        for (key, means) in &group.rows {
            out.push_str(&format!(
                "|{}|{}|\n",
                escape_cell(key),
                means
                    .iter()
                    .map(|mean| format_opt(*mean))
                    .collect::<Vec<_>>()
                    .join("|")
            ));
        }
    }
}

fn push_charts(out: &mut String, charts: &[ChartSpec]) {
    if charts.is_empty() {
        return;
    }
    out.push_str("\n## 自动生成图表\n");
    for chart in charts {
        out.push_str(&format!(
            "\n### {}\n\n![]({})\n",
            chart.title,
            chart.image.display()
        ));
    }
}

/// Narrative insights as a pure function of the computed statistics.
pub fn bilingual_insights(
    missing: &[Missingness],
    outliers: &[(String, Option<OutlierSummary>)],
    correlation: &Option<(String, String, f64)>,
) -> String {
    let mut out = String::new();
    out.push_str("\n## 核心洞察 | Key Insights\n");

    out.push_str("\n### 1️⃣ 缺失值情况 | Missingness\n\n");
    for entry in missing.iter().take(INSIGHT_TOP) {
        let percent = format_percent(entry.ratio);
        out.push_str(&format!(
            "- 【{name}】缺失率为 {percent}。 (Column '{name}' has a missing rate of {percent}).\n",
            name = entry.name,
        ));
    }

    // Ranked by outlier count; ties keep numeric column order.
    let mut ranked: Vec<(&String, &OutlierSummary)> = outliers
        .iter()
        .filter_map(|(name, summary)| summary.as_ref().map(|s| (name, s)))
        .collect();
    ranked.sort_by(|a, b| b.1.outlier_count.cmp(&a.1.outlier_count));
    if !ranked.is_empty() {
        out.push_str("\n### 2️⃣ 异常值检测 | Outliers\n\n");
        for (name, summary) in ranked.into_iter().take(INSIGHT_TOP) {
            let percent = format_percent(summary.outlier_ratio);
            out.push_str(&format!(
                "- 【{name}】存在 {count} 个异常值，占比 {percent}。 (Column '{name}' has {count} outliers, ratio {percent}).\n",
                count = summary.outlier_count,
            ));
        }
    }

    if let Some((left, right, r)) = correlation {
        out.push_str("\n### 3️⃣ 强相关变量 | Strong Correlation\n\n");
        out.push_str(&format!(
            "- 【{left}】与【{right}】相关系数为 {r:.3}。 (Correlation between '{left}' and '{right}' is {r:.3}).\n",
        ));
    }

    out.push_str("\n## 下一步建议 | Next Steps\n\n");
    out.push_str("- 建议进行进一步特征工程或异常值处理。 (Consider feature engineering or outlier treatment.)\n");
    out.push_str("- 若目标变量存在，可进行回归或分类建模。 (If a target variable exists, build regression or classification models.)\n");
    out.push_str("- 可进行更细粒度分组分析。 (Perform deeper group-based analysis.)\n");
    out
}

fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

fn format_opt(value: Option<f64>) -> String {
    value.map(crate::frame::format_float).unwrap_or_default()
}

/// Compact significant-digit rendering for fence bounds, in the spirit of
/// printf's `%g`.
fn format_sig(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= digits as i32 {
        format!("{:.*e}", digits.saturating_sub(1), value)
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        let rendered = format!("{value:.decimals$}");
        if rendered.contains('.') {
            rendered
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        } else {
            rendered
        }
    }
}

/// Keeps markdown tables intact when a value carries pipes or newlines.
fn escape_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, ColumnData, Table};
    use crate::roles::infer_roles;
    use crate::{outliers, stats};

    fn numeric_table() -> Table {
        Table::new(vec![
            Column::new(
                "a",
                ColumnData::Float(vec![Some(1.0), Some(2.0), None, Some(4.0)]),
            ),
            Column::new(
                "b",
                ColumnData::Float(vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0)]),
            ),
        ])
        .unwrap()
    }

    fn compose_for(table: &Table) -> String {
        let roles = infer_roles(table);
        let missing = stats::missingness(table);
        let profiles = stats::describe(table, &roles);
        let outlier_rows: Vec<(String, Option<outliers::OutlierSummary>)> = roles
            .numeric
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    table.column(name).and_then(outliers::detect_column),
                )
            })
            .collect();
        let groups = stats::group_summaries(table, &roles);
        let correlation = if roles.numeric.len() >= 2 {
            stats::strongest_pair(&stats::correlation_matrix(table, &roles.numeric))
        } else {
            None
        };
        compose(&ReportInputs {
            table,
            roles: &roles,
            missing: &missing,
            profiles: &profiles,
            outliers: &outlier_rows,
            groups: &groups,
            charts: &[],
            correlation: &correlation,
        })
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let report = compose_for(&numeric_table());
        let order = [
            "# 自动数据分析报告",
            "## 缺失值概览",
            "## 字段类型推断",
            "## 数值字段统计摘要",
            "## 异常值（IQR 快速检测）",
            "## 核心洞察 | Key Insights",
            "## 下一步建议 | Next Steps",
        ];
        let mut last = 0;
        for heading in order {
            let position = report.find(heading).unwrap_or_else(|| {
                panic!("missing section '{heading}' in:\n{report}");
            });
            assert!(position >= last, "section '{heading}' out of order");
            last = position;
        }
    }

    #[test]
    fn no_numeric_columns_drop_numeric_sections() {
        let table = Table::new(vec![Column::new(
            "cat",
            ColumnData::Text(vec![Some("x".to_string()), Some("y".to_string())]),
        )])
        .unwrap();
        let report = compose_for(&table);
        assert!(report.contains("## 缺失值概览"));
        assert!(report.contains("## 字段类型推断"));
        assert!(report.contains("- 行数: **2**"));
        assert!(!report.contains("## 数值字段统计摘要"));
        assert!(!report.contains("## 异常值"));
        assert!(!report.contains("Strong Correlation"));
    }

    #[test]
    fn correlation_insight_names_the_strongest_pair() {
        let report = compose_for(&numeric_table());
        assert!(report.contains("【a】与【b】相关系数为 1.000"));
    }

    #[test]
    fn composition_is_deterministic() {
        let table = numeric_table();
        assert_eq!(compose_for(&table), compose_for(&table));
    }

    #[test]
    fn outlier_insights_rank_by_count() {
        let summary = |count: usize, n: usize| OutlierSummary {
            q1: 0.0,
            q3: 1.0,
            iqr: 1.0,
            low: -1.5,
            high: 2.5,
            outlier_count: count,
            outlier_ratio: count as f64 / n as f64,
        };
        let outliers = vec![
            ("few".to_string(), Some(summary(1, 10))),
            ("none".to_string(), None),
            ("many".to_string(), Some(summary(5, 10))),
        ];
        let text = bilingual_insights(&[], &outliers, &None);
        let many = text.find("【many】").unwrap();
        let few = text.find("【few】").unwrap();
        assert!(many < few);
        assert!(!text.contains("【none】"));
    }

    #[test]
    fn format_sig_matches_general_style() {
        assert_eq!(format_sig(-1.5, 3), "-1.5");
        assert_eq!(format_sig(8.5, 3), "8.5");
        assert_eq!(format_sig(0.0, 3), "0");
        assert_eq!(format_sig(123456.0, 3), "1.23e5");
        assert_eq!(format_sig(0.000012, 3), "1.20e-5");
    }

    #[test]
    fn markdown_cells_escape_pipes() {
        assert_eq!(escape_cell("a|b"), "a\\|b");
        assert_eq!(escape_cell("two\nlines"), "two lines");
    }
}
