//! End-to-end EDA run: load, infer, analyze, chart, report.
//!
//! Single-threaded batch pipeline; each stage consumes the previous stage's
//! output. The input is loaded before any output directory is created so
//! loader failures leave the filesystem untouched, and the report is written
//! last because it references the chart files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;

use crate::{
    charts::{self, ChartOptions},
    loader, outliers, report, roles, stats,
};

/// Configuration for one report run. Chart caps and encoding override are
/// explicit parameters rather than ambient state so runs stay reproducible.
#[derive(Debug, Clone, Default)]
pub struct EdaOptions {
    pub charts: ChartOptions,
    pub input_encoding: Option<String>,
}

/// Runs the whole pipeline and returns the path of the written report.
pub fn run_report(input: &Path, outdir: &Path, options: &EdaOptions) -> Result<PathBuf> {
    let table = loader::load_table(input, options.input_encoding.as_deref())?;

    let images_dir = outdir.join("images");
    fs::create_dir_all(&images_dir)
        .with_context(|| format!("Creating image directory {images_dir:?}"))?;

    let role_assignment = roles::infer_roles(&table);
    info!(
        "Inferred roles: {} datetime, {} numeric, {} categorical, {} id-like",
        role_assignment.datetime.len(),
        role_assignment.numeric.len(),
        role_assignment.categorical.len(),
        role_assignment.id_like.len(),
    );

    let outlier_rows: Vec<_> = role_assignment
        .numeric
        .iter()
        .map(|name| {
            (
                name.clone(),
                table.column(name).and_then(outliers::detect_column),
            )
        })
        .collect();

    let rendered = charts::render_charts(&table, &role_assignment, outdir, &options.charts);
    info!("Rendered {} chart(s)", rendered.len());

    let missing = stats::missingness(&table);
    let profiles = stats::describe(&table, &role_assignment);
    let groups = stats::group_summaries(&table, &role_assignment);
    let correlation = if role_assignment.numeric.len() >= 2 {
        stats::strongest_pair(&stats::correlation_matrix(&table, &role_assignment.numeric))
    } else {
        None
    };

    let document = report::compose(&report::ReportInputs {
        table: &table,
        roles: &role_assignment,
        missing: &missing,
        profiles: &profiles,
        outliers: &outlier_rows,
        groups: &groups,
        charts: &rendered,
        correlation: &correlation,
    });
    let report_path = report::write_atomic(outdir, &document)?;
    info!("Report written to {report_path:?}");
    Ok(report_path)
}
