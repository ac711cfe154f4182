use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Automated exploratory data analysis", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full EDA pipeline and write a markdown report with charts
    Report(ReportArgs),
    /// Print a quick dataset summary (shape, types, head, missing values)
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Input dataset (.csv, .xlsx, .xls, .json, .parquet)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output directory for report.md and the images subdirectory
    #[arg(short = 'o', long = "outdir", default_value = "eda_output")]
    pub outdir: PathBuf,
    /// Maximum number of numeric columns rendered as histograms
    #[arg(long = "max-numeric-hists", default_value_t = 6)]
    pub max_numeric_hists: usize,
    /// Maximum number of categorical columns rendered as bar charts
    #[arg(long = "max-cat-bars", default_value_t = 4)]
    pub max_cat_bars: usize,
    /// Character encoding for text inputs (bypasses the retry list)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Input dataset (.csv, .xlsx, .xls, .json, .parquet)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display in the head sample
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    /// Character encoding for text inputs (bypasses the retry list)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}
