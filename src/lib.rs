pub mod charts;
pub mod cli;
pub mod fonts;
pub mod frame;
pub mod inspect;
pub mod loader;
pub mod outliers;
pub mod pipeline;
pub mod report;
pub mod roles;
pub mod stats;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("auto_eda", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Report(args) => handle_report(&args),
        Commands::Inspect(args) => inspect::execute(&args),
    }
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    info!(
        "Analyzing '{}' into '{}'",
        args.input.display(),
        args.outdir.display()
    );
    let options = pipeline::EdaOptions {
        charts: charts::ChartOptions {
            max_numeric_hists: args.max_numeric_hists,
            max_cat_bars: args.max_cat_bars,
        },
        input_encoding: args.input_encoding.clone(),
    };
    let report_path = pipeline::run_report(&args.input, &args.outdir, &options)?;
    println!("{}", report_path.display());
    Ok(())
}
