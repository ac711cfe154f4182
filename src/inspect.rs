//! Quick dataset inspection on stdout: shape, column types, a head sample,
//! missing counts, and basic numeric statistics.

use anyhow::Result;
use log::info;

use crate::{cli::InspectArgs, frame::format_float, loader, table};

pub fn execute(args: &InspectArgs) -> Result<()> {
    let data = loader::load_table(&args.input, args.input_encoding.as_deref())?;
    println!("Shape: {data}");

    println!("\nColumn types:");
    let type_rows: Vec<Vec<String>> = data
        .columns()
        .iter()
        .map(|column| vec![column.name.clone(), column.data.type_name().to_string()])
        .collect();
    table::print_table(&["column".to_string(), "type".to_string()], &type_rows);

    let preview_rows = args.rows.min(data.row_count());
    if preview_rows > 0 {
        println!("\nFirst {preview_rows} row(s):");
        let headers: Vec<String> = data.columns().iter().map(|c| c.name.clone()).collect();
        let rows: Vec<Vec<String>> = (0..preview_rows)
            .map(|row| {
                data.columns()
                    .iter()
                    .map(|column| column.display_value(row))
                    .collect()
            })
            .collect();
        table::print_table(&headers, &rows);
    }

    println!("\nMissing values:");
    let missing_rows: Vec<Vec<String>> = data
        .columns()
        .iter()
        .map(|column| vec![column.name.clone(), column.missing_count().to_string()])
        .collect();
    table::print_table(&["column".to_string(), "missing".to_string()], &missing_rows);

    let numeric_rows: Vec<Vec<String>> = data
        .columns()
        .iter()
        .filter_map(|column| {
            let values = column.numeric_observations()?;
            if values.is_empty() {
                return Some(vec![
                    column.name.clone(),
                    "0".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                ]);
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Some(vec![
                column.name.clone(),
                values.len().to_string(),
                format_float(mean),
                format_float(min),
                format_float(max),
            ])
        })
        .collect();
    if !numeric_rows.is_empty() {
        println!("\nBasic statistics:");
        table::print_table(
            &[
                "column".to_string(),
                "count".to_string(),
                "mean".to_string(),
                "min".to_string(),
                "max".to_string(),
            ],
            &numeric_rows,
        );
    }

    info!("Inspected {:?}", args.input);
    Ok(())
}
