//! Dataset loading with format dispatch and multi-encoding retry.
//!
//! Supported inputs: `.csv`, `.xlsx`/`.xls`, `.json` (array of records), and
//! `.parquet`. Text formats are decoded by trying a fixed encoding list in
//! order with strict `encoding_rs` decoding; the first clean decode wins.
//! Loader failures are fail-fast: an unsupported extension or an input no
//! configured encoding can decode aborts the run before anything is written.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::{debug, info};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;
use thiserror::Error;

use crate::frame::{Column, ColumnData, Table};

/// Encodings attempted for CSV inputs, in retry order.
pub const CSV_ENCODINGS: &[&str] = &["utf-8", "gbk", "gb2312", "gb18030", "latin-1"];
/// Encodings attempted for JSON inputs, in retry order.
pub const JSON_ENCODINGS: &[&str] = &["utf-8", "gbk"];

/// Cell placeholders treated as missing in text-based formats.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "na", "n/a", "null", "NULL", "NaN", "nan"];

/// Fail-fast loader error classes. Everything else is reported through
/// `anyhow` context chains.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format: .{extension}")]
    UnsupportedExtension { extension: String },
    #[error("Cannot decode {format} file with encodings: {}", encodings.join(", "))]
    Undecodable {
        format: &'static str,
        encodings: Vec<String>,
    },
}

/// Loads a dataset into a [`Table`], dispatching on the file extension.
///
/// `encoding_override` bypasses the retry list for text formats and decodes
/// with the single named encoding instead.
pub fn load_table(path: &Path, encoding_override: Option<&str>) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let table = match extension.as_str() {
        "csv" => load_csv(path, encoding_override)?,
        "xlsx" | "xls" => load_excel(path)?,
        "json" => load_json(path, encoding_override)?,
        "parquet" => load_parquet(path)?,
        _ => return Err(LoadError::UnsupportedExtension { extension }.into()),
    };

    info!("Loaded {table} from {path:?}");
    Ok(table)
}

fn retry_encodings(override_label: Option<&str>, defaults: &[&str]) -> Result<Vec<String>> {
    match override_label {
        Some(label) => {
            Encoding::for_label(label.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{label}'"))?;
            Ok(vec![label.trim().to_string()])
        }
        None => Ok(defaults.iter().map(|s| s.to_string()).collect()),
    }
}

/// Decodes `bytes` with the first encoding in `labels` that produces a clean
/// (error-free) decode.
fn decode_with_retry(bytes: &[u8], labels: &[String], format: &'static str) -> Result<String> {
    for label in labels {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{label}'"))?;
        let (text, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            debug!("Decoded {format} input as {}", encoding.name());
            return Ok(text.into_owned());
        }
    }
    Err(LoadError::Undecodable {
        format,
        encodings: labels.to_vec(),
    }
    .into())
}

fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

fn load_csv(path: &Path, encoding_override: Option<&str>) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Reading input file {path:?}"))?;
    let labels = retry_encodings(encoding_override, CSV_ENCODINGS)?;
    let text = decode_with_retry(&bytes, &labels, "CSV")?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .with_context(|| format!("Reading headers from {path:?}"))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        for (col_idx, raw) in record.iter().enumerate() {
            if col_idx < cells.len() {
                let value = (!is_missing_marker(raw)).then(|| raw.to_string());
                cells[col_idx].push(value);
            }
        }
    }

    build_text_columns(&headers, cells)
}

fn load_excel(path: &Path) -> Result<Table> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("No worksheet found in {path:?}"))?
        .with_context(|| format!("Reading first worksheet of {path:?}"))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(row) => row
            .iter()
            .enumerate()
            .map(|(idx, cell)| match excel_cell_to_string(cell) {
                Some(name) => name,
                None => format!("column_{}", idx + 1),
            })
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for col_idx in 0..headers.len() {
            let value = row.get(col_idx).and_then(excel_cell_to_string);
            cells[col_idx].push(value.filter(|v| !is_missing_marker(v)));
        }
    }

    build_text_columns(&headers, cells)
}

fn excel_cell_to_string(cell: &Data) -> Option<String> {
    use calamine::DataType as _;
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(crate::frame::format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn load_json(path: &Path, encoding_override: Option<&str>) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Reading input file {path:?}"))?;
    let labels = retry_encodings(encoding_override, JSON_ENCODINGS)?;
    let text = decode_with_retry(&bytes, &labels, "JSON")?;

    let document: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Parsing JSON in {path:?}"))?;
    let records = document
        .as_array()
        .ok_or_else(|| anyhow!("JSON input must be an array of record objects"))?;

    // Column order is first-seen across records.
    let mut names: Vec<String> = Vec::new();
    for record in records {
        if let Some(object) = record.as_object() {
            for key in object.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
    }

    let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); names.len()];
    for record in records {
        let object = record
            .as_object()
            .ok_or_else(|| anyhow!("JSON input must be an array of record objects"))?;
        for (col_idx, name) in names.iter().enumerate() {
            cells[col_idx].push(json_cell(object.get(name)));
        }
    }

    build_typed_columns(&names, cells)
}

fn json_cell(value: Option<&serde_json::Value>) -> RawCell {
    match value {
        None => RawCell::Missing,
        Some(serde_json::Value::Null) => RawCell::Missing,
        Some(serde_json::Value::Bool(b)) => RawCell::Bool(*b),
        Some(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => RawCell::Int(i),
            None => n.as_f64().map_or(RawCell::Missing, float_cell),
        },
        Some(serde_json::Value::String(s)) => {
            if is_missing_marker(s) {
                RawCell::Missing
            } else {
                RawCell::Text(s.clone())
            }
        }
        Some(other) => RawCell::Text(other.to_string()),
    }
}

fn load_parquet(path: &Path) -> Result<Table> {
    let file = fs::File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let reader =
        SerializedFileReader::new(file).with_context(|| format!("Reading parquet {path:?}"))?;
    let names = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect::<Vec<_>>();

    let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); names.len()];
    let rows = reader
        .get_row_iter(None)
        .with_context(|| format!("Iterating parquet rows in {path:?}"))?;
    for (row_idx, row) in rows.enumerate() {
        let row = row.with_context(|| format!("Reading parquet row {}", row_idx + 1))?;
        for (col_idx, (_, field)) in row.get_column_iter().enumerate() {
            if col_idx < cells.len() {
                cells[col_idx].push(parquet_cell(field));
            }
        }
    }

    build_typed_columns(&names, cells)
}

fn parquet_cell(field: &Field) -> RawCell {
    match field {
        Field::Null => RawCell::Missing,
        Field::Bool(b) => RawCell::Bool(*b),
        Field::Byte(v) => RawCell::Int(*v as i64),
        Field::Short(v) => RawCell::Int(*v as i64),
        Field::Int(v) => RawCell::Int(*v as i64),
        Field::Long(v) => RawCell::Int(*v),
        Field::UByte(v) => RawCell::Int(*v as i64),
        Field::UShort(v) => RawCell::Int(*v as i64),
        Field::UInt(v) => RawCell::Int(*v as i64),
        Field::ULong(v) => RawCell::Int(*v as i64),
        Field::Float(v) => float_cell(*v as f64),
        Field::Double(v) => float_cell(*v),
        Field::Str(s) => {
            if is_missing_marker(s) {
                RawCell::Missing
            } else {
                RawCell::Text(s.clone())
            }
        }
        Field::Bytes(bytes) => RawCell::Text(String::from_utf8_lossy(bytes.data()).into_owned()),
        other => RawCell::Text(other.to_json_value().to_string()),
    }
}

/// NaN and infinities count as missing, matching how the text formats treat
/// their "NaN" placeholder, so aggregates downstream stay finite.
fn float_cell(value: f64) -> RawCell {
    if value.is_finite() {
        RawCell::Float(value)
    } else {
        RawCell::Missing
    }
}

/// Intermediate cell used by sources that carry their own type information.
#[derive(Debug, Clone)]
enum RawCell {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl RawCell {
    fn display(&self) -> Option<String> {
        match self {
            RawCell::Missing => None,
            RawCell::Int(i) => Some(i.to_string()),
            RawCell::Float(f) => Some(f.to_string()),
            RawCell::Bool(b) => Some(b.to_string()),
            RawCell::Text(s) => Some(s.clone()),
        }
    }
}

/// Narrows typed cells to a single column storage type. A column with any
/// text cell becomes text; int mixed with float widens to float; a column
/// with no observed values defaults to float (all-missing numeric).
fn build_typed_columns(names: &[String], cells: Vec<Vec<RawCell>>) -> Result<Table> {
    let mut columns = Vec::with_capacity(names.len());
    for (name, column_cells) in names.iter().zip(cells) {
        let mut has_text = false;
        let mut has_float = false;
        let mut has_int = false;
        let mut has_bool = false;
        for cell in &column_cells {
            match cell {
                RawCell::Missing => {}
                RawCell::Int(_) => has_int = true,
                RawCell::Float(_) => has_float = true,
                RawCell::Bool(_) => has_bool = true,
                RawCell::Text(_) => has_text = true,
            }
        }

        let data = if has_text || (has_bool && (has_int || has_float)) {
            ColumnData::Text(column_cells.iter().map(RawCell::display).collect())
        } else if has_bool {
            ColumnData::Bool(
                column_cells
                    .iter()
                    .map(|cell| match cell {
                        RawCell::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect(),
            )
        } else if has_float || !has_int {
            ColumnData::Float(
                column_cells
                    .iter()
                    .map(|cell| match cell {
                        RawCell::Int(i) => Some(*i as f64),
                        RawCell::Float(f) => Some(*f),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            ColumnData::Int(
                column_cells
                    .iter()
                    .map(|cell| match cell {
                        RawCell::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect(),
            )
        };
        columns.push(Column::new(name.clone(), data));
    }
    Table::new(columns)
}

/// Infers one storage type per column from string cells: integer when every
/// observed value parses as `i64`, then float, then boolean literal, else
/// text. Columns with no observed values default to float.
fn build_text_columns(names: &[String], cells: Vec<Vec<Option<String>>>) -> Result<Table> {
    let mut columns = Vec::with_capacity(names.len());
    for (name, column_cells) in names.iter().zip(cells) {
        let observed: Vec<&str> = column_cells
            .iter()
            .flatten()
            .map(|s| s.trim())
            .collect();

        let data = if observed.is_empty() {
            ColumnData::Float(vec![None; column_cells.len()])
        } else if observed.iter().all(|v| v.parse::<i64>().is_ok()) {
            ColumnData::Int(
                column_cells
                    .iter()
                    .map(|cell| cell.as_ref().and_then(|v| v.trim().parse::<i64>().ok()))
                    .collect(),
            )
        } else if observed.iter().all(|v| v.parse::<f64>().is_ok()) {
            ColumnData::Float(
                column_cells
                    .iter()
                    .map(|cell| cell.as_ref().and_then(|v| v.trim().parse::<f64>().ok()))
                    .collect(),
            )
        } else if observed.iter().all(|v| parse_bool_literal(v).is_some()) {
            ColumnData::Bool(
                column_cells
                    .iter()
                    .map(|cell| cell.as_ref().and_then(|v| parse_bool_literal(v.trim())))
                    .collect(),
            )
        } else {
            ColumnData::Text(column_cells)
        };
        columns.push(Column::new(name.clone(), data));
    }
    Table::new(columns)
}

fn parse_bool_literal(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
