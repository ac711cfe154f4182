//! In-memory table model shared by every pipeline stage.
//!
//! A [`Table`] is an ordered set of named columns; each column stores values
//! of one declared type with per-row missing markers. All columns must share
//! the same row count, which [`Table::new`] enforces once at construction so
//! downstream stages never have to re-check alignment.

use std::collections::HashSet;
use std::fmt;

use anyhow::{Result, anyhow};

/// Typed column storage. Missing values are `None` in every variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(values) => values.len(),
            ColumnData::Float(values) => values.len(),
            ColumnData::Bool(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Int(_) => "integer",
            ColumnData::Float(_) => "float",
            ColumnData::Bool(_) => "boolean",
            ColumnData::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the declared storage type is numeric (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Int(_) | ColumnData::Float(_))
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Int(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Float(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Bool(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnData::Text(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Count of distinct non-missing values.
    pub fn distinct_count(&self) -> usize {
        match &self.data {
            ColumnData::Int(values) => values.iter().flatten().collect::<HashSet<_>>().len(),
            ColumnData::Float(values) => values
                .iter()
                .flatten()
                .map(|v| v.to_bits())
                .collect::<HashSet<_>>()
                .len(),
            ColumnData::Bool(values) => values.iter().flatten().collect::<HashSet<_>>().len(),
            ColumnData::Text(values) => values.iter().flatten().collect::<HashSet<_>>().len(),
        }
    }

    /// Per-row numeric view for `Int`/`Float` columns, `None` otherwise.
    pub fn numeric_values(&self) -> Option<Vec<Option<f64>>> {
        match &self.data {
            ColumnData::Int(values) => {
                Some(values.iter().map(|v| v.map(|i| i as f64)).collect())
            }
            ColumnData::Float(values) => Some(values.clone()),
            _ => None,
        }
    }

    /// Non-missing numeric values in row order for `Int`/`Float` columns.
    pub fn numeric_observations(&self) -> Option<Vec<f64>> {
        self.numeric_values()
            .map(|values| values.into_iter().flatten().collect())
    }

    pub fn text_values(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Text(values) => Some(values),
            _ => None,
        }
    }

    /// Displayable cell value for preview output; empty string when missing.
    pub fn display_value(&self, row: usize) -> String {
        match &self.data {
            ColumnData::Int(values) => values
                .get(row)
                .and_then(|v| v.map(|i| i.to_string()))
                .unwrap_or_default(),
            ColumnData::Float(values) => values
                .get(row)
                .and_then(|v| v.map(format_float))
                .unwrap_or_default(),
            ColumnData::Bool(values) => values
                .get(row)
                .and_then(|v| v.map(|b| b.to_string()))
                .unwrap_or_default(),
            ColumnData::Text(values) => values
                .get(row)
                .and_then(|v| v.clone())
                .unwrap_or_default(),
        }
    }
}

/// Ordered collection of equally sized columns.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            for column in &columns {
                if column.len() != expected {
                    return Err(anyhow!(
                        "Column '{}' has {} row(s) but '{}' has {}",
                        column.name,
                        column.len(),
                        first.name,
                        expected
                    ));
                }
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} row(s) x {} column(s)",
            self.row_count(),
            self.column_count()
        )
    }
}

pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}
