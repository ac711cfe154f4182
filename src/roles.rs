//! Column role inference: datetime, numeric, categorical, or id-like.
//!
//! The decision order is behaviorally significant and must not be reordered:
//! text columns are checked for datetime content first, numeric storage wins
//! over the uniqueness heuristic, and only non-numeric remainders are split
//! into categorical versus id-like by distinct ratio.

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::frame::{Column, Table};

/// Minimum fraction of rows that must parse as a date/time for a text column
/// to be classified as datetime.
pub const DATETIME_PARSE_THRESHOLD: f64 = 0.70;
/// Distinct-value ratio above which a non-numeric column is id-like.
pub const ID_LIKE_DISTINCT_RATIO: f64 = 0.90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Datetime,
    Numeric,
    Categorical,
    IdLike,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Datetime => "datetime",
            Role::Numeric => "numeric",
            Role::Categorical => "categorical",
            Role::IdLike => "id_like",
        }
    }
}

/// Partition of the table's column names into role buckets. Within each
/// bucket, names keep their table column order.
#[derive(Debug, Clone, Default)]
pub struct RoleAssignment {
    pub datetime: Vec<String>,
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub id_like: Vec<String>,
}

impl RoleAssignment {
    /// Buckets in the fixed order used by the report's role listing.
    pub fn buckets(&self) -> [(Role, &[String]); 4] {
        [
            (Role::Datetime, self.datetime.as_slice()),
            (Role::Numeric, self.numeric.as_slice()),
            (Role::Categorical, self.categorical.as_slice()),
            (Role::IdLike, self.id_like.as_slice()),
        ]
    }

    pub fn column_total(&self) -> usize {
        self.datetime.len() + self.numeric.len() + self.categorical.len() + self.id_like.len()
    }
}

/// Classifies every column of the table into exactly one role bucket.
pub fn infer_roles(table: &Table) -> RoleAssignment {
    let mut roles = RoleAssignment::default();
    let row_count = table.row_count();

    for column in table.columns() {
        let role = classify_column(column, row_count);
        debug!("Column '{}' classified as {}", column.name, role.label());
        match role {
            Role::Datetime => roles.datetime.push(column.name.clone()),
            Role::Numeric => roles.numeric.push(column.name.clone()),
            Role::Categorical => roles.categorical.push(column.name.clone()),
            Role::IdLike => roles.id_like.push(column.name.clone()),
        }
    }

    roles
}

fn classify_column(column: &Column, row_count: usize) -> Role {
    if let Some(values) = column.text_values() {
        let parsed = values
            .iter()
            .flatten()
            .filter(|raw| parse_datetime_value(raw).is_some())
            .count();
        // Missing and unparseable cells both count against the fraction.
        let fraction = if row_count == 0 {
            0.0
        } else {
            parsed as f64 / row_count as f64
        };
        if fraction >= DATETIME_PARSE_THRESHOLD {
            return Role::Datetime;
        }
    }

    if column.is_numeric() {
        return Role::Numeric;
    }

    let distinct_ratio = if row_count == 0 {
        0.0
    } else {
        column.distinct_count() as f64 / row_count as f64
    };
    if distinct_ratio > ID_LIKE_DISTINCT_RATIO {
        Role::IdLike
    } else {
        Role::Categorical
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses one cell as a date or timestamp, normalizing bare dates to midnight.
pub fn parse_datetime_value(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }
    None
}
