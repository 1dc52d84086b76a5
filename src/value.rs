//! Loosely-typed cell values and result rows.
//!
//! The engine moves data between caller-defined entities and the SQL
//! execution facility as [`Value`] cells. Conversion into a concrete target
//! kind goes through [`Value::convert`] with a closed set of supported
//! targets — entities never carry conversion logic themselves.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Datetime rendering used when a date value has to travel as text
/// (LIKE parameters, dedup keys, sqlite storage).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Value
// =============================================================================

/// A single cell value: a criteria operand, a bound parameter, or a column
/// read back from the execution facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

/// The closed set of conversion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Integer,
    Real,
    Text,
    DateTime,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Bool => "Bool",
            Kind::Integer => "Integer",
            Kind::Real => "Real",
            Kind::Text => "Text",
            Kind::DateTime => "DateTime",
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert into the given target kind.
    ///
    /// `Null` converts to `Null` for every target. Numeric kinds convert
    /// among each other, text parses into every other kind, and everything
    /// renders into text. Unsupported combinations are a conversion error.
    pub fn convert(self, target: Kind) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let fail = |v: &Value| Error::Conversion {
            value: format!("{v:?}"),
            target: target.name(),
        };
        match target {
            Kind::Bool => match self {
                Value::Bool(_) => Ok(self),
                Value::Integer(i) => Ok(Value::Bool(i != 0)),
                Value::Text(ref s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(fail(&self)),
                },
                ref other => Err(fail(other)),
            },
            Kind::Integer => match self {
                Value::Integer(_) => Ok(self),
                Value::Real(r) => Ok(Value::Integer(r as i64)),
                Value::Bool(b) => Ok(Value::Integer(i64::from(b))),
                Value::Text(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| fail(&self)),
                ref other => Err(fail(other)),
            },
            Kind::Real => match self {
                Value::Real(_) => Ok(self),
                Value::Integer(i) => Ok(Value::Real(i as f64)),
                Value::Text(ref s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| fail(&self)),
                ref other => Err(fail(other)),
            },
            Kind::Text => Ok(Value::Text(self.render())),
            Kind::DateTime => match self {
                Value::DateTime(_) => Ok(self),
                Value::Text(ref s) => parse_datetime(s).map(Value::DateTime).ok_or_else(|| fail(&self)),
                ref other => Err(fail(other)),
            },
        }
    }

    /// Convenience accessor: convert to an integer, `None` when null.
    pub fn as_integer(&self) -> Result<Option<i64>> {
        match self.clone().convert(Kind::Integer)? {
            Value::Integer(i) => Ok(Some(i)),
            _ => Ok(None),
        }
    }

    /// Convenience accessor: convert to a real, `None` when null.
    pub fn as_real(&self) -> Result<Option<f64>> {
        match self.clone().convert(Kind::Real)? {
            Value::Real(r) => Ok(Some(r)),
            _ => Ok(None),
        }
    }

    /// Convenience accessor: convert to text, `None` when null.
    pub fn as_text(&self) -> Result<Option<String>> {
        match self.clone().convert(Kind::Text)? {
            Value::Text(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    /// Convenience accessor: convert to a bool, `None` when null.
    pub fn as_bool(&self) -> Result<Option<bool>> {
        match self.clone().convert(Kind::Bool)? {
            Value::Bool(b) => Ok(Some(b)),
            _ => Ok(None),
        }
    }

    /// Convenience accessor: convert to a datetime, `None` when null.
    pub fn as_datetime(&self) -> Result<Option<NaiveDateTime>> {
        match self.clone().convert(Kind::DateTime)? {
            Value::DateTime(d) => Ok(Some(d)),
            _ => Ok(None),
        }
    }

    /// Render as plain text, used for dedup keys, LIKE parameters and logs.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => r.to_string(),
            Value::Text(s) => s.clone(),
            Value::DateTime(d) => d.format(DATETIME_FORMAT).to_string(),
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Value::from)
    }
}

// =============================================================================
// Row
// =============================================================================

/// One result row: an ordered mapping of column name to value.
///
/// Joined columns arrive keyed `alias.column`, root columns keyed bare.
/// Lookups are case-insensitive, matching how database drivers report
/// column labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.cells.push((column.into(), value));
    }

    /// Case-insensitive column lookup.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<(String, Value)>> for Row {
    fn from(cells: Vec<(String, Value)>) -> Self {
        Self { cells }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}
