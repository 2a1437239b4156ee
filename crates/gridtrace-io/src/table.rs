//! Untyped tables and the column map resolved once per table.

use gridtrace_core::{TopologyError, TopologyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Interpret a raw text cell the way a CSV export of a database writes it
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            Value::Null
        } else if let Ok(i) = trimmed.parse::<i64>() {
            Value::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            Value::Real(f)
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Key form used for ids: integers print without a fractional part
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.trim().to_string()),
            other => other.as_i64().map(|i| i.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Rows of one table with their column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Column name to position map for one table.
///
/// Built once before the rows are decoded and passed to each [`Row`], so no
/// per-row name lookups touch shared state.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    table: String,
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    /// Resolve column positions, failing when a required column is absent
    pub fn resolve(table: &Table, required: &[&str]) -> TopologyResult<Self> {
        let positions: HashMap<String, usize> = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        if let Some(missing) = required.iter().find(|c| !positions.contains_key(**c)) {
            return Err(TopologyError::missing_field(&table.name, *missing));
        }
        Ok(Self {
            table: table.name.clone(),
            positions,
        })
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn row<'a>(&'a self, values: &'a [Value]) -> Row<'a> {
        Row { map: self, values }
    }
}

/// One row viewed through its table's column map
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    map: &'a ColumnMap,
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Cell of a column; `None` when the column does not exist or the row is short
    pub fn value(&self, column: &str) -> Option<&'a Value> {
        self.map.position(column).and_then(|idx| self.values.get(idx))
    }

    fn required(&self, column: &str) -> TopologyResult<&'a Value> {
        match self.value(column) {
            Some(v) if !v.is_null() => Ok(v),
            Some(_) => Err(TopologyError::invalid_value(
                format!("{}.{}", self.map.table(), column),
                "empty",
            )),
            None => Err(TopologyError::missing_field(self.map.table(), column)),
        }
    }

    pub fn key(&self, column: &str) -> TopologyResult<String> {
        let value = self.required(column)?;
        value.as_key().ok_or_else(|| {
            TopologyError::invalid_value(format!("{}.{}", self.map.table(), column), "not a key")
        })
    }

    pub fn opt_key(&self, column: &str) -> Option<String> {
        self.value(column).and_then(Value::as_key)
    }

    pub fn f64(&self, column: &str) -> TopologyResult<f64> {
        let value = self.required(column)?;
        value.as_f64().ok_or_else(|| {
            TopologyError::invalid_value(
                format!("{}.{}", self.map.table(), column),
                format!("{value:?} is not a number"),
            )
        })
    }

    pub fn opt_f64(&self, column: &str) -> Option<f64> {
        self.value(column).and_then(Value::as_f64)
    }

    pub fn i64(&self, column: &str) -> TopologyResult<i64> {
        let value = self.required(column)?;
        value.as_i64().ok_or_else(|| {
            TopologyError::invalid_value(
                format!("{}.{}", self.map.table(), column),
                format!("{value:?} is not an integer"),
            )
        })
    }

    pub fn opt_i64(&self, column: &str) -> Option<i64> {
        self.value(column).and_then(Value::as_i64)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.value(column)? {
            Value::Text(s) => Some(s.clone()),
            Value::Null => None,
            other => other.as_key(),
        }
    }

    /// `column == 1`, or `default` when the column is absent or empty
    pub fn flag(&self, column: &str, default: bool) -> bool {
        self.opt_i64(column).map_or(default, |v| v == 1)
    }
}
