//! Column-ordered tables exchanged with the outside world.
//!
//! The engine never reads spreadsheets itself. Callers hand it tables that
//! were exported as JSON in one of three shapes:
//!
//! - **records**: `[{"Title": "E1", ...}, ...]`
//! - **split**: `{"columns": ["Title", ...], "data": [["E1", ...], ...]}`
//! - **JSONL**: one record object per line
//!
//! Records and split are what `pandas.DataFrame.to_json(orient=...)` emits,
//! so exports from existing tooling can be fed in unchanged. Output tables
//! are always written in split form because it preserves column order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// A single table cell.
pub type Cell = Value;

/// An ordered set of named columns plus rows of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

#[derive(Serialize, Deserialize)]
struct SplitForm {
    columns: Vec<String>,
    data: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given columns.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from record objects.
    ///
    /// Columns are the union of record keys in first-seen order; absent keys
    /// become `null` cells.
    #[must_use]
    pub fn from_records(name: impl Into<String>, records: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Self::new(name, columns);
        for mut record in records {
            let row = table
                .columns
                .iter()
                .map(|column| record.remove(column).unwrap_or(Value::Null))
                .collect();
            table.rows.push(row);
        }
        table
    }

    /// Decode a table from JSON text in records, split, or JSONL form.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedTable`] if the text matches none of
    /// the accepted shapes.
    pub fn decode(name: impl Into<String>, text: &str) -> Result<Self, EngineError> {
        let name = name.into();
        let malformed = |reason: String| EngineError::MalformedTable {
            table: name.clone(),
            reason,
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(name.clone(), Vec::new()));
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(values)) => {
                let records = values
                    .into_iter()
                    .enumerate()
                    .map(|(idx, value)| match value {
                        Value::Object(map) => Ok(map),
                        other => Err(malformed(format!(
                            "record {} is {}, expected an object",
                            idx + 1,
                            json_kind(&other)
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::from_records(name.clone(), records))
            }
            Ok(Value::Object(map)) if map.contains_key("columns") && map.contains_key("data") => {
                let split: SplitForm = serde_json::from_value(Value::Object(map))
                    .map_err(|err| malformed(format!("invalid split table: {err}")))?;
                let mut table = Self::new(name.clone(), split.columns);
                for (idx, row) in split.data.into_iter().enumerate() {
                    if row.len() != table.columns.len() {
                        return Err(malformed(format!(
                            "row {} has {} cells, expected {}",
                            idx + 1,
                            row.len(),
                            table.columns.len()
                        )));
                    }
                    table.rows.push(row);
                }
                Ok(table)
            }
            Ok(Value::Object(map)) => Ok(Self::from_records(name.clone(), vec![map])),
            Ok(other) => Err(malformed(format!(
                "top-level value is {}, expected an array or object",
                json_kind(&other)
            ))),
            Err(_) => {
                let mut records = Vec::new();
                for (line_no, line) in trimmed.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record = serde_json::from_str::<Map<String, Value>>(line).map_err(|err| {
                        malformed(format!("line {}: {err}", line_no + 1))
                    })?;
                    records.push(record);
                }
                Ok(Self::from_records(name.clone(), records))
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Append a row, padding with `null` or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Required columns absent from this table, in the order requested.
    #[must_use]
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|column| self.column_index(column).is_none())
            .map(|column| (*column).to_string())
            .collect()
    }

    /// Reject the table when any required column is absent.
    ///
    /// A table with neither rows nor columns (an empty records export) is
    /// accepted: there is nothing to validate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingColumns`] listing every absent column.
    pub fn require_columns(&self, required: &[&str]) -> Result<(), EngineError> {
        if self.columns.is_empty() && self.rows.is_empty() {
            return Ok(());
        }

        let missing = self.missing_columns(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EngineError::MissingColumns {
                table: self.name.clone(),
                missing,
            })
        }
    }

    /// Serialize in split form, preserving column order.
    #[must_use]
    pub fn to_split_json(&self) -> Value {
        serde_json::json!({
            "columns": self.columns,
            "data": self.rows,
        })
    }

    /// Serialize as record objects.
    #[must_use]
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }
}

/// True when every cell of the row is null or blank text.
#[must_use]
pub fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(|cell| match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

/// Interpret a cell as optional text.
///
/// `null` and whitespace-only strings are absent. Numbers and booleans are
/// rendered with their JSON spelling, since spreadsheet exports often type
/// numeric titles or names as numbers.
///
/// # Errors
///
/// Returns the expected-shape description when the cell is an array or
/// object.
pub fn cell_text(cell: &Cell) -> Result<Option<String>, &'static str> {
    match cell {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err("text"),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
