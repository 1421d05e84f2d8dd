//! Typed views over the two input tables.
//!
//! Column validation happens here and is all-or-nothing: if any required
//! column is missing the run is rejected with the full list, before a single
//! row is interpreted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{ColumnConfig, TeamConfig};
use crate::error::EngineError;
use crate::model::{Hierarchy, TeamMember, WorkItem};
use crate::table::{Cell, Table, cell_text, is_blank_row};

/// Canonical name of the work item table in errors and logs.
pub const WORK_ITEMS_TABLE: &str = "WorkItems";
/// Canonical name of the roster table in errors and logs.
pub const TEAM_MEMBERS_TABLE: &str = "TeamMembers";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%b/%y", "%d/%b/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%b/%y %I:%M %p",
];

struct ColumnIndexes {
    hierarchy: usize,
    title: usize,
    parent: usize,
    assignee: usize,
    start_date: usize,
    due_date: usize,
    key: Option<(usize, String)>,
}

/// Interpret the WorkItems table.
///
/// Fully blank rows are skipped. `null` parents become the empty string
/// (root). Row numbers in errors are 1-based data rows.
///
/// # Errors
///
/// - [`EngineError::MissingColumns`] if any configured column is absent.
/// - [`EngineError::InvalidCell`] for non-scalar cells or a missing title.
/// - [`EngineError::InvalidDate`] for unparseable dates.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn work_items(
    table: &Table,
    columns: &ColumnConfig,
    epic_level: &str,
) -> Result<Vec<WorkItem>, EngineError> {
    table.require_columns(&columns.required())?;
    if table.columns().is_empty() {
        return Ok(Vec::new());
    }

    let idx = resolve_indexes(table, columns)?;
    let mut items = Vec::with_capacity(table.len());

    for (offset, cells) in table.rows().iter().enumerate() {
        if is_blank_row(cells) {
            continue;
        }
        let row = offset + 1;
        let reader = RowReader { table, row, cells };

        let Some(title) = reader.text(idx.title, &columns.title)? else {
            return Err(EngineError::InvalidCell {
                table: table.name().to_string(),
                row,
                column: columns.title.clone(),
                expected: "a non-empty title",
            });
        };

        let hierarchy = reader
            .text(idx.hierarchy, &columns.hierarchy)?
            .map_or_else(
                || Hierarchy::Other(String::new()),
                |raw| Hierarchy::classify(&raw, epic_level),
            );

        let key = match &idx.key {
            Some((key_idx, key_column)) => reader.text(*key_idx, key_column)?,
            None => None,
        };

        items.push(WorkItem {
            row,
            key,
            title,
            hierarchy,
            parent: reader.text(idx.parent, &columns.parent)?.unwrap_or_default(),
            assignee: reader.text(idx.assignee, &columns.assignee)?,
            start_date: reader.date(idx.start_date, &columns.start_date)?,
            due_date: reader.date(idx.due_date, &columns.due_date)?,
        });
    }

    debug!(items = items.len(), "work items loaded");
    Ok(items)
}

/// Interpret the TeamMembers table.
///
/// Blank names are dropped and duplicates collapse onto their first
/// occurrence, so the roster is an ordered set.
///
/// # Errors
///
/// - [`EngineError::MissingColumns`] if the name column is absent.
/// - [`EngineError::InvalidCell`] for non-scalar name cells.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn team_members(table: &Table, team: &TeamConfig) -> Result<Vec<TeamMember>, EngineError> {
    table.require_columns(&[team.name.as_str()])?;
    let Some(name_idx) = table.column_index(&team.name) else {
        return Ok(Vec::new());
    };

    let mut roster: Vec<TeamMember> = Vec::new();
    for (offset, cells) in table.rows().iter().enumerate() {
        let reader = RowReader {
            table,
            row: offset + 1,
            cells,
        };
        if let Some(name) = reader.text(name_idx, &team.name)? {
            if roster.iter().any(|member| member.name == name) {
                debug!(%name, "duplicate roster entry collapsed");
                continue;
            }
            roster.push(TeamMember { name });
        }
    }

    Ok(roster)
}

/// Parse a date cell.
///
/// Accepts ISO dates, common spreadsheet/tracker timestamp spellings,
/// RFC 3339, and integer epoch milliseconds (the default date encoding of
/// pandas JSON exports). Blank cells are `Ok(None)`; anything else that does
/// not parse is `Err(())`.
#[allow(clippy::result_unit_err)]
pub fn parse_date(cell: &Cell) -> Result<Option<NaiveDate>, ()> {
    match cell {
        Value::Null => Ok(None),
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            parse_date_text(raw).map(Some).ok_or(())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| Some(dt.date_naive()))
            .ok_or(()),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Err(()),
    }
}

fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn resolve_indexes(table: &Table, columns: &ColumnConfig) -> Result<ColumnIndexes, EngineError> {
    let index = |column: &str| {
        table
            .column_index(column)
            .ok_or_else(|| EngineError::MissingColumns {
                table: table.name().to_string(),
                missing: vec![column.to_string()],
            })
    };

    Ok(ColumnIndexes {
        hierarchy: index(&columns.hierarchy)?,
        title: index(&columns.title)?,
        parent: index(&columns.parent)?,
        assignee: index(&columns.assignee)?,
        start_date: index(&columns.start_date)?,
        due_date: index(&columns.due_date)?,
        key: columns
            .keys
            .iter()
            .find_map(|key| table.column_index(key).map(|idx| (idx, key.clone()))),
    })
}

struct RowReader<'a> {
    table: &'a Table,
    row: usize,
    cells: &'a [Cell],
}

impl RowReader<'_> {
    fn text(&self, idx: usize, column: &str) -> Result<Option<String>, EngineError> {
        cell_text(&self.cells[idx]).map_err(|expected| EngineError::InvalidCell {
            table: self.table.name().to_string(),
            row: self.row,
            column: column.to_string(),
            expected,
        })
    }

    fn date(&self, idx: usize, column: &str) -> Result<Option<NaiveDate>, EngineError> {
        let cell = &self.cells[idx];
        parse_date(cell).map_err(|()| EngineError::InvalidDate {
            table: self.table.name().to_string(),
            row: self.row,
            column: column.to_string(),
            value: match cell {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
    }
}
