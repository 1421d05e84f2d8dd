//! Output tables and the per-user detail view.
//!
//! The UserLoad table has a fixed prefix (`Assignee`, `NumberOfProjects`)
//! followed by one column per projected week, keyed by the ISO date of the
//! week's Monday. Cells in week columns are the labels `Free` or `Busy`.
//! Re-importing an exported table keeps those labels as text.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::availability::UserLoad;
use crate::error::EngineError;
use crate::model::Hierarchy;
use crate::pipeline::RunOutput;
use crate::table::{Table, cell_text};

pub const USER_LOAD_TABLE: &str = "UserLoad";
pub const ASSIGNEE_COLUMN: &str = "Assignee";
pub const PROJECTS_COLUMN: &str = "NumberOfProjects";

const FIXED_COLUMNS: [&str; 2] = [ASSIGNEE_COLUMN, PROJECTS_COLUMN];

/// One exported row of the UserLoad table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLoadRow {
    pub assignee: String,
    pub number_of_projects: usize,
    /// Labels aligned with [`UserLoadTable::weeks`].
    pub weekly: Vec<String>,
}

/// The UserLoad output table in a typed, order-preserving form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserLoadTable {
    /// Week column headers, in column order.
    pub weeks: Vec<String>,
    pub rows: Vec<UserLoadRow>,
}

impl UserLoadTable {
    /// Build from projected loads over `weeks`.
    #[must_use]
    pub fn from_loads(weeks: &[NaiveDate], loads: &[UserLoad]) -> Self {
        let rows = loads
            .iter()
            .map(|load| UserLoadRow {
                assignee: load.assignee.clone(),
                number_of_projects: load.number_of_projects,
                weekly: weeks
                    .iter()
                    .map(|week| {
                        load.weekly
                            .get(week)
                            .map_or_else(String::new, ToString::to_string)
                    })
                    .collect(),
            })
            .collect();

        Self {
            weeks: weeks.iter().map(|week| week.format("%Y-%m-%d").to_string()).collect(),
            rows,
        }
    }

    #[must_use]
    pub fn to_table(&self) -> Table {
        let columns = FIXED_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(self.weeks.iter().cloned())
            .collect();

        let mut table = Table::new(USER_LOAD_TABLE, columns);
        for row in &self.rows {
            let mut cells = vec![
                Value::String(row.assignee.clone()),
                Value::from(row.number_of_projects),
            ];
            cells.extend(row.weekly.iter().cloned().map(Value::String));
            table.push_row(cells);
        }
        table
    }

    /// Re-import an exported UserLoad table.
    ///
    /// Every column after the fixed prefix is a week column. Week labels are
    /// kept verbatim; `NumberOfProjects` accepts integers or integer text.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingColumns`] without `Assignee`/`NumberOfProjects`.
    /// - [`EngineError::InvalidCell`] for a missing assignee, a count that is
    ///   not a non-negative integer, or a non-text week label.
    pub fn from_table(table: &Table) -> Result<Self, EngineError> {
        table.require_columns(&FIXED_COLUMNS)?;
        let (Some(assignee_idx), Some(count_idx)) = (
            table.column_index(ASSIGNEE_COLUMN),
            table.column_index(PROJECTS_COLUMN),
        ) else {
            return Ok(Self::default());
        };

        let week_indexes: Vec<usize> = (0..table.columns().len())
            .filter(|idx| *idx != assignee_idx && *idx != count_idx)
            .collect();
        let weeks = week_indexes
            .iter()
            .map(|idx| table.columns()[*idx].clone())
            .collect();

        let invalid = |row: usize, column: &str, expected: &'static str| EngineError::InvalidCell {
            table: table.name().to_string(),
            row,
            column: column.to_string(),
            expected,
        };

        let mut rows = Vec::with_capacity(table.len());
        for (offset, cells) in table.rows().iter().enumerate() {
            let row = offset + 1;
            let assignee = cell_text(&cells[assignee_idx])
                .ok()
                .flatten()
                .ok_or_else(|| invalid(row, ASSIGNEE_COLUMN, "a non-empty name"))?;
            let number_of_projects = project_count(&cells[count_idx])
                .ok_or_else(|| invalid(row, PROJECTS_COLUMN, "a non-negative integer"))?;

            let mut weekly = Vec::with_capacity(week_indexes.len());
            for idx in &week_indexes {
                let label = cell_text(&cells[*idx])
                    .map_err(|expected| invalid(row, &table.columns()[*idx], expected))?;
                weekly.push(label.unwrap_or_default());
            }

            rows.push(UserLoadRow {
                assignee,
                number_of_projects,
                weekly,
            });
        }

        Ok(Self { weeks, rows })
    }
}

fn project_count(cell: &Value) -> Option<usize> {
    match cell {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// One assigned item in a user's detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentDetail {
    pub key: Option<String>,
    pub hierarchy: Hierarchy,
    pub title: String,
    pub epic_title: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Everything assigned to one user, plus their projected free date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetail {
    pub user: String,
    pub number_of_projects: usize,
    pub free_date: Option<NaiveDate>,
    pub assignments: Vec<AssignmentDetail>,
}

impl UserDetail {
    /// Tabular form; the `Key` column appears only when some row has a key.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let with_key = self.assignments.iter().any(|a| a.key.is_some());
        let mut columns: Vec<String> = Vec::with_capacity(6);
        if with_key {
            columns.push("Key".to_string());
        }
        columns.extend(
            ["Hierarchy", "Title", "EpicTitle", "StartDate", "DueDate"]
                .iter()
                .map(|c| (*c).to_string()),
        );

        let text = |value: Option<String>| value.map_or(Value::Null, Value::String);
        let day = |value: Option<NaiveDate>| text(value.map(|d| d.format("%Y-%m-%d").to_string()));

        let mut table = Table::new(self.user.clone(), columns);
        for assignment in &self.assignments {
            let mut cells = Vec::with_capacity(6);
            if with_key {
                cells.push(text(assignment.key.clone()));
            }
            cells.push(Value::String(assignment.hierarchy.to_string()));
            cells.push(Value::String(assignment.title.clone()));
            cells.push(text(assignment.epic_title.clone()));
            cells.push(day(assignment.start_date));
            cells.push(day(assignment.due_date));
            table.push_row(cells);
        }
        table
    }
}

/// Detail view for `user`, or `None` when they are not in the load table.
#[must_use]
pub fn assignments_for(output: &RunOutput, user: &str) -> Option<UserDetail> {
    let load = output.load_of(user)?;
    let matching = output.workload.matching;

    let assignments = output
        .annotated
        .iter()
        .filter(|entry| {
            entry
                .item
                .assignee
                .as_deref()
                .is_some_and(|assignee| matching.same(assignee, user))
        })
        .map(|entry| AssignmentDetail {
            key: entry.item.key.clone(),
            hierarchy: entry.item.hierarchy.clone(),
            title: entry.item.title.clone(),
            epic_title: entry.epic_title.clone(),
            start_date: entry.item.start_date,
            due_date: entry.item.due_date,
        })
        .collect();

    Some(UserDetail {
        user: load.assignee.clone(),
        number_of_projects: load.number_of_projects,
        free_date: load.free_date,
        assignments,
    })
}
