//! Input arguments and pipeline invocation shared by every reporting command.

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use clap::Args;
use epicload_core::config::ProjectConfig;
use epicload_core::input::{TEAM_MEMBERS_TABLE, WORK_ITEMS_TABLE};
use epicload_core::table::Table;
use epicload_core::{RunOutput, Snapshot, run};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::output::text_rows;

/// Paths of the two input tables.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// WorkItems table (JSON records, split table, or JSONL).
    #[arg(long, value_name = "PATH")]
    pub items: PathBuf,

    /// TeamMembers table (same formats).
    #[arg(long, value_name = "PATH")]
    pub team: PathBuf,
}

impl InputArgs {
    /// Read and decode both tables into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or decoded.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let items = read_table(WORK_ITEMS_TABLE, &self.items)?;
        let team = read_table(TEAM_MEMBERS_TABLE, &self.team)?;
        Ok(Snapshot::new(items, team))
    }
}

fn read_table(name: &str, path: &Path) -> Result<Table> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {name} table from {}", path.display()))?;
    let table = Table::decode(name, &text)?;
    debug!(
        table = name,
        path = %path.display(),
        rows = table.len(),
        columns = table.columns().len(),
        "table loaded"
    );
    Ok(table)
}

/// Settings shared by every command that runs the pipeline.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: ProjectConfig,
    pub today: NaiveDate,
}

impl RunContext {
    /// Load the inputs and run the pipeline once.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs cannot be loaded or the run is rejected.
    pub fn execute(&self, inputs: &InputArgs) -> Result<RunOutput> {
        let snapshot = inputs.snapshot()?;
        Ok(run(&snapshot, &self.config, self.today)?)
    }
}

/// A table in split form, tagged with the snapshot digest and as-of date.
pub fn tagged_table(table: &Table, output: &RunOutput) -> Value {
    let mut value = table.to_split_json();
    if let Value::Object(map) = &mut value {
        map.insert("table".to_string(), Value::String(table.name().to_string()));
        map.insert("digest".to_string(), Value::String(output.digest.to_string()));
        map.insert(
            "as_of".to_string(),
            Value::String(output.today.format("%Y-%m-%d").to_string()),
        );
    }
    value
}

/// Write a table as a header line plus two-space separated rows.
pub fn table_text(table: &Table, w: &mut dyn Write) -> io::Result<()> {
    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell_string).collect())
        .collect();
    text_rows(w, table.columns(), &rows)
}

fn cell_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render an optional date as `YYYY-MM-DD`, or `-` when absent.
pub fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}
