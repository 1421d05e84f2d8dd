use anyhow::{Context as _, Result, bail};
use clap::Args;
use epicload_core::export::UserLoadTable;
use epicload_core::table::Table;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::inputs::{InputArgs, RunContext, tagged_table};
use super::unassigned::DirectiveArgs;
use crate::output::{OutputMode, render};

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Write the UserLoad table to PATH.
    #[arg(long, value_name = "PATH")]
    pub user_load: Option<PathBuf>,

    /// Write the UnassignedUsers table to PATH.
    #[arg(long, value_name = "PATH")]
    pub unassigned: Option<PathBuf>,

    #[command(flatten)]
    pub directives: DirectiveArgs,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    digest: String,
    written: Vec<WrittenTable>,
}

#[derive(Debug, Serialize)]
struct WrittenTable {
    table: String,
    path: PathBuf,
    rows: usize,
}

pub fn run_export(args: &ExportArgs, ctx: &RunContext, output: OutputMode) -> Result<()> {
    if args.user_load.is_none() && args.unassigned.is_none() {
        bail!("nothing to export: pass --user-load PATH and/or --unassigned PATH");
    }

    let directives = args.directives.directives(ctx.config.matching.names)?;
    let run = ctx.execute(&args.inputs)?;

    // Build every requested table before touching the filesystem.
    let mut pending: Vec<(&Path, Table)> = Vec::with_capacity(2);
    if let Some(path) = &args.user_load {
        let table = UserLoadTable::from_loads(run.grid.weeks(), &run.loads).to_table();
        pending.push((path.as_path(), table));
    }
    if let Some(path) = &args.unassigned {
        let table = run.unassigned(&directives)?.roster().to_table();
        pending.push((path.as_path(), table));
    }

    let mut written = Vec::with_capacity(pending.len());
    for (path, table) in pending {
        write_json(path, &tagged_table(&table, &run))?;
        written.push(WrittenTable {
            table: table.name().to_string(),
            path: path.to_path_buf(),
            rows: table.len(),
        });
    }

    let summary = ExportSummary {
        digest: run.digest.to_string(),
        written,
    };
    render(output, &summary, |s, w| {
        for table in &s.written {
            writeln!(
                w,
                "wrote {} ({} rows) to {}",
                table.table,
                table.rows,
                table.path.display()
            )?;
        }
        Ok(())
    })
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writeln!(out)?;
    out.flush()?;
    info!(path = %path.display(), "table exported");
    Ok(())
}
