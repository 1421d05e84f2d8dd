//! `epicload show <user>` lists one user's assigned items and free date.

use anyhow::{Result, bail};
use clap::Args;
use epicload_core::export::{UserDetail, assignments_for};
use std::io::{self, Write};

use super::inputs::{InputArgs, RunContext, date_or_dash, table_text};
use crate::output::{OutputMode, pretty_kv, pretty_section, pretty_table, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Assignee or roster name.
    pub user: String,

    #[command(flatten)]
    pub inputs: InputArgs,
}

pub fn run_show(args: &ShowArgs, ctx: &RunContext, output: OutputMode) -> Result<()> {
    let run = ctx.execute(&args.inputs)?;
    let Some(detail) = assignments_for(&run, &args.user) else {
        bail!(
            "'{}' is neither an assignee nor on the team roster",
            args.user
        );
    };

    render_mode(
        output,
        &detail,
        |d, w| {
            writeln!(w, "User  {}", d.user)?;
            writeln!(w, "NumberOfProjects  {}", d.number_of_projects)?;
            writeln!(w, "FreeDate  {}", date_or_dash(d.free_date))?;
            table_text(&d.to_table(), w)
        },
        |d, w| render_pretty(d, w),
    )
}

fn render_pretty(detail: &UserDetail, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &detail.user)?;
    pretty_kv(w, "Projects", detail.number_of_projects.to_string())?;
    pretty_kv(w, "Free from", date_or_dash(detail.free_date))?;
    writeln!(w)?;

    if detail.assignments.is_empty() {
        return writeln!(w, "No assigned work items.");
    }

    let with_key = detail.assignments.iter().any(|a| a.key.is_some());
    let mut headers = Vec::with_capacity(6);
    if with_key {
        headers.push("KEY");
    }
    headers.extend(["LEVEL", "TITLE", "EPIC", "START", "DUE"]);

    let rows: Vec<Vec<String>> = detail
        .assignments
        .iter()
        .map(|a| {
            let mut row = Vec::with_capacity(6);
            if with_key {
                row.push(a.key.clone().unwrap_or_else(|| "-".to_string()));
            }
            row.push(a.hierarchy.to_string());
            row.push(a.title.clone());
            row.push(a.epic_title.clone().unwrap_or_else(|| "(none)".to_string()));
            row.push(date_or_dash(a.start_date));
            row.push(date_or_dash(a.due_date));
            row
        })
        .collect();
    pretty_table(w, &headers, &rows)
}
