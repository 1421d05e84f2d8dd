//! `epicload load` prints the UserLoad table.

use anyhow::Result;
use clap::Args;
use epicload_core::RunOutput;
use epicload_core::availability::WeekStatus;
use epicload_core::export::UserLoadTable;
use serde::Serialize;
use std::io::Write;

use super::inputs::{InputArgs, RunContext, date_or_dash, table_text, tagged_table};
use crate::output::{OutputMode, pretty_section, pretty_table, render_mode};

#[derive(Args, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Print epics held per assignee instead of the weekly table.
    #[arg(long)]
    pub projects: bool,
}

#[derive(Debug, Serialize)]
struct ProjectCount<'a> {
    assignee: &'a str,
    projects: usize,
}

pub fn run_load(args: &LoadArgs, ctx: &RunContext, output: OutputMode) -> Result<()> {
    let run = ctx.execute(&args.inputs)?;
    if args.projects {
        return render_project_counts(&run, output);
    }
    let table = UserLoadTable::from_loads(run.grid.weeks(), &run.loads).to_table();
    let json = tagged_table(&table, &run);

    render_mode(
        output,
        &json,
        |_, w| table_text(&table, w),
        |_, w| {
            pretty_section(
                w,
                &format!(
                    "User load as of {} ({} weeks, snapshot {})",
                    run.today,
                    run.grid.weeks().len(),
                    run.digest.short()
                ),
            )?;
            let rows: Vec<Vec<String>> = run
                .loads
                .iter()
                .map(|load| {
                    vec![
                        load.assignee.clone(),
                        load.number_of_projects.to_string(),
                        date_or_dash(load.free_date),
                        week_strip(load.weekly.values().copied()),
                    ]
                })
                .collect();
            pretty_table(w, &["ASSIGNEE", "PROJECTS", "FREE FROM", "WEEKS (# busy, . free)"], &rows)
        },
    )
}

fn render_project_counts(run: &RunOutput, output: OutputMode) -> Result<()> {
    let counts: Vec<ProjectCount<'_>> = run
        .workload
        .project_counts()
        .into_iter()
        .map(|(assignee, projects)| ProjectCount { assignee, projects })
        .collect();
    let widest = counts.iter().map(|c| c.projects).max().unwrap_or(0);

    render_mode(
        output,
        &counts,
        |counts, w| {
            writeln!(w, "Assignee  NumberOfProjects")?;
            for c in counts {
                writeln!(w, "{}  {}", c.assignee, c.projects)?;
            }
            Ok(())
        },
        |counts, w| {
            pretty_section(w, "Epics per assignee")?;
            let rows: Vec<Vec<String>> = counts
                .iter()
                .map(|c| {
                    vec![
                        c.assignee.to_string(),
                        c.projects.to_string(),
                        bar(c.projects, widest),
                    ]
                })
                .collect();
            pretty_table(w, &["ASSIGNEE", "PROJECTS", ""], &rows)
        },
    )
}

/// Horizontal bar scaled to at most 40 cells.
fn bar(value: usize, widest: usize) -> String {
    const WIDTH: usize = 40;
    if widest == 0 {
        return String::new();
    }
    let cells = (value * WIDTH).div_ceil(widest);
    "\u{2588}".repeat(cells)
}

/// One character per week.
fn week_strip(statuses: impl Iterator<Item = WeekStatus>) -> String {
    statuses
        .map(|status| match status {
            WeekStatus::Busy => '#',
            WeekStatus::Free => '.',
        })
        .collect()
}
