//! `epicload diagnose` reports parent-graph anomalies in the WorkItems table.
//!
//! None of these stop a run. Cycles and dangling parents leave items without
//! an epic, and epics without a due date are either ignored or make their
//! holders' free date unknown, depending on configuration.

use anyhow::Result;
use clap::Args;
use epicload_core::hierarchy::{DuplicateTitle, HierarchyDiagnostics};
use serde::Serialize;
use std::io::Write;

use super::inputs::{InputArgs, RunContext};
use crate::output::{OutputMode, render};

const MAX_SAMPLES: usize = 20;

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
}

#[derive(Debug, Serialize)]
pub struct DiagnoseReport {
    pub digest: String,
    pub items: usize,
    pub unresolved_items: usize,
    pub clean: bool,
    pub cycles: Vec<Vec<String>>,
    pub dangling_parents: Vec<DanglingParent>,
    pub unresolved: Vec<String>,
    pub duplicates: Vec<DuplicateTitle>,
    pub undated_epics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DanglingParent {
    pub title: String,
    pub parent: String,
}

impl DiagnoseReport {
    fn new(
        digest: String,
        items: usize,
        unresolved_items: usize,
        diagnostics: HierarchyDiagnostics,
        undated_epics: Vec<String>,
    ) -> Self {
        Self {
            digest,
            items,
            unresolved_items,
            clean: diagnostics.is_clean() && undated_epics.is_empty(),
            cycles: diagnostics.cycles,
            dangling_parents: diagnostics
                .dangling_parents
                .into_iter()
                .map(|(title, parent)| DanglingParent { title, parent })
                .collect(),
            unresolved: diagnostics.unresolved,
            duplicates: diagnostics.duplicates,
            undated_epics,
        }
    }
}

pub fn run_diagnose(args: &DiagnoseArgs, ctx: &RunContext, output: OutputMode) -> Result<()> {
    let run = ctx.execute(&args.inputs)?;
    let unresolved_items = run
        .annotated
        .iter()
        .filter(|a| a.epic_title.is_none())
        .count();
    let report = DiagnoseReport::new(
        run.digest.to_string(),
        run.annotated.len(),
        unresolved_items,
        run.diagnostics,
        run.undated_epics,
    );
    render(output, &report, |r, w| render_human(r, w))
}

fn render_human(report: &DiagnoseReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "Hierarchy diagnostics")?;
    writeln!(
        w,
        "- items: {} ({} without an epic)",
        report.items, report.unresolved_items
    )?;
    writeln!(w, "- snapshot: {}", report.digest)?;

    if report.clean {
        writeln!(w)?;
        writeln!(w, "No anomalies found.")?;
        return Ok(());
    }

    if !report.cycles.is_empty() {
        writeln!(w)?;
        writeln!(w, "Parent cycles:")?;
        for cycle in report.cycles.iter().take(MAX_SAMPLES) {
            writeln!(w, "  - {}", cycle.join(" <-> "))?;
        }
    }

    if !report.dangling_parents.is_empty() {
        writeln!(w)?;
        writeln!(w, "Parents that name no work item:")?;
        for d in report.dangling_parents.iter().take(MAX_SAMPLES) {
            writeln!(w, "  - {} -> {}", d.title, d.parent)?;
        }
    }

    if !report.unresolved.is_empty() {
        writeln!(w)?;
        writeln!(w, "Titles with no epic ancestor: {}", report.unresolved.len())?;
        for title in report.unresolved.iter().take(MAX_SAMPLES) {
            writeln!(w, "  - {title}")?;
        }
    }

    if !report.duplicates.is_empty() {
        writeln!(w)?;
        writeln!(w, "Duplicate titles (first row kept):")?;
        for dup in report.duplicates.iter().take(MAX_SAMPLES) {
            writeln!(
                w,
                "  - {} (kept row {}, ignored row {})",
                dup.title, dup.kept_row, dup.ignored_row
            )?;
        }
    }

    if !report.undated_epics.is_empty() {
        writeln!(w)?;
        writeln!(w, "Epics without a due date:")?;
        for title in report.undated_epics.iter().take(MAX_SAMPLES) {
            writeln!(w, "  - {title}")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(diagnostics: HierarchyDiagnostics, undated: &[&str]) -> DiagnoseReport {
        DiagnoseReport::new(
            "abc".to_string(),
            3,
            1,
            diagnostics,
            undated.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    #[test]
    fn clean_report_says_so() {
        let r = report(HierarchyDiagnostics::default(), &[]);
        assert!(r.clean);
        let mut buf = Vec::new();
        render_human(&r, &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("No anomalies found."));
    }

    #[test]
    fn undated_epics_make_report_unclean() {
        let r = report(HierarchyDiagnostics::default(), &["E9"]);
        assert!(!r.clean);
        let mut buf = Vec::new();
        render_human(&r, &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("Epics without a due date:"));
        assert!(s.contains("  - E9"));
    }

    #[test]
    fn cycles_and_dangling_parents_are_listed() {
        let diagnostics = HierarchyDiagnostics {
            cycles: vec![vec!["A".to_string(), "B".to_string()]],
            dangling_parents: vec![("T9".to_string(), "Ghost".to_string())],
            ..HierarchyDiagnostics::default()
        };
        let r = report(diagnostics, &[]);
        let mut buf = Vec::new();
        render_human(&r, &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert!(s.contains("A <-> B"));
        assert!(s.contains("T9 -> Ghost"));
    }
}
