//! `epicload unassigned` reconciles roster members who hold no epics.

use anyhow::{Context as _, Result};
use clap::Args;
use epicload_core::RunOutput;
use epicload_core::error::EngineError;
use epicload_core::reconcile::{Directive, Directives, Reconciliation, Remap, set_directive};
use epicload_core::workload::NameMatching;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::inputs::{InputArgs, RunContext, table_text};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Directive sources. Later sources override earlier ones per user:
/// the `--map` file, then `--keep`, `--remove`, `--remap`.
#[derive(Args, Debug, Clone, Default)]
pub struct DirectiveArgs {
    /// Directive file: TOML, or JSON when the extension is `.json`.
    /// Values are `keep`, `remove`, or `remap:<assignee>`.
    #[arg(long = "map", value_name = "FILE")]
    pub map: Option<PathBuf>,

    /// Keep a free user on the unassigned list (repeatable).
    #[arg(long, value_name = "NAME")]
    pub keep: Vec<String>,

    /// Drop a free user from the unassigned list (repeatable).
    #[arg(long, value_name = "NAME")]
    pub remove: Vec<String>,

    /// Fold a free user into an existing assignee (repeatable).
    #[arg(long, value_name = "NAME=TARGET")]
    pub remap: Vec<String>,
}

impl DirectiveArgs {
    /// Collect directives from every source.
    ///
    /// A flag replaces a file entry for the same user under `matching`.
    ///
    /// # Errors
    ///
    /// Returns an error if the map file cannot be read or parsed, or a
    /// `--remap` value is not `NAME=TARGET`.
    pub fn directives(&self, matching: NameMatching) -> Result<Directives> {
        let mut directives = match &self.map {
            Some(path) => read_directive_file(path)?,
            None => Directives::new(),
        };

        for name in &self.keep {
            set_directive(&mut directives, name, Directive::Keep, matching);
        }
        for name in &self.remove {
            set_directive(&mut directives, name, Directive::Remove, matching);
        }
        for raw in &self.remap {
            let (name, target) = parse_remap(raw)?;
            set_directive(&mut directives, &name, Directive::RemapTo(target), matching);
        }

        debug!(count = directives.len(), "directives collected");
        Ok(directives)
    }
}

fn read_directive_file(path: &Path) -> Result<Directives> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read directive file {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text)
            .with_context(|| format!("invalid directive file {}", path.display()))
    } else {
        toml::from_str(&text).with_context(|| format!("invalid directive file {}", path.display()))
    }
}

fn parse_remap(raw: &str) -> Result<(String, String), EngineError> {
    match raw.split_once('=') {
        Some((name, target)) if !name.trim().is_empty() && !target.trim().is_empty() => {
            Ok((name.trim().to_string(), target.trim().to_string()))
        }
        _ => Err(EngineError::InvalidDirective {
            raw: raw.to_string(),
        }),
    }
}

#[derive(Args, Debug)]
pub struct UnassignedArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    #[command(flatten)]
    pub directives: DirectiveArgs,
}

#[derive(Debug, Serialize)]
struct UnassignedReport {
    digest: String,
    as_of: String,
    unassigned: Vec<String>,
    removed: Vec<String>,
    remapped: Vec<Remap>,
}

impl UnassignedReport {
    fn new(run: &RunOutput, outcome: Reconciliation) -> Self {
        Self {
            digest: run.digest.to_string(),
            as_of: run.today.format("%Y-%m-%d").to_string(),
            unassigned: outcome.remaining,
            removed: outcome.removed,
            remapped: outcome.remapped,
        }
    }
}

pub fn run_unassigned(args: &UnassignedArgs, ctx: &RunContext, output: OutputMode) -> Result<()> {
    let directives = args.directives.directives(ctx.config.matching.names)?;
    let run = ctx.execute(&args.inputs)?;
    let outcome = run.unassigned(&directives)?;
    let roster = outcome.roster().to_table();
    let report = UnassignedReport::new(&run, outcome);

    render_mode(
        output,
        &report,
        |_, w| table_text(&roster, w),
        |r, w| render_pretty(r, w),
    )
}

fn render_pretty(report: &UnassignedReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Unassigned users ({})", report.unassigned.len()))?;
    if report.unassigned.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for name in &report.unassigned {
        writeln!(w, "  {name}")?;
    }

    if !report.removed.is_empty() || !report.remapped.is_empty() {
        writeln!(w)?;
        if !report.removed.is_empty() {
            pretty_kv(w, "Removed", report.removed.join(", "))?;
        }
        for remap in &report.remapped {
            pretty_kv(w, "Remapped", format!("{} -> {}", remap.user, remap.target))?;
        }
    }
    Ok(())
}
