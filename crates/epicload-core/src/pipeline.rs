//! One end-to-end run over a snapshot of the two input tables.
//!
//! ```text
//! WorkItems ──► work_items ──► HierarchyIndex ──► annotate ──┐
//!                                                            ├─► aggregate ──► project ──► UserLoad
//! TeamMembers ─► team_members ───────────────────────────────┘        │
//!                                                                     └─► free users ──► reconcile
//! ```
//!
//! A run is a pure function of the snapshot, the project config and the
//! injected `today`. Nothing is cached between runs.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::availability::{AvailabilityProjector, EpicDueDates, UserLoad, WeekGrid};
use crate::config::ProjectConfig;
use crate::error::EngineError;
use crate::hierarchy::{HierarchyDiagnostics, HierarchyIndex};
use crate::input::{TEAM_MEMBERS_TABLE, WORK_ITEMS_TABLE, team_members, work_items};
use crate::model::{AnnotatedItem, TeamMember};
use crate::reconcile::{Directives, Reconciliation, reconcile};
use crate::table::Table;
use crate::workload::{Workload, aggregate};

/// BLAKE3 digest of a snapshot, rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotDigest(blake3::Hash);

impl SnapshotDigest {
    /// Short prefix for logs and human output.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.to_hex()[..12].to_string()
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.to_hex().as_str())
    }
}

impl Serialize for SnapshotDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The WorkItems and TeamMembers tables as they were at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub items: Table,
    pub team: Table,
}

impl Snapshot {
    #[must_use]
    pub const fn new(items: Table, team: Table) -> Self {
        Self { items, team }
    }

    /// Decode both tables from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedTable`] naming the table that failed.
    pub fn decode(items_json: &str, team_json: &str) -> Result<Self, EngineError> {
        Ok(Self {
            items: Table::decode(WORK_ITEMS_TABLE, items_json)?,
            team: Table::decode(TEAM_MEMBERS_TABLE, team_json)?,
        })
    }

    /// Content digest over both tables in split form.
    ///
    /// Two snapshots with identical columns and cells digest identically,
    /// whatever JSON shape they were decoded from.
    #[must_use]
    pub fn digest(&self) -> SnapshotDigest {
        let mut hasher = blake3::Hasher::new();
        for table in [&self.items, &self.team] {
            let encoded = table.to_split_json().to_string();
            hasher.update(table.name().as_bytes());
            hasher.update(&[0]);
            hasher.update(&encoded.len().to_le_bytes());
            hasher.update(encoded.as_bytes());
        }
        SnapshotDigest(hasher.finalize())
    }
}

/// Everything one run computes.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub digest: SnapshotDigest,
    pub today: NaiveDate,
    pub annotated: Vec<AnnotatedItem>,
    pub roster: Vec<TeamMember>,
    pub workload: Workload,
    pub grid: WeekGrid,
    pub loads: Vec<UserLoad>,
    pub diagnostics: HierarchyDiagnostics,
    /// Epic titles without a due date.
    pub undated_epics: Vec<String>,
}

impl RunOutput {
    /// Apply reconciliation directives to this run's free users.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownRemapTarget`] when a remap target is not
    /// in the combined load table.
    pub fn unassigned(&self, directives: &Directives) -> Result<Reconciliation, EngineError> {
        reconcile(
            &self.workload.free_users,
            &self.workload.assignees(),
            directives,
            self.workload.matching,
        )
    }

    /// Load row for `name`, if present in the combined table.
    #[must_use]
    pub fn load_of(&self, name: &str) -> Option<&UserLoad> {
        self.loads
            .iter()
            .find(|load| self.workload.matching.same(&load.assignee, name))
    }
}

/// Run the full pipeline.
///
/// # Errors
///
/// Fails on missing columns, invalid cells or dates, and duplicate titles
/// under the reject policy. Hierarchy anomalies never fail a run; they are
/// reported in [`RunOutput::diagnostics`].
#[instrument(skip_all, fields(today = %today))]
pub fn run(
    snapshot: &Snapshot,
    config: &ProjectConfig,
    today: NaiveDate,
) -> Result<RunOutput, EngineError> {
    let digest = snapshot.digest();

    let items = work_items(&snapshot.items, &config.columns, &config.hierarchy.epic_level)?;
    let roster = team_members(&snapshot.team, &config.team)?;

    let index = HierarchyIndex::build(&items, config.hierarchy.duplicate_titles)?;
    let annotated = index.annotate(&items);
    let workload = aggregate(&annotated, &roster, config.matching.names);

    let due_dates = EpicDueDates::from_items(&items);
    let grid = WeekGrid::through_year_end(today);
    let loads = AvailabilityProjector::new(&due_dates, &grid, config.availability.missing_due_date)
        .project(&workload);

    info!(
        digest = %digest.short(),
        items = items.len(),
        roster = roster.len(),
        assignees = workload.rows.len(),
        free = workload.free_users.len(),
        weeks = grid.weeks().len(),
        "run complete"
    );

    Ok(RunOutput {
        digest,
        today,
        annotated,
        roster,
        workload,
        grid,
        loads,
        diagnostics: index.diagnostics(),
        undated_epics: due_dates.undated(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::WeekStatus;
    use crate::reconcile::Directive;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const ITEMS: &str = r#"[
        {"Hierarchy": "Epic", "Title": "E1", "Parent": null, "Assignee": null, "StartDate": "2025-01-01", "DueDate": "2025-03-01"},
        {"Hierarchy": "Story", "Title": "S1", "Parent": "E1", "Assignee": "Alice", "StartDate": null, "DueDate": null},
        {"Hierarchy": "Task", "Title": "T1", "Parent": "S1", "Assignee": "Alice", "StartDate": null, "DueDate": null},
        {"Hierarchy": "Task", "Title": "T9", "Parent": "Ghost", "Assignee": "Carol", "StartDate": null, "DueDate": null}
    ]"#;

    const TEAM: &str = r#"[{"Name": "Alice"}, {"Name": "Bob"}]"#;

    fn snapshot() -> Snapshot {
        Snapshot::decode(ITEMS, TEAM).unwrap()
    }

    #[test]
    fn run_produces_loads_and_free_users() {
        let out = run(&snapshot(), &ProjectConfig::default(), date(2025, 1, 8)).unwrap();

        assert_eq!(out.workload.assignees(), ["Alice", "Bob"]);
        assert_eq!(out.workload.free_users, ["Bob"]);

        let alice = out.load_of("Alice").unwrap();
        assert_eq!(alice.number_of_projects, 1);
        assert_eq!(alice.free_date, Some(date(2025, 3, 1)));
        assert_eq!(alice.weekly[&date(2025, 2, 24)], WeekStatus::Busy);
        assert_eq!(alice.weekly[&date(2025, 3, 3)], WeekStatus::Free);

        let bob = out.load_of("Bob").unwrap();
        assert_eq!(bob.number_of_projects, 0);
        assert!(bob.weekly.values().all(|s| *s == WeekStatus::Free));

        assert_eq!(
            out.diagnostics.dangling_parents,
            [("T9".to_string(), "Ghost".to_string())]
        );
    }

    #[test]
    fn unassigned_applies_directives_without_touching_counts() {
        let out = run(&snapshot(), &ProjectConfig::default(), date(2025, 1, 8)).unwrap();
        let directives: Directives =
            [("Bob".to_string(), Directive::RemapTo("Alice".to_string()))].into();

        let outcome = out.unassigned(&directives).unwrap();
        assert!(outcome.remaining.is_empty());
        assert_eq!(out.load_of("Alice").unwrap().number_of_projects, 1);
    }

    #[test]
    fn digest_ignores_json_shape() {
        let split_items = snapshot().items.to_split_json().to_string();
        let reshaped = Snapshot::decode(&split_items, TEAM).unwrap();
        assert_eq!(reshaped.digest(), snapshot().digest());
        assert_eq!(snapshot().digest().to_string().len(), 64);
    }

    #[test]
    fn digest_renders_as_blake3_hex() {
        let digest = snapshot().digest();
        let hex = digest.to_string();
        assert_eq!(hex, digest.0.to_hex().as_str());
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest.short(), hex[..12]);
        assert_eq!(
            serde_json::to_value(digest).unwrap(),
            serde_json::Value::String(hex)
        );
    }

    #[test]
    fn digest_changes_with_content() {
        let other = Snapshot::decode(ITEMS, r#"[{"Name": "Alice"}]"#).unwrap();
        assert_ne!(other.digest(), snapshot().digest());
    }

    #[test]
    fn missing_columns_fail_the_run() {
        let snap = Snapshot::decode(r#"[{"Title": "E1"}]"#, TEAM).unwrap();
        let err = run(&snap, &ProjectConfig::default(), date(2025, 1, 8)).unwrap_err();
        assert!(matches!(err, EngineError::MissingColumns { .. }));
    }

    #[test]
    fn empty_snapshot_runs_cleanly() {
        let snap = Snapshot::decode("", "").unwrap();
        let out = run(&snap, &ProjectConfig::default(), date(2025, 12, 31)).unwrap();
        assert!(out.loads.is_empty());
        assert!(out.workload.free_users.is_empty());
        assert_eq!(out.grid.weeks(), [date(2025, 12, 29)]);
    }
}
