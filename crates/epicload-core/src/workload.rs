//! Distinct-epic counts per assignee and the free/assigned roster split.
//!
//! The aggregation is a single fold over annotated items into a map from
//! assignee to the set of epic titles they touch. Items without an assignee
//! or without a resolved epic contribute nothing, so an assignee appears in
//! the map only once they hold at least one epic.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::model::{AnnotatedItem, TeamMember};

/// How assignee and roster names are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameMatching {
    /// Byte-for-byte comparison.
    #[default]
    Exact,
    /// Trim surrounding whitespace and compare case-insensitively.
    Normalized,
}

impl NameMatching {
    /// Comparison key for `name`.
    #[must_use]
    pub fn key<'a>(self, name: &'a str) -> Cow<'a, str> {
        match self {
            Self::Exact => Cow::Borrowed(name),
            Self::Normalized => Cow::Owned(name.trim().to_lowercase()),
        }
    }

    #[must_use]
    pub fn same(self, a: &str, b: &str) -> bool {
        self.key(a) == self.key(b)
    }
}

/// One row of the combined load table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRow {
    pub assignee: String,
    /// Distinct resolved epics held by this assignee.
    pub epics: BTreeSet<String>,
}

impl LoadRow {
    #[must_use]
    pub fn number_of_projects(&self) -> usize {
        self.epics.len()
    }
}

/// Result of aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Workload {
    /// Assignees with epics (sorted by name), then free roster members in
    /// roster order with empty epic sets.
    pub rows: Vec<LoadRow>,
    /// Roster members holding no epic, in roster order.
    pub free_users: Vec<String>,
    /// Roster members holding at least one epic, in roster order.
    pub assigned_users: Vec<String>,
    pub matching: NameMatching,
}

impl Workload {
    /// Find the row for `name` under the configured matching.
    #[must_use]
    pub fn row(&self, name: &str) -> Option<&LoadRow> {
        self.rows
            .iter()
            .find(|row| self.matching.same(&row.assignee, name))
    }

    /// Every name in the combined table, in table order.
    #[must_use]
    pub fn assignees(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.assignee.as_str()).collect()
    }

    /// `(assignee, count)` pairs for assignees holding epics only.
    #[must_use]
    pub fn project_counts(&self) -> Vec<(&str, usize)> {
        self.rows
            .iter()
            .filter(|row| !row.epics.is_empty())
            .map(|row| (row.assignee.as_str(), row.number_of_projects()))
            .collect()
    }
}

/// Fold annotated items into per-assignee epic sets and split the roster.
///
/// Assignees absent from the roster are still counted. Under
/// [`NameMatching::Normalized`] the first spelling seen in the items is
/// the one reported.
#[instrument(skip_all, fields(items = annotated.len(), roster = roster.len(), ?matching))]
pub fn aggregate(
    annotated: &[AnnotatedItem],
    roster: &[TeamMember],
    matching: NameMatching,
) -> Workload {
    let mut by_assignee: BTreeMap<String, (String, BTreeSet<String>)> = BTreeMap::new();

    for entry in annotated {
        let (Some(assignee), Some(epic)) = (&entry.item.assignee, &entry.epic_title) else {
            continue;
        };
        by_assignee
            .entry(matching.key(assignee).into_owned())
            .or_insert_with(|| (assignee.clone(), BTreeSet::new()))
            .1
            .insert(epic.clone());
    }

    let held: HashSet<&str> = by_assignee.keys().map(String::as_str).collect();
    let (assigned_users, free_users): (Vec<String>, Vec<String>) = roster
        .iter()
        .map(|member| member.name.clone())
        .partition(|name| held.contains(matching.key(name).as_ref()));

    let mut rows: Vec<LoadRow> = by_assignee
        .into_values()
        .map(|(assignee, epics)| LoadRow { assignee, epics })
        .collect();
    rows.extend(free_users.iter().map(|name| LoadRow {
        assignee: name.clone(),
        epics: BTreeSet::new(),
    }));

    debug!(
        assignees = rows.len() - free_users.len(),
        free = free_users.len(),
        "workload aggregated"
    );

    Workload {
        rows,
        free_users,
        assigned_users,
        matching,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Hierarchy, WorkItem};
    use proptest::prelude::*;

    fn annotated(title: &str, assignee: Option<&str>, epic: Option<&str>) -> AnnotatedItem {
        let mut item = WorkItem::new(title, Hierarchy::Task, "");
        item.assignee = assignee.map(str::to_string);
        AnnotatedItem {
            item,
            epic_title: epic.map(str::to_string),
        }
    }

    fn roster(names: &[&str]) -> Vec<TeamMember> {
        names.iter().map(|n| TeamMember::new(*n)).collect()
    }

    #[test]
    fn counts_distinct_epics_per_assignee() {
        let items = [
            annotated("T1", Some("Alice"), Some("E1")),
            annotated("T2", Some("Alice"), Some("E1")),
            annotated("T3", Some("Alice"), Some("E2")),
            annotated("T4", Some("Carol"), Some("E2")),
            annotated("T5", Some("Alice"), None),
            annotated("T6", None, Some("E3")),
        ];
        let load = aggregate(&items, &roster(&["Alice", "Bob"]), NameMatching::Exact);

        assert_eq!(load.row("Alice").unwrap().number_of_projects(), 2);
        assert_eq!(load.row("Carol").unwrap().number_of_projects(), 1);
        assert_eq!(load.row("Bob").unwrap().number_of_projects(), 0);
        assert_eq!(load.free_users, ["Bob"]);
        assert_eq!(load.assigned_users, ["Alice"]);
        assert_eq!(load.assignees(), ["Alice", "Carol", "Bob"]);
        assert_eq!(load.project_counts(), [("Alice", 2), ("Carol", 1)]);
    }

    #[test]
    fn assignee_with_only_unresolved_items_is_free() {
        let items = [annotated("T1", Some("Bob"), None)];
        let load = aggregate(&items, &roster(&["Bob"]), NameMatching::Exact);
        assert_eq!(load.free_users, ["Bob"]);
        assert!(load.project_counts().is_empty());
    }

    #[test]
    fn free_users_keep_roster_order() {
        let load = aggregate(&[], &roster(&["Zed", "Amy", "Kim"]), NameMatching::Exact);
        assert_eq!(load.free_users, ["Zed", "Amy", "Kim"]);
        assert_eq!(load.assignees(), ["Zed", "Amy", "Kim"]);
    }

    #[test]
    fn empty_inputs_give_empty_workload() {
        let load = aggregate(&[], &[], NameMatching::Exact);
        assert!(load.rows.is_empty());
        assert!(load.free_users.is_empty());
    }

    #[test]
    fn exact_matching_does_not_fold_spelling_variants() {
        let items = [annotated("T1", Some("alice "), Some("E1"))];
        let load = aggregate(&items, &roster(&["Alice"]), NameMatching::Exact);
        assert_eq!(load.free_users, ["Alice"]);
        assert_eq!(load.assignees(), ["alice ", "Alice"]);
    }

    #[test]
    fn normalized_matching_folds_spelling_variants() {
        let items = [
            annotated("T1", Some("alice "), Some("E1")),
            annotated("T2", Some("ALICE"), Some("E2")),
        ];
        let load = aggregate(&items, &roster(&["Alice"]), NameMatching::Normalized);
        assert!(load.free_users.is_empty());
        assert_eq!(load.assigned_users, ["Alice"]);
        assert_eq!(load.rows.len(), 1);
        assert_eq!(load.rows[0].assignee, "alice ");
        assert_eq!(load.row("Alice").unwrap().number_of_projects(), 2);
    }

    fn arb_annotated() -> impl Strategy<Value = Vec<AnnotatedItem>> {
        proptest::collection::vec(
            (
                proptest::option::of(0u8..6),
                proptest::option::of(0u8..5),
            ),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (who, epic))| {
                    let who = who.map(|w| format!("u{w}"));
                    let epic = epic.map(|e| format!("E{e}"));
                    annotated(&format!("t{i}"), who.as_deref(), epic.as_deref())
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn count_equals_distinct_resolved_epics(items in arb_annotated()) {
            let load = aggregate(&items, &[], NameMatching::Exact);
            for row in &load.rows {
                let expected: BTreeSet<&str> = items
                    .iter()
                    .filter(|a| a.item.assignee.as_deref() == Some(row.assignee.as_str()))
                    .filter_map(|a| a.epic_title.as_deref())
                    .collect();
                prop_assert_eq!(row.number_of_projects(), expected.len());
            }
        }

        #[test]
        fn roster_is_partitioned(items in arb_annotated(), members in proptest::collection::btree_set(0u8..8, 0..8)) {
            let members: Vec<TeamMember> = members.iter().map(|m| TeamMember::new(format!("u{m}"))).collect();
            let load = aggregate(&items, &members, NameMatching::Exact);

            let free: BTreeSet<&str> = load.free_users.iter().map(String::as_str).collect();
            let assigned: BTreeSet<&str> = load.assigned_users.iter().map(String::as_str).collect();
            let all: BTreeSet<&str> = members.iter().map(|m| m.name.as_str()).collect();

            prop_assert!(free.is_disjoint(&assigned));
            prop_assert_eq!(free.union(&assigned).copied().collect::<BTreeSet<_>>(), all);
            for name in &load.assigned_users {
                prop_assert!(load.row(name).is_some_and(|r| r.number_of_projects() > 0));
            }
        }
    }
}
