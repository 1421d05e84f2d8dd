//! Title-keyed hierarchy lookups and ancestor-epic resolution.
//!
//! # Resolution
//!
//! An item's epic is the item itself when it is an epic, otherwise the first
//! epic found by following `Parent` links upward. The parent graph comes
//! straight from user-maintained spreadsheets, so it may be malformed:
//!
//! - a parent that names no known title ends the walk (no epic)
//! - a parent chain that revisits a title is a cycle (no epic)
//!
//! Every walk records the titles it has seen, so a walk never takes more
//! steps than there are distinct titles in the index.
//!
//! # Duplicate titles
//!
//! Titles are the only identifiers the parent column can reference. Under
//! [`DuplicatePolicy::Reject`] a repeated title aborts the run; under
//! [`DuplicatePolicy::FirstWins`] the first row keeps the title and later
//! rows are recorded in [`HierarchyIndex::duplicates`].

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::model::{AnnotatedItem, Hierarchy, WorkItem};

/// What to do when two work items share a title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Abort the run.
    #[default]
    Reject,
    /// Keep the earliest row, ignore later ones for lookups.
    FirstWins,
}

/// A title that appeared on more than one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateTitle {
    pub title: String,
    pub kept_row: usize,
    pub ignored_row: usize,
}

/// Immutable title-keyed lookups built once per run.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    hierarchy_of: HashMap<String, Hierarchy>,
    parent_of: HashMap<String, String>,
    duplicates: Vec<DuplicateTitle>,
}

/// Anomalies in the parent graph. None of these fail a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyDiagnostics {
    /// Sorted titles of each parent cycle (strongly connected component).
    pub cycles: Vec<Vec<String>>,
    /// `(title, parent)` pairs whose parent names no known title.
    pub dangling_parents: Vec<(String, String)>,
    /// Non-epic titles that resolve to no epic.
    pub unresolved: Vec<String>,
    /// Titles repeated in the input (only under first-wins).
    pub duplicates: Vec<DuplicateTitle>,
}

impl HierarchyDiagnostics {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty()
            && self.dangling_parents.is_empty()
            && self.unresolved.is_empty()
            && self.duplicates.is_empty()
    }
}

impl HierarchyIndex {
    /// Build the hierarchy and parent maps.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DuplicateTitle`] on the first repeated title when
    /// `policy` is [`DuplicatePolicy::Reject`].
    #[instrument(skip_all, fields(items = items.len(), ?policy))]
    pub fn build(items: &[WorkItem], policy: DuplicatePolicy) -> Result<Self, EngineError> {
        let mut index = Self::default();
        let mut first_row: HashMap<&str, usize> = HashMap::with_capacity(items.len());

        for item in items {
            if let Some(&kept_row) = first_row.get(item.title.as_str()) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(EngineError::DuplicateTitle {
                            title: item.title.clone(),
                            first_row: kept_row,
                            duplicate_row: item.row,
                        });
                    }
                    DuplicatePolicy::FirstWins => {
                        warn!(
                            title = %item.title,
                            kept_row,
                            ignored_row = item.row,
                            "duplicate title ignored"
                        );
                        index.duplicates.push(DuplicateTitle {
                            title: item.title.clone(),
                            kept_row,
                            ignored_row: item.row,
                        });
                        continue;
                    }
                }
            }

            first_row.insert(item.title.as_str(), item.row);
            index
                .hierarchy_of
                .insert(item.title.clone(), item.hierarchy.clone());
            index
                .parent_of
                .insert(item.title.clone(), item.parent.clone());
        }

        debug!(titles = index.len(), "hierarchy index built");
        Ok(index)
    }

    /// Number of distinct titles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hierarchy_of.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hierarchy_of.is_empty()
    }

    #[must_use]
    pub fn hierarchy_of(&self, title: &str) -> Option<&Hierarchy> {
        self.hierarchy_of.get(title)
    }

    /// Parent title, empty for roots. `None` for unknown titles.
    #[must_use]
    pub fn parent_of(&self, title: &str) -> Option<&str> {
        self.parent_of.get(title).map(String::as_str)
    }

    #[must_use]
    pub fn is_epic(&self, title: &str) -> bool {
        self.hierarchy_of.get(title).is_some_and(Hierarchy::is_epic)
    }

    #[must_use]
    pub fn duplicates(&self) -> &[DuplicateTitle] {
        &self.duplicates
    }

    /// Resolve the ancestor epic of `title`.
    ///
    /// Returns `title` itself for epics, the nearest epic ancestor otherwise,
    /// and `None` for unknown titles, roots without an epic, dangling parents,
    /// and cycles.
    #[must_use]
    pub fn resolve_epic(&self, title: &str) -> Option<&str> {
        let mut visited = HashSet::new();
        self.resolve_epic_with(title, &mut visited)
    }

    /// Resolve the ancestor epic of `title` using a caller-supplied visited set.
    ///
    /// Titles already in `visited` are treated as seen, so reaching one ends
    /// the walk without an epic. Callers resolving many titles can reuse one
    /// set and clear it between calls. The set never grows beyond
    /// [`HierarchyIndex::len`] entries.
    pub fn resolve_epic_with<'a>(
        &'a self,
        title: &str,
        visited: &mut HashSet<&'a str>,
    ) -> Option<&'a str> {
        let (key, hierarchy) = self.hierarchy_of.get_key_value(title)?;
        if hierarchy.is_epic() {
            return Some(key.as_str());
        }
        if !visited.insert(key.as_str()) {
            return None;
        }
        self.walk_up(self.parent_of(key)?, visited)
    }

    /// Annotate every item with its resolved epic title.
    ///
    /// Resolution goes through the index by title, so a row ignored under
    /// first-wins carries the kept row's epic.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn annotate(&self, items: &[WorkItem]) -> Vec<AnnotatedItem> {
        let mut visited: HashSet<&str> = HashSet::new();
        let annotated: Vec<AnnotatedItem> = items
            .iter()
            .map(|item| {
                visited.clear();
                AnnotatedItem {
                    item: item.clone(),
                    epic_title: self
                        .resolve_epic_with(&item.title, &mut visited)
                        .map(str::to_string),
                }
            })
            .collect();

        let unresolved = annotated.iter().filter(|a| a.epic_title.is_none()).count();
        debug!(unresolved, "items annotated");
        annotated
    }

    /// Report cycles, dangling parents, unresolved titles and duplicates.
    #[must_use]
    pub fn diagnostics(&self) -> HierarchyDiagnostics {
        let mut dangling_parents: Vec<(String, String)> = self
            .parent_of
            .iter()
            .filter(|(_, parent)| !parent.is_empty() && !self.parent_of.contains_key(*parent))
            .map(|(title, parent)| (title.clone(), parent.clone()))
            .collect();
        dangling_parents.sort_unstable();

        let mut unresolved: Vec<String> = self
            .hierarchy_of
            .keys()
            .filter(|title| self.resolve_epic(title).is_none())
            .cloned()
            .collect();
        unresolved.sort_unstable();

        HierarchyDiagnostics {
            cycles: self.parent_cycles(),
            dangling_parents,
            unresolved,
            duplicates: self.duplicates.clone(),
        }
    }

    /// Parent cycles as sorted member lists, self-parents included.
    #[must_use]
    pub fn parent_cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::with_capacity(self.len(), self.len());
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.len());
        for title in self.parent_of.keys() {
            nodes.insert(title.as_str(), graph.add_node(title.as_str()));
        }
        for (title, parent) in &self.parent_of {
            if let (Some(&from), Some(&to)) = (nodes.get(title.as_str()), nodes.get(parent.as_str()))
            {
                graph.add_edge(from, to, ());
            }
        }

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| graph.find_edge(*node, *node).is_some())
            })
            .map(|component| {
                let mut titles: Vec<String> = component
                    .into_iter()
                    .map(|idx| graph[idx].to_string())
                    .collect();
                titles.sort_unstable();
                titles
            })
            .collect();

        cycles.sort_unstable();
        cycles
    }

    fn walk_up<'a>(&'a self, start: &str, visited: &mut HashSet<&'a str>) -> Option<&'a str> {
        let mut current: &str = start;
        loop {
            if current.is_empty() {
                return None;
            }
            // Dangling parent: the title is not in the index.
            let (key, hierarchy) = self.hierarchy_of.get_key_value(current)?;
            if !visited.insert(key.as_str()) {
                return None;
            }
            if hierarchy.is_epic() {
                return Some(key.as_str());
            }
            current = self.parent_of.get(key).map(String::as_str)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn epic(title: &str) -> WorkItem {
        WorkItem::new(title, Hierarchy::epic(), "")
    }

    fn child(title: &str, hierarchy: Hierarchy, parent: &str) -> WorkItem {
        WorkItem::new(title, hierarchy, parent)
    }

    fn numbered(mut items: Vec<WorkItem>) -> Vec<WorkItem> {
        for (idx, item) in items.iter_mut().enumerate() {
            item.row = idx + 1;
        }
        items
    }

    fn index(items: &[WorkItem]) -> HierarchyIndex {
        HierarchyIndex::build(items, DuplicatePolicy::Reject).unwrap()
    }

    #[test]
    fn epic_resolves_to_itself() {
        let idx = index(&[epic("E1")]);
        assert_eq!(idx.resolve_epic("E1"), Some("E1"));
    }

    #[test]
    fn three_level_chain_resolves_to_epic_not_story() {
        let items = [
            epic("E1"),
            child("S1", Hierarchy::Story, "E1"),
            child("T1", Hierarchy::Task, "S1"),
        ];
        let idx = index(&items);
        assert_eq!(idx.resolve_epic("T1"), Some("E1"));
        assert_eq!(idx.resolve_epic("S1"), Some("E1"));
    }

    #[test]
    fn nearest_epic_wins_over_outer_epic() {
        let items = [
            epic("Outer"),
            child("Inner", Hierarchy::epic(), "Outer"),
            child("T1", Hierarchy::Task, "Inner"),
        ];
        let idx = index(&items);
        assert_eq!(idx.resolve_epic("T1"), Some("Inner"));
        assert_eq!(idx.resolve_epic("Inner"), Some("Inner"));
    }

    #[test]
    fn two_node_cycle_resolves_to_none_for_both() {
        let items = [
            child("A", Hierarchy::Task, "B"),
            child("B", Hierarchy::Task, "A"),
        ];
        let idx = index(&items);
        assert_eq!(idx.resolve_epic("A"), None);
        assert_eq!(idx.resolve_epic("B"), None);
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let idx = index(&[child("A", Hierarchy::Story, "A")]);
        assert_eq!(idx.resolve_epic("A"), None);
        assert_eq!(idx.parent_cycles(), vec![vec!["A".to_string()]]);
    }

    #[test]
    fn cycle_above_an_item_does_not_trap_it() {
        let items = [
            child("A", Hierarchy::Story, "B"),
            child("B", Hierarchy::Story, "A"),
            child("T", Hierarchy::Task, "A"),
        ];
        let idx = index(&items);
        assert_eq!(idx.resolve_epic("T"), None);
        assert_eq!(
            idx.parent_cycles(),
            vec![vec!["A".to_string(), "B".to_string()]]
        );
    }

    #[test]
    fn dangling_parent_and_root_resolve_to_none() {
        let items = [
            child("T1", Hierarchy::Task, "Ghost"),
            child("T2", Hierarchy::Task, ""),
        ];
        let idx = index(&items);
        assert_eq!(idx.resolve_epic("T1"), None);
        assert_eq!(idx.resolve_epic("T2"), None);
        assert_eq!(idx.resolve_epic("Unknown"), None);
    }

    #[test]
    fn visited_set_is_respected_and_bounded() {
        let items = [
            epic("E1"),
            child("S1", Hierarchy::Story, "E1"),
            child("T1", Hierarchy::Task, "S1"),
        ];
        let idx = index(&items);

        let mut visited = HashSet::new();
        assert_eq!(idx.resolve_epic_with("T1", &mut visited), Some("E1"));
        assert!(visited.len() <= idx.len());

        let mut poisoned = HashSet::from(["S1"]);
        assert_eq!(idx.resolve_epic_with("T1", &mut poisoned), None);
    }

    #[test]
    fn duplicate_titles_are_rejected_by_default() {
        let items = numbered(vec![epic("E1"), child("E1", Hierarchy::Task, "")]);
        let err = HierarchyIndex::build(&items, DuplicatePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateTitle {
                title: "E1".to_string(),
                first_row: 1,
                duplicate_row: 2,
            }
        );
    }

    #[test]
    fn first_wins_keeps_earliest_row() {
        let items = numbered(vec![
            epic("X"),
            child("X", Hierarchy::Task, ""),
            child("T1", Hierarchy::Task, "X"),
        ]);
        let idx = HierarchyIndex::build(&items, DuplicatePolicy::FirstWins).unwrap();
        assert!(idx.is_epic("X"));
        assert_eq!(idx.resolve_epic("T1"), Some("X"));
        assert_eq!(
            idx.duplicates(),
            [DuplicateTitle {
                title: "X".to_string(),
                kept_row: 1,
                ignored_row: 2,
            }]
        );
    }

    #[test]
    fn ignored_duplicate_rows_take_the_kept_rows_resolution() {
        let items = numbered(vec![
            child("X", Hierarchy::Task, ""),
            epic("X").with_assignee("Alice"),
            child("T1", Hierarchy::Task, "X").with_assignee("Bob"),
        ]);
        let idx = HierarchyIndex::build(&items, DuplicatePolicy::FirstWins).unwrap();
        let annotated = idx.annotate(&items);
        assert!(annotated.iter().all(|a| a.epic_title.is_none()));
        assert!(!idx.is_epic("X"));
        assert_eq!(idx.diagnostics().unresolved, ["T1", "X"]);
    }

    #[test]
    fn annotate_resolves_every_row() {
        let items = numbered(vec![
            epic("E1"),
            child("S1", Hierarchy::Story, "E1"),
            child("T1", Hierarchy::Task, "S1"),
            child("Loose", Hierarchy::Task, ""),
        ]);
        let idx = index(&items);
        let annotated = idx.annotate(&items);
        let epics: Vec<Option<&str>> = annotated
            .iter()
            .map(|a| a.epic_title.as_deref())
            .collect();
        assert_eq!(epics, [Some("E1"), Some("E1"), Some("E1"), None]);
    }

    #[test]
    fn diagnostics_report_every_anomaly() {
        let items = [
            epic("E1"),
            child("A", Hierarchy::Task, "B"),
            child("B", Hierarchy::Task, "A"),
            child("C", Hierarchy::Task, "Ghost"),
            child("D", Hierarchy::Task, "E1"),
        ];
        let diag = index(&items).diagnostics();
        assert_eq!(diag.cycles, vec![vec!["A".to_string(), "B".to_string()]]);
        assert_eq!(
            diag.dangling_parents,
            vec![("C".to_string(), "Ghost".to_string())]
        );
        assert_eq!(diag.unresolved, ["A", "B", "C"]);
        assert!(!diag.is_clean());
    }

    #[test]
    fn well_formed_tree_has_clean_diagnostics() {
        let items = [epic("E1"), child("T1", Hierarchy::Task, "E1")];
        assert!(index(&items).diagnostics().is_clean());
    }

    // Arbitrary parent functions over a small title space: every node points
    // at some node (or nothing), so cycles of all lengths are common.
    fn arb_forest() -> impl Strategy<Value = Vec<WorkItem>> {
        (1usize..24).prop_flat_map(|n| {
            (
                proptest::collection::vec(proptest::option::of(0..n), n),
                proptest::collection::vec(proptest::bool::weighted(0.2), n),
            )
                .prop_map(move |(parents, epics)| {
                    (0..n)
                        .map(|i| {
                            let hierarchy = if epics[i] {
                                Hierarchy::epic()
                            } else {
                                Hierarchy::Task
                            };
                            let parent = parents[i].map(|p| format!("n{p}")).unwrap_or_default();
                            WorkItem::new(format!("n{i}"), hierarchy, parent)
                        })
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn resolution_is_total_and_lands_on_an_epic(items in arb_forest()) {
            let idx = index(&items);
            for item in &items {
                let mut visited = HashSet::new();
                let resolved = idx.resolve_epic_with(&item.title, &mut visited);
                prop_assert!(visited.len() <= idx.len());
                if let Some(epic) = resolved {
                    prop_assert!(idx.is_epic(epic));
                }
            }
        }

        #[test]
        fn annotate_agrees_with_title_resolution(items in arb_forest()) {
            let idx = index(&items);
            for annotated in idx.annotate(&items) {
                prop_assert_eq!(
                    annotated.epic_title.as_deref(),
                    idx.resolve_epic(&annotated.item.title)
                );
            }
        }

        #[test]
        fn annotate_agrees_with_title_resolution_under_first_wins(
            items in arb_forest(),
            clones in proptest::collection::vec((0usize..24, any::<bool>(), 0usize..24), 0..8),
        ) {
            let mut items = items;
            let n = items.len();
            for (title, epic, parent) in clones {
                let hierarchy = if epic { Hierarchy::epic() } else { Hierarchy::Task };
                items.push(WorkItem::new(
                    format!("n{}", title % n),
                    hierarchy,
                    format!("n{}", parent % n),
                ));
            }
            let items = numbered(items);
            let idx = HierarchyIndex::build(&items, DuplicatePolicy::FirstWins).unwrap();
            for annotated in idx.annotate(&items) {
                let resolved = idx.resolve_epic(&annotated.item.title);
                prop_assert_eq!(annotated.epic_title.as_deref(), resolved);
                if let Some(epic) = resolved {
                    prop_assert!(idx.is_epic(epic));
                }
            }
        }

        #[test]
        fn cycle_members_without_epics_never_resolve(items in arb_forest()) {
            let idx = index(&items);
            for cycle in idx.parent_cycles() {
                if cycle.iter().all(|title| !idx.is_epic(title)) {
                    for title in &cycle {
                        prop_assert_eq!(idx.resolve_epic(title), None);
                    }
                }
            }
        }
    }
}
