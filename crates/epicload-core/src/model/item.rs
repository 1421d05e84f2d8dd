use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Level of a work item in the breakdown.
///
/// Only [`Hierarchy::Epic`] carries meaning for resolution; it keeps the
/// configured label it was classified under. The named lower levels exist
/// for display and diagnostics. Anything unrecognized is kept verbatim in
/// [`Hierarchy::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Hierarchy {
    Epic(String),
    Story,
    Task,
    Subtask,
    Other(String),
}

impl Hierarchy {
    /// An epic under the default `"Epic"` label.
    #[must_use]
    pub fn epic() -> Self {
        Self::Epic("Epic".to_string())
    }

    /// Classify a raw hierarchy cell.
    ///
    /// `epic_level` is compared exactly; it is the configured label of the
    /// level that anchors initiatives (`"Epic"` by default).
    #[must_use]
    pub fn classify(raw: &str, epic_level: &str) -> Self {
        if raw == epic_level {
            return Self::Epic(raw.to_string());
        }
        match raw {
            "Story" => Self::Story,
            "Task" => Self::Task,
            "Sub-task" | "Subtask" => Self::Subtask,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn is_epic(&self) -> bool {
        matches!(self, Self::Epic(_))
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Epic(label) | Self::Other(label) => label,
            Self::Story => "Story",
            Self::Task => "Task",
            Self::Subtask => "Sub-task",
        }
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Hierarchy> for String {
    fn from(value: Hierarchy) -> Self {
        value.as_str().to_string()
    }
}

/// One row of the WorkItems table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// 1-based data row in the source table.
    pub row: usize,
    /// External identifier (e.g. a tracker key), when the table has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub title: String,
    pub hierarchy: Hierarchy,
    /// Parent title; empty for roots.
    pub parent: String,
    pub assignee: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl WorkItem {
    /// Minimal constructor used by tests and fixtures.
    #[must_use]
    pub fn new(title: impl Into<String>, hierarchy: Hierarchy, parent: impl Into<String>) -> Self {
        Self {
            row: 0,
            key: None,
            title: title.into(),
            hierarchy,
            parent: parent.into(),
            assignee: None,
            start_date: None,
            due_date: None,
        }
    }

    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    #[must_use]
    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_empty()
    }
}

/// A roster entry from the TeamMembers table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TeamMember {
    pub name: String,
}

impl TeamMember {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A work item paired with its resolved ancestor epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedItem {
    #[serde(flatten)]
    pub item: WorkItem,
    pub epic_title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_uses_configured_epic_label() {
        assert_eq!(Hierarchy::classify("Epic", "Epic"), Hierarchy::epic());
        assert!(Hierarchy::classify("Initiative", "Initiative").is_epic());
        assert_eq!(
            Hierarchy::classify("Epic", "Initiative"),
            Hierarchy::Other("Epic".to_string())
        );
    }

    #[test]
    fn epic_keeps_its_configured_label() {
        let initiative = Hierarchy::classify("Initiative", "Initiative");
        assert_eq!(initiative, Hierarchy::Epic("Initiative".to_string()));
        assert_eq!(initiative.to_string(), "Initiative");
        assert_eq!(String::from(initiative.clone()), "Initiative");
        assert_eq!(serde_json::to_string(&initiative).unwrap(), "\"Initiative\"");
    }

    #[test]
    fn classify_is_case_sensitive() {
        assert_eq!(
            Hierarchy::classify("epic", "Epic"),
            Hierarchy::Other("epic".to_string())
        );
        assert!(!Hierarchy::classify("EPIC", "Epic").is_epic());
    }

    #[test]
    fn known_levels_round_trip_through_display() {
        for raw in ["Story", "Task", "Sub-task", "Spike"] {
            assert_eq!(Hierarchy::classify(raw, "Epic").to_string(), raw);
        }
        assert_eq!(Hierarchy::classify("Subtask", "Epic"), Hierarchy::Subtask);
    }

    #[test]
    fn hierarchy_serializes_as_label() {
        let json = serde_json::to_string(&Hierarchy::Other("Bug".to_string())).unwrap();
        assert_eq!(json, "\"Bug\"");
        assert_eq!(serde_json::to_string(&Hierarchy::epic()).unwrap(), "\"Epic\"");
    }

    #[test]
    fn builder_helpers_fill_optional_fields() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let item = WorkItem::new("T1", Hierarchy::Task, "E1")
            .with_assignee("Alice")
            .with_due_date(due);
        assert_eq!(item.assignee.as_deref(), Some("Alice"));
        assert_eq!(item.due_date, Some(due));
        assert!(!item.is_root());
        assert!(WorkItem::new("E1", Hierarchy::epic(), "").is_root());
    }
}
