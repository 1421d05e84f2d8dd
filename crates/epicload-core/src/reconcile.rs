//! Reconciliation of free roster members.
//!
//! After aggregation some roster members hold no epics. Each may be kept on
//! the unassigned list, removed from it, or remapped onto a name already in
//! the load table (for example when the roster spells a person differently
//! from the tracker). Remapping only affects the unassigned list; it never
//! rewrites assignees or recounts projects.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::table::{Table, cell_text};
use crate::workload::NameMatching;

/// Column of the UnassignedUsers table.
pub const NAME_COLUMN: &str = "Name";
/// Canonical name of the UnassignedUsers table.
pub const UNASSIGNED_TABLE: &str = "UnassignedUsers";

/// What to do with one free user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Directive {
    #[default]
    Keep,
    Remove,
    RemapTo(String),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::Remove => f.write_str("remove"),
            Self::RemapTo(target) => write!(f, "remap:{target}"),
        }
    }
}

impl FromStr for Directive {
    type Err = EngineError;

    /// Parse `keep`, `remove`, or `remap:<name>`.
    ///
    /// The keyword is case-insensitive; the target name is kept verbatim.
    /// `--keep--` is accepted as an alias of `keep`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidDirective { raw: s.to_string() };
        let trimmed = s.trim();

        if let Some((keyword, target)) = trimmed.split_once(':') {
            return match keyword.trim().to_ascii_lowercase().as_str() {
                "remap" | "remap-to" if !target.is_empty() => Ok(Self::RemapTo(target.to_string())),
                _ => Err(invalid()),
            };
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "keep" | "--keep--" => Ok(Self::Keep),
            "remove" => Ok(Self::Remove),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Directive {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Directive> for String {
    fn from(value: Directive) -> Self {
        value.to_string()
    }
}

/// Per-user directives keyed by free-user name.
pub type Directives = BTreeMap<String, Directive>;

/// Set the directive for `name`, replacing any entry for the same user
/// under `matching`.
pub fn set_directive(
    directives: &mut Directives,
    name: &str,
    directive: Directive,
    matching: NameMatching,
) {
    directives.retain(|existing, _| !matching.same(existing, name));
    directives.insert(name.to_string(), directive);
}

/// A free user folded into an existing assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remap {
    pub user: String,
    pub target: String,
}

/// Outcome of applying directives to the free-user list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Names still unassigned, in free-user order.
    pub remaining: Vec<String>,
    pub removed: Vec<String>,
    pub remapped: Vec<Remap>,
}

impl Reconciliation {
    /// The final unassigned roster.
    #[must_use]
    pub fn roster(&self) -> UnassignedRoster {
        UnassignedRoster {
            names: self.remaining.clone(),
        }
    }
}

/// Apply `directives` to `free_users`.
///
/// Users without a directive are kept. Directives naming someone who is not
/// a free user are ignored with a warning. Remap targets must appear in
/// `assignees` (the combined load table) under `matching`.
///
/// # Errors
///
/// Returns [`EngineError::UnknownRemapTarget`] for the first remap whose
/// target is not in `assignees`.
#[instrument(skip_all, fields(free = free_users.len(), directives = directives.len()))]
pub fn reconcile(
    free_users: &[String],
    assignees: &[&str],
    directives: &Directives,
    matching: NameMatching,
) -> Result<Reconciliation, EngineError> {
    for name in directives.keys() {
        if !free_users.iter().any(|free| matching.same(free, name)) {
            warn!(%name, "directive for a user who is not free; ignored");
        }
    }

    let mut outcome = Reconciliation::default();
    for user in free_users {
        let directive = directives
            .iter()
            .find(|(name, _)| matching.same(name, user))
            .map_or(&Directive::Keep, |(_, directive)| directive);

        match directive {
            Directive::Keep => outcome.remaining.push(user.clone()),
            Directive::Remove => outcome.removed.push(user.clone()),
            Directive::RemapTo(target) => {
                if !assignees.iter().any(|name| matching.same(name, target)) {
                    return Err(EngineError::UnknownRemapTarget {
                        user: user.clone(),
                        target: target.clone(),
                    });
                }
                outcome.remapped.push(Remap {
                    user: user.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    debug!(
        remaining = outcome.remaining.len(),
        removed = outcome.removed.len(),
        remapped = outcome.remapped.len(),
        "free users reconciled"
    );
    Ok(outcome)
}

/// Ordered names still considered free after reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnassignedRoster {
    pub names: Vec<String>,
}

impl UnassignedRoster {
    /// Export as the single-column UnassignedUsers table.
    #[must_use]
    pub fn to_table(&self) -> Table {
        let mut table = Table::new(UNASSIGNED_TABLE, vec![NAME_COLUMN.to_string()]);
        for name in &self.names {
            table.push_row(vec![serde_json::Value::String(name.clone())]);
        }
        table
    }

    /// Re-import a previously exported UnassignedUsers table.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingColumns`] without a `Name` column and
    /// [`EngineError::InvalidCell`] for non-text names.
    pub fn from_table(table: &Table) -> Result<Self, EngineError> {
        table.require_columns(&[NAME_COLUMN])?;
        let Some(idx) = table.column_index(NAME_COLUMN) else {
            return Ok(Self::default());
        };

        let mut names = Vec::with_capacity(table.len());
        for (offset, row) in table.rows().iter().enumerate() {
            let name = cell_text(&row[idx]).map_err(|expected| EngineError::InvalidCell {
                table: table.name().to_string(),
                row: offset + 1,
                column: NAME_COLUMN.to_string(),
                expected,
            })?;
            names.extend(name);
        }
        Ok(Self { names })
    }
}
