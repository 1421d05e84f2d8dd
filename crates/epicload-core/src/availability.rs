//! Free dates and the weekly free/busy grid.
//!
//! A user's free date is the latest due date among the epics they hold.
//! The grid enumerates Monday-starting weeks from the current week through
//! the last Monday of the year. A week is free once the free date is on or
//! before the week's reference date, where the reference date is the week
//! start or today, whichever is later. The reference date never decreases,
//! so each user's row flips from busy to free at most once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::model::WorkItem;
use crate::workload::{LoadRow, Workload};

/// How epics without a due date affect the free date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingDueDate {
    /// The epic contributes no date.
    #[default]
    Ignore,
    /// The free date becomes unknown and every week is busy.
    Unknown,
}

/// Availability in one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeekStatus {
    Busy,
    Free,
}

impl WeekStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "Busy",
            Self::Free => "Free",
        }
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a week status label is not `Free` or `Busy`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid week status '{0}': expected Free or Busy")]
pub struct ParseWeekStatusError(pub String);

impl FromStr for WeekStatus {
    type Err = ParseWeekStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" => Ok(Self::Free),
            "Busy" => Ok(Self::Busy),
            other => Err(ParseWeekStatusError(other.to_string())),
        }
    }
}

/// Monday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date - Days::new(back)
}

/// The enumerated weeks of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekGrid {
    today: NaiveDate,
    weeks: Vec<NaiveDate>,
}

impl WeekGrid {
    /// Weeks from the current week through the last Monday on or before
    /// December 31 of `today`'s year.
    #[must_use]
    pub fn through_year_end(today: NaiveDate) -> Self {
        let first = week_start(today);
        let last = NaiveDate::from_ymd_opt(today.year(), 12, 31).map_or(first, week_start);

        let weeks = std::iter::successors(Some(first), |week| week.checked_add_days(Days::new(7)))
            .take_while(|week| *week <= last)
            .collect();

        Self { today, weeks }
    }

    #[must_use]
    pub const fn today(&self) -> NaiveDate {
        self.today
    }

    #[must_use]
    pub fn weeks(&self) -> &[NaiveDate] {
        &self.weeks
    }

    /// Status of a user with `free_date` in the week starting `week`.
    ///
    /// An unknown free date is busy in every week.
    #[must_use]
    pub fn status(&self, free_date: Option<NaiveDate>, week: NaiveDate) -> WeekStatus {
        let reference = week.max(self.today);
        match free_date {
            Some(date) if date <= reference => WeekStatus::Free,
            _ => WeekStatus::Busy,
        }
    }

    /// Status for every enumerated week.
    #[must_use]
    pub fn statuses(&self, free_date: Option<NaiveDate>) -> BTreeMap<NaiveDate, WeekStatus> {
        self.weeks
            .iter()
            .map(|week| (*week, self.status(free_date, *week)))
            .collect()
    }
}

/// Due date of each epic title.
///
/// Only the first row of each title counts, matching the row the hierarchy
/// index keeps; a later duplicate never turns a title into an epic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpicDueDates(HashMap<String, Option<NaiveDate>>);

impl EpicDueDates {
    #[must_use]
    pub fn from_items(items: &[WorkItem]) -> Self {
        let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
        let mut dates = HashMap::new();
        for item in items {
            if seen.insert(item.title.as_str()) && item.hierarchy.is_epic() {
                dates.insert(item.title.clone(), item.due_date);
            }
        }
        Self(dates)
    }

    /// `None` when no epic row has this title; `Some(None)` when it has no date.
    #[must_use]
    pub fn get(&self, epic: &str) -> Option<Option<NaiveDate>> {
        self.0.get(epic).copied()
    }

    /// Epic titles without a due date, sorted.
    #[must_use]
    pub fn undated(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .0
            .iter()
            .filter(|(_, due)| due.is_none())
            .map(|(title, _)| title.clone())
            .collect();
        titles.sort_unstable();
        titles
    }
}

/// Projected availability for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLoad {
    pub assignee: String,
    pub number_of_projects: usize,
    /// `None` only under [`MissingDueDate::Unknown`].
    pub free_date: Option<NaiveDate>,
    pub weekly: BTreeMap<NaiveDate, WeekStatus>,
}

/// Computes free dates and weekly grids for a workload.
#[derive(Debug, Clone)]
pub struct AvailabilityProjector<'a> {
    due_dates: &'a EpicDueDates,
    grid: &'a WeekGrid,
    policy: MissingDueDate,
}

impl<'a> AvailabilityProjector<'a> {
    #[must_use]
    pub const fn new(due_dates: &'a EpicDueDates, grid: &'a WeekGrid, policy: MissingDueDate) -> Self {
        Self {
            due_dates,
            grid,
            policy,
        }
    }

    /// Latest due date among `row`'s epics, or today when nothing is dated.
    #[must_use]
    pub fn free_date(&self, row: &LoadRow) -> Option<NaiveDate> {
        let mut latest: Option<NaiveDate> = None;
        for epic in &row.epics {
            match self.due_dates.get(epic) {
                Some(Some(due)) => latest = latest.max(Some(due)),
                Some(None) if self.policy == MissingDueDate::Unknown => {
                    debug!(assignee = %row.assignee, %epic, "undated epic makes free date unknown");
                    return None;
                }
                Some(None) => {}
                None => warn!(%epic, "resolved epic has no epic row"),
            }
        }
        Some(latest.unwrap_or_else(|| self.grid.today()))
    }

    #[must_use]
    pub fn project_row(&self, row: &LoadRow) -> UserLoad {
        let free_date = self.free_date(row);
        UserLoad {
            assignee: row.assignee.clone(),
            number_of_projects: row.number_of_projects(),
            free_date,
            weekly: self.grid.statuses(free_date),
        }
    }

    /// Project every row of the combined table, preserving order.
    #[instrument(skip_all, fields(rows = workload.rows.len(), weeks = self.grid.weeks().len()))]
    pub fn project(&self, workload: &Workload) -> Vec<UserLoad> {
        workload.rows.iter().map(|row| self.project_row(row)).collect()
    }
}
