use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TimesheetStatus {
    Draft,
    Submitted,
}

impl TimesheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimesheetStatus::Draft => "draft",
            TimesheetStatus::Submitted => "submitted",
        }
    }
}

impl fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged block of work. `duration_hours` is supplied independently and
/// is not derived from the start/end pair; entries may carry a duration with
/// no times at all (those are exempt from overlap checking by construction).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimesheetEntry {
    pub id: u64,
    pub user_id: u64,
    pub project_id: u64,
    pub task_description: String,
    pub entry_date: NaiveDate,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub duration_hours: Decimal,
    pub break_time_minutes: i32,
    pub status: TimesheetStatus,
    pub submitted_at: Option<NaiveDateTime>,
}

/// Insert shape for a validated entry (always lands as a draft).
#[derive(Debug, Clone)]
pub struct NewTimesheetEntry {
    pub user_id: u64,
    pub project_id: u64,
    pub task_description: String,
    pub entry_date: NaiveDate,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub duration_hours: Decimal,
    pub break_time_minutes: i32,
}

/// Field-wise update for a draft entry; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    pub task_description: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub duration_hours: Option<Decimal>,
    pub break_time_minutes: Option<i32>,
}
