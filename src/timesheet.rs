//! Timesheet overlap and daily-cap validation.
//!
//! [`TimesheetGuard`] decides whether a proposed or edited time entry may be
//! admitted for a user's day: its `[start, end)` interval must not intersect
//! any existing entry, and the day's total logged hours must stay within
//! [`DAILY_HOURS_CAP`]. The two checks are independent; both must pass.
//! Admission runs under the store's per-day lock so the snapshot the checks
//! saw cannot change before the insert lands.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::error::EngineError;
use crate::model::{EntryChanges, NewTimesheetEntry, TimesheetEntry, TimesheetStatus};
use crate::store::{DayLock, TimesheetStore};

/// Hard ceiling on logged hours per user per day. A business rule, not a
/// tunable.
pub const DAILY_HOURS_CAP: Decimal = Decimal::from_parts(8, 0, 0, false, 0);

/// Wall-clock layout for start/end times ("13:45").
const TIME_FORMAT: &str = "%H:%M";

/// A proposed entry as supplied by the caller. Times are wall-clock strings
/// in the application time zone; `duration_hours` is independent of them.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryDraft {
    pub user_id: u64,
    pub project_id: u64,
    pub task_description: String,
    pub entry_date: NaiveDate,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_hours: Decimal,
    pub break_time_minutes: i32,
}

/// A proposed edit to a draft entry; `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPatch {
    pub task_description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_hours: Option<Decimal>,
    pub break_time_minutes: Option<i32>,
}

/// Half-open interval intersection: `[s1, e1)` and `[s2, e2)` overlap iff
/// `s1 < e2 && s2 < e1`. Entries that exactly abut do not overlap.
pub fn overlaps(s1: NaiveDateTime, e1: NaiveDateTime, s2: NaiveDateTime, e2: NaiveDateTime) -> bool {
    s1 < e2 && s2 < e1
}

/// Combines `entry_date` with wall-clock time strings and requires a
/// strictly positive span; zero-length and inverted ranges are rejected.
pub fn resolve_interval(
    entry_date: NaiveDate,
    start_str: &str,
    end_str: &str,
) -> Result<(NaiveDateTime, NaiveDateTime), EngineError> {
    let start = entry_date.and_time(parse_wall_clock(start_str)?);
    let end = entry_date.and_time(parse_wall_clock(end_str)?);
    if end <= start {
        return Err(EngineError::InvalidTimeRange {
            reason: "end time must be after start time".to_string(),
        });
    }
    Ok((start, end))
}

fn parse_wall_clock(value: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|e| EngineError::InvalidTimeRange {
        reason: format!("could not parse {value:?} as HH:MM: {e}"),
    })
}

/// Fails on the first existing entry whose interval intersects
/// `[new_start, new_end)`. Duration-only entries carry no interval and are
/// exempt by construction.
pub fn check_overlap(
    entries: &[TimesheetEntry],
    new_start: NaiveDateTime,
    new_end: NaiveDateTime,
) -> Result<(), EngineError> {
    for existing in entries {
        if let (Some(start), Some(end)) = (existing.start_time, existing.end_time) {
            if overlaps(new_start, new_end, start, end) {
                return Err(EngineError::TimeOverlap {
                    entry_id: existing.id,
                    start: start.time(),
                    end: end.time(),
                });
            }
        }
    }
    Ok(())
}

/// Fails when the day's logged hours plus `additional` would cross
/// [`DAILY_HOURS_CAP`]. Landing exactly on the cap is allowed.
pub fn check_daily_cap(entries: &[TimesheetEntry], additional: Decimal) -> Result<(), EngineError> {
    let current: Decimal = entries.iter().map(|e| e.duration_hours).sum();
    if current + additional > DAILY_HOURS_CAP {
        return Err(EngineError::DailyCapExceeded {
            current,
            attempted: additional,
        });
    }
    Ok(())
}

pub struct TimesheetGuard<S> {
    store: S,
    timezone: Tz,
}

impl<S: TimesheetStore> TimesheetGuard<S> {
    pub fn new(store: S, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Store-backed overlap check against the current day, for display-path
    /// validation. `exclude` lets an edit skip its own entry.
    pub async fn check_overlap_for(
        &self,
        user_id: u64,
        day: NaiveDate,
        new_start: NaiveDateTime,
        new_end: NaiveDateTime,
        exclude: Option<u64>,
    ) -> Result<(), EngineError> {
        let entries = self.store.entries_for_day(user_id, day, exclude).await?;
        check_overlap(&entries, new_start, new_end)
    }

    /// Store-backed daily-cap check against the current day.
    pub async fn check_daily_cap_for(
        &self,
        user_id: u64,
        day: NaiveDate,
        additional: Decimal,
    ) -> Result<(), EngineError> {
        let entries = self.store.entries_for_day(user_id, day, None).await?;
        check_daily_cap(&entries, additional)
    }

    /// Validates and persists a new draft entry. Both checks run against the
    /// locked day snapshot; a failed check drops the lock and nothing is
    /// written.
    pub async fn admit(&self, draft: EntryDraft) -> Result<TimesheetEntry, EngineError> {
        let interval = optional_interval(
            draft.entry_date,
            draft.start_time.as_deref(),
            draft.end_time.as_deref(),
        )?;

        let (lock, entries) = self
            .store
            .lock_day(draft.user_id, draft.entry_date, None)
            .await?;
        if let Some((start, end)) = interval {
            check_overlap(&entries, start, end)?;
        }
        check_daily_cap(&entries, draft.duration_hours)?;

        let created = lock
            .insert(NewTimesheetEntry {
                user_id: draft.user_id,
                project_id: draft.project_id,
                task_description: draft.task_description,
                entry_date: draft.entry_date,
                start_time: interval.map(|(start, _)| start),
                end_time: interval.map(|(_, end)| end),
                duration_hours: draft.duration_hours,
                break_time_minutes: draft.break_time_minutes,
            })
            .await?;
        info!(
            user_id = created.user_id,
            entry_id = created.id,
            entry_date = %created.entry_date,
            "timesheet entry admitted"
        );
        Ok(created)
    }

    /// Validates and applies an edit to a draft entry. The overlap check
    /// excludes the entry itself; the cap check re-runs with the new
    /// duration against the rest of the day.
    pub async fn revise(
        &self,
        id: u64,
        user_id: u64,
        patch: EntryPatch,
    ) -> Result<TimesheetEntry, EngineError> {
        let entry = self
            .store
            .get_entry(id, user_id)
            .await?
            .ok_or(EngineError::EntryNotFound { id })?;
        if entry.status != TimesheetStatus::Draft {
            return Err(EngineError::EntrySubmitted { id });
        }

        let interval = optional_interval(
            entry.entry_date,
            patch.start_time.as_deref(),
            patch.end_time.as_deref(),
        )?;

        let (lock, others) = self
            .store
            .lock_day(user_id, entry.entry_date, Some(id))
            .await?;
        if let Some((start, end)) = interval {
            check_overlap(&others, start, end)?;
        }
        check_daily_cap(&others, patch.duration_hours.unwrap_or(entry.duration_hours))?;

        lock.update(
            id,
            EntryChanges {
                task_description: patch.task_description,
                start_time: interval.map(|(start, _)| start),
                end_time: interval.map(|(_, end)| end),
                duration_hours: patch.duration_hours,
                break_time_minutes: patch.break_time_minutes,
            },
        )
        .await?;

        self.store
            .get_entry(id, user_id)
            .await?
            .ok_or(EngineError::EntryNotFound { id })
    }

    /// Deletes a draft entry. Submitted entries are immutable.
    pub async fn remove(&self, id: u64, user_id: u64) -> Result<(), EngineError> {
        let entry = self
            .store
            .get_entry(id, user_id)
            .await?
            .ok_or(EngineError::EntryNotFound { id })?;
        if entry.status != TimesheetStatus::Draft {
            return Err(EngineError::EntrySubmitted { id });
        }
        if !self.store.delete_draft(id, user_id).await? {
            return Err(EngineError::EntryNotFound { id });
        }
        Ok(())
    }

    /// Moves every draft in the date range to submitted, stamping
    /// `submitted_at` in the application time zone. Returns how many entries
    /// moved; no further edits are permitted on them.
    pub async fn submit_range(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<u64, EngineError> {
        if to < from {
            return Err(EngineError::InvalidDateRange {
                start: from,
                end: to,
            });
        }
        let now = Utc::now().with_timezone(&self.timezone).naive_local();
        let submitted = self.store.mark_submitted(user_id, from, to, now).await?;
        info!(user_id, submitted, "timesheet submitted");
        Ok(submitted)
    }
}

/// Both time strings, or neither. Empty strings count as absent, matching
/// what form-shaped callers send.
fn optional_interval(
    entry_date: NaiveDate,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, EngineError> {
    let start = start.filter(|s| !s.is_empty());
    let end = end.filter(|s| !s.is_empty());
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(resolve_interval(entry_date, start, end)?)),
        (None, None) => Ok(None),
        _ => Err(EngineError::InvalidTimeRange {
            reason: "start and end times must be supplied together".to_string(),
        }),
    }
}
