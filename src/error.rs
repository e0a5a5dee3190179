use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::LeaveStatus;

/// Failures surfaced by [`crate::leave::LeaveAccountant`] and
/// [`crate::timesheet::TimesheetGuard`].
///
/// Three families, and the caller is expected to map them differently:
/// preconditions (caller/config mistakes) and business-rule violations are
/// client-correctable and must never be logged as server faults; only
/// [`EngineError::Store`] is an infrastructure error. Every failure
/// short-circuits before any write.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No ledger row exists for (user, leave type, year). A data-setup
    /// precondition, not a business rule.
    #[error("leave balance not found for user {user_id}, leave type {leave_type_id}, year {year}")]
    BalanceNotFound {
        user_id: u64,
        leave_type_id: u64,
        year: i32,
    },

    #[error("days must be positive, got {days}")]
    InvalidDays { days: Decimal },

    #[error("end date {end} cannot be before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("leave type {leave_type_id} not found or inactive")]
    UnknownLeaveType { leave_type_id: u64 },

    #[error("leave application {id} not found")]
    ApplicationNotFound { id: u64 },

    /// Approval and rejection only apply to pending applications; terminal
    /// states have no outbound transitions.
    #[error("leave application {id} is not in pending status (currently {status})")]
    NotPending { id: u64, status: LeaveStatus },

    /// Deduction would drive `used_days` above `allocated_days`. The payload
    /// carries what the caller needs to present the shortfall.
    #[error("insufficient leave balance: trying to use {requested} days but only {remaining} remaining")]
    InsufficientBalance { requested: Decimal, remaining: Decimal },

    #[error("invalid time range: {reason}")]
    InvalidTimeRange { reason: String },

    /// First conflicting entry found; no attempt to report all conflicts.
    #[error("time entry {entry_id} already occupies this slot ({start}-{end})")]
    TimeOverlap {
        entry_id: u64,
        start: NaiveTime,
        end: NaiveTime,
    },

    #[error("cannot exceed 8 hours per day: current {current} hours, trying to add {attempted} hours")]
    DailyCapExceeded { current: Decimal, attempted: Decimal },

    #[error("timesheet entry {id} not found")]
    EntryNotFound { id: u64 },

    #[error("cannot modify submitted timesheet entry {id}")]
    EntrySubmitted { id: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the caller should treat this as a 4xx-equivalent the end user
    /// can self-correct, as opposed to a server fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Store(_))
    }
}

/// Infrastructure failures from the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The optimistic compare-and-swap on a balance row kept losing against
    /// concurrent writers and ran out of retries.
    #[error("concurrent update conflict on {key}")]
    Conflict { key: String },
}
