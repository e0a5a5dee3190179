//! Core engine for an internal HR dashboard: leave balance / loss-of-pay
//! accounting and timesheet overlap / daily-cap validation.
//!
//! The crate owns the two pieces of business logic that mutate shared state
//! (a user's per-year leave ledger and a user's daily time allocation) and
//! nothing else. HTTP transport, authentication and the admin UI live in the
//! calling application; the engine consumes an authenticated user id, a leave
//! type catalog and a persistence collaborator (see [`store`]), and returns
//! structured results the caller can map onto its own responses.

pub mod config;
pub mod db;
pub mod error;
pub mod leave;
pub mod logging;
pub mod model;
pub mod store;
pub mod timesheet;

pub use error::{EngineError, StoreError};
pub use leave::{LeaveAccountant, LeaveBreakdown, LeaveRequestForm};
pub use timesheet::{EntryDraft, EntryPatch, TimesheetGuard, DAILY_HOURS_CAP};
