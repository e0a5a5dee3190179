//! Persistence collaborator interfaces.
//!
//! The engine never touches the database ad hoc; everything goes through
//! these traits, and the traits carry the serialization contract the business
//! rules depend on: balance writes are optimistic compare-and-swap per
//! (user, leave type, year) key, and timesheet admission runs under a per-day
//! lock so a check-then-insert sequence cannot race a concurrent insert.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::fmt;

use crate::error::StoreError;
use crate::model::{
    EntryChanges, LeaveApplication, LeaveBalance, LeaveStatus, LeaveType, NewLeaveApplication,
    NewTimesheetEntry, TimesheetEntry,
};

mod memory;
mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Identity triple of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub user_id: u64,
    pub leave_type_id: u64,
    pub year: i32,
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "balance(user {}, leave type {}, year {})",
            self.user_id, self.leave_type_id, self.year
        )
    }
}

/// Ledger access. `store_used_days` is the compare-and-swap half of the
/// read-modify-write: it must persist `new_used` only if the row still holds
/// `expected_used`, atomically, and report whether it won.
pub trait BalanceStore {
    fn get_balance(
        &self,
        key: BalanceKey,
    ) -> impl Future<Output = Result<Option<LeaveBalance>, StoreError>> + Send;

    fn store_used_days(
        &self,
        key: BalanceKey,
        expected_used: Decimal,
        new_used: Decimal,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Who decided an application, and when. `rejection_reason` is only set on
/// the rejection path.
#[derive(Debug, Clone)]
pub struct Decision {
    pub decided_by: u64,
    pub decided_at: NaiveDateTime,
    pub rejection_reason: Option<String>,
}

/// Application records. `transition` is a guarded state change: it updates
/// only when the row is still in `from`, and reports whether it did. The
/// approval orchestration and its compensating rollback are both built on it.
pub trait ApplicationStore {
    fn insert_application(
        &self,
        app: NewLeaveApplication,
    ) -> impl Future<Output = Result<LeaveApplication, StoreError>> + Send;

    fn get_application(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<LeaveApplication>, StoreError>> + Send;

    fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decision: Option<Decision>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn update_pending(
        &self,
        id: u64,
        owner: u64,
        app: NewLeaveApplication,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn delete_pending(
        &self,
        id: u64,
        owner: u64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Active leave-type catalog lookups.
pub trait CatalogStore {
    fn get_leave_type(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<Option<LeaveType>, StoreError>> + Send;
}

/// Exclusive hold on one user's entries for one day, acquired through
/// [`TimesheetStore::lock_day`]. Consuming it commits the proposed write;
/// dropping it without committing discards the write entirely.
pub trait DayLock: Send + Sized {
    fn insert(
        self,
        entry: NewTimesheetEntry,
    ) -> impl Future<Output = Result<TimesheetEntry, StoreError>> + Send;

    fn update(
        self,
        entry_id: u64,
        changes: EntryChanges,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Timesheet persistence. `entries_for_day` is a plain read used for
/// display-path validation; admission must go through `lock_day` so the
/// snapshot the checks ran against cannot change before the insert lands.
pub trait TimesheetStore {
    type Lock: DayLock;

    fn entries_for_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> impl Future<Output = Result<Vec<TimesheetEntry>, StoreError>> + Send;

    fn lock_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> impl Future<Output = Result<(Self::Lock, Vec<TimesheetEntry>), StoreError>> + Send;

    fn get_entry(
        &self,
        id: u64,
        user_id: u64,
    ) -> impl Future<Output = Result<Option<TimesheetEntry>, StoreError>> + Send;

    fn delete_draft(
        &self,
        id: u64,
        user_id: u64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn mark_submitted(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        at: NaiveDateTime,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
