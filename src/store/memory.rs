use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::model::{
    EntryChanges, LeaveApplication, LeaveBalance, LeaveStatus, LeaveType, NewLeaveApplication,
    NewTimesheetEntry, TimesheetEntry, TimesheetStatus,
};
use crate::store::{
    ApplicationStore, BalanceKey, BalanceStore, CatalogStore, DayLock, Decision, TimesheetStore,
};

#[derive(Default)]
struct State {
    balances: HashMap<BalanceKey, LeaveBalance>,
    applications: HashMap<u64, LeaveApplication>,
    entries: HashMap<u64, TimesheetEntry>,
    leave_types: HashMap<u64, LeaveType>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store implementing every collaborator trait. Used as the test
/// double for both engines; a single mutex per store stands in for the
/// database's row and gap locks, which is stricter but observably equivalent.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a ledger row, replacing any previous row for the triple.
    pub async fn put_balance(
        &self,
        key: BalanceKey,
        allocated_days: i32,
        used_days: Decimal,
    ) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.balances.insert(
            key,
            LeaveBalance {
                id,
                user_id: key.user_id,
                leave_type_id: key.leave_type_id,
                year: key.year,
                allocated_days,
                used_days,
            },
        );
    }

    /// Seeds an active catalog entry.
    pub async fn put_leave_type(&self, id: u64, name: &str) {
        let mut state = self.state.lock().await;
        state.leave_types.insert(
            id,
            LeaveType {
                id,
                name: name.to_string(),
                description: None,
                max_days_per_year: None,
                is_active: true,
            },
        );
    }

    /// Seeds a timesheet entry directly, bypassing validation.
    pub async fn put_entry(&self, entry: NewTimesheetEntry, status: TimesheetStatus) -> u64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.entries.insert(id, materialize(id, entry, status));
        id
    }

    /// Snapshot of a ledger row, for assertions.
    pub async fn balance(&self, key: BalanceKey) -> Option<LeaveBalance> {
        self.state.lock().await.balances.get(&key).cloned()
    }

    /// Snapshot of an application, for assertions.
    pub async fn application(&self, id: u64) -> Option<LeaveApplication> {
        self.state.lock().await.applications.get(&id).cloned()
    }

    /// Snapshot of an entry, for assertions.
    pub async fn entry(&self, id: u64) -> Option<TimesheetEntry> {
        self.state.lock().await.entries.get(&id).cloned()
    }
}

fn materialize(id: u64, entry: NewTimesheetEntry, status: TimesheetStatus) -> TimesheetEntry {
    TimesheetEntry {
        id,
        user_id: entry.user_id,
        project_id: entry.project_id,
        task_description: entry.task_description,
        entry_date: entry.entry_date,
        start_time: entry.start_time,
        end_time: entry.end_time,
        duration_hours: entry.duration_hours,
        break_time_minutes: entry.break_time_minutes,
        status,
        submitted_at: None,
    }
}

fn day_entries(
    state: &State,
    user_id: u64,
    day: NaiveDate,
    exclude: Option<u64>,
) -> Vec<TimesheetEntry> {
    let mut entries: Vec<TimesheetEntry> = state
        .entries
        .values()
        .filter(|e| e.user_id == user_id && e.entry_date == day && Some(e.id) != exclude)
        .cloned()
        .collect();
    entries.sort_by_key(|e| e.id);
    entries
}

impl BalanceStore for MemoryStore {
    async fn get_balance(&self, key: BalanceKey) -> Result<Option<LeaveBalance>, StoreError> {
        Ok(self.state.lock().await.balances.get(&key).cloned())
    }

    async fn store_used_days(
        &self,
        key: BalanceKey,
        expected_used: Decimal,
        new_used: Decimal,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.balances.get_mut(&key) {
            Some(balance) if balance.used_days == expected_used => {
                balance.used_days = new_used;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl ApplicationStore for MemoryStore {
    async fn insert_application(
        &self,
        app: NewLeaveApplication,
    ) -> Result<LeaveApplication, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let created = LeaveApplication {
            id,
            user_id: app.user_id,
            leave_type_id: app.leave_type_id,
            start_date: app.start_date,
            end_date: app.end_date,
            is_half_day: app.is_half_day,
            is_lop: app.is_lop,
            lop_days: app.lop_days,
            paid_days: app.paid_days,
            reason: app.reason,
            status: LeaveStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: None,
        };
        state.applications.insert(id, created.clone());
        Ok(created)
    }

    async fn get_application(&self, id: u64) -> Result<Option<LeaveApplication>, StoreError> {
        Ok(self.state.lock().await.applications.get(&id).cloned())
    }

    async fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decision: Option<Decision>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.applications.get_mut(&id) {
            Some(app) if app.status == from => {
                app.status = to;
                match decision {
                    Some(d) => {
                        app.approved_by = Some(d.decided_by);
                        app.approved_at = Some(d.decided_at);
                        app.rejection_reason = d.rejection_reason;
                    }
                    None => {
                        app.approved_by = None;
                        app.approved_at = None;
                        app.rejection_reason = None;
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_pending(
        &self,
        id: u64,
        owner: u64,
        new: NewLeaveApplication,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.applications.get_mut(&id) {
            Some(app) if app.user_id == owner && app.status == LeaveStatus::Pending => {
                app.leave_type_id = new.leave_type_id;
                app.start_date = new.start_date;
                app.end_date = new.end_date;
                app.is_half_day = new.is_half_day;
                app.is_lop = new.is_lop;
                app.lop_days = new.lop_days;
                app.paid_days = new.paid_days;
                app.reason = new.reason;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pending(&self, id: u64, owner: u64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let removable = matches!(
            state.applications.get(&id),
            Some(app) if app.user_id == owner && app.status == LeaveStatus::Pending
        );
        if removable {
            state.applications.remove(&id);
        }
        Ok(removable)
    }
}

impl CatalogStore for MemoryStore {
    async fn get_leave_type(&self, id: u64) -> Result<Option<LeaveType>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .leave_types
            .get(&id)
            .filter(|t| t.is_active)
            .cloned())
    }
}

/// Day lock over the whole in-memory state; held until the write commits or
/// the lock drops.
pub struct MemoryDayLock {
    guard: OwnedMutexGuard<State>,
}

impl DayLock for MemoryDayLock {
    async fn insert(mut self, entry: NewTimesheetEntry) -> Result<TimesheetEntry, StoreError> {
        let id = self.guard.next_id();
        let created = materialize(id, entry, TimesheetStatus::Draft);
        self.guard.entries.insert(id, created.clone());
        Ok(created)
    }

    async fn update(mut self, entry_id: u64, changes: EntryChanges) -> Result<(), StoreError> {
        if let Some(entry) = self.guard.entries.get_mut(&entry_id) {
            if let Some(task) = changes.task_description {
                entry.task_description = task;
            }
            if let Some(start) = changes.start_time {
                entry.start_time = Some(start);
            }
            if let Some(end) = changes.end_time {
                entry.end_time = Some(end);
            }
            if let Some(hours) = changes.duration_hours {
                entry.duration_hours = hours;
            }
            if let Some(minutes) = changes.break_time_minutes {
                entry.break_time_minutes = minutes;
            }
        }
        Ok(())
    }
}

impl TimesheetStore for MemoryStore {
    type Lock = MemoryDayLock;

    async fn entries_for_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> Result<Vec<TimesheetEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(day_entries(&state, user_id, day, exclude))
    }

    async fn lock_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> Result<(MemoryDayLock, Vec<TimesheetEntry>), StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let entries = day_entries(&guard, user_id, day, exclude);
        Ok((MemoryDayLock { guard }, entries))
    }

    async fn get_entry(&self, id: u64, user_id: u64) -> Result<Option<TimesheetEntry>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .entries
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned())
    }

    async fn delete_draft(&self, id: u64, user_id: u64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let removable = matches!(
            state.entries.get(&id),
            Some(e) if e.user_id == user_id && e.status == TimesheetStatus::Draft
        );
        if removable {
            state.entries.remove(&id);
        }
        Ok(removable)
    }

    async fn mark_submitted(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut submitted = 0;
        for entry in state.entries.values_mut() {
            if entry.user_id == user_id
                && entry.status == TimesheetStatus::Draft
                && entry.entry_date >= from
                && entry.entry_date <= to
            {
                entry.status = TimesheetStatus::Submitted;
                entry.submitted_at = Some(at);
                submitted += 1;
            }
        }
        Ok(submitted)
    }
}
