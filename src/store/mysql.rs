use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::error::StoreError;
use crate::model::{
    EntryChanges, LeaveApplication, LeaveBalance, LeaveStatus, LeaveType, NewLeaveApplication,
    NewTimesheetEntry, TimesheetEntry,
};
use crate::store::{
    ApplicationStore, BalanceKey, BalanceStore, CatalogStore, DayLock, Decision, TimesheetStore,
};

const BALANCE_COLUMNS: &str = "id, user_id, leave_type_id, year, allocated_days, used_days";
const APPLICATION_COLUMNS: &str = "id, user_id, leave_type_id, start_date, end_date, is_half_day, \
     is_lop, lop_days, paid_days, reason, status, approved_by, approved_at, rejection_reason, \
     created_at";
const ENTRY_COLUMNS: &str = "id, user_id, project_id, task_description, entry_date, start_time, \
     end_time, duration_hours, break_time_minutes, status, submitted_at";

/// Production store backed by MySQL. One struct implements all collaborator
/// traits so a single pool handle can be shared across both engines.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl BalanceStore for MySqlStore {
    async fn get_balance(&self, key: BalanceKey) -> Result<Option<LeaveBalance>, StoreError> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE user_id = ? AND leave_type_id = ? AND year = ?"
        );
        let balance = sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind(key.user_id)
            .bind(key.leave_type_id)
            .bind(key.year)
            .fetch_optional(&self.pool)
            .await?;
        Ok(balance)
    }

    async fn store_used_days(
        &self,
        key: BalanceKey,
        expected_used: Decimal,
        new_used: Decimal,
    ) -> Result<bool, StoreError> {
        // The `used_days = ?` guard makes this a single-statement
        // compare-and-swap: a racing writer that got there first leaves
        // zero rows affected and the caller re-reads.
        let result = sqlx::query(
            "UPDATE leave_balances SET used_days = ? \
             WHERE user_id = ? AND leave_type_id = ? AND year = ? AND used_days = ?",
        )
        .bind(new_used)
        .bind(key.user_id)
        .bind(key.leave_type_id)
        .bind(key.year)
        .bind(expected_used)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl ApplicationStore for MySqlStore {
    async fn insert_application(
        &self,
        app: NewLeaveApplication,
    ) -> Result<LeaveApplication, StoreError> {
        let result = sqlx::query(
            "INSERT INTO leave_applications \
                 (user_id, leave_type_id, start_date, end_date, is_half_day, \
                  is_lop, lop_days, paid_days, reason, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending')",
        )
        .bind(app.user_id)
        .bind(app.leave_type_id)
        .bind(app.start_date)
        .bind(app.end_date)
        .bind(app.is_half_day)
        .bind(app.is_lop)
        .bind(app.lop_days)
        .bind(app.paid_days)
        .bind(app.reason)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_id();
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM leave_applications WHERE id = ?");
        let created = sqlx::query_as::<_, LeaveApplication>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn get_application(&self, id: u64) -> Result<Option<LeaveApplication>, StoreError> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM leave_applications WHERE id = ?");
        let app = sqlx::query_as::<_, LeaveApplication>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(app)
    }

    async fn transition(
        &self,
        id: u64,
        from: LeaveStatus,
        to: LeaveStatus,
        decision: Option<Decision>,
    ) -> Result<bool, StoreError> {
        let (decided_by, decided_at, rejection_reason) = match decision {
            Some(d) => (Some(d.decided_by), Some(d.decided_at), d.rejection_reason),
            None => (None, None, None),
        };
        // Guarded on the source status so a lost race shows up as zero rows
        // instead of a silent double transition.
        let result = sqlx::query(
            "UPDATE leave_applications \
             SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(to)
        .bind(decided_by)
        .bind(decided_at)
        .bind(rejection_reason)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_pending(
        &self,
        id: u64,
        owner: u64,
        app: NewLeaveApplication,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE leave_applications \
             SET leave_type_id = ?, start_date = ?, end_date = ?, is_half_day = ?, \
                 is_lop = ?, lop_days = ?, paid_days = ?, reason = ? \
             WHERE id = ? AND user_id = ? AND status = 'pending'",
        )
        .bind(app.leave_type_id)
        .bind(app.start_date)
        .bind(app.end_date)
        .bind(app.is_half_day)
        .bind(app.is_lop)
        .bind(app.lop_days)
        .bind(app.paid_days)
        .bind(app.reason)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_pending(&self, id: u64, owner: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM leave_applications WHERE id = ? AND user_id = ? AND status = 'pending'",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl CatalogStore for MySqlStore {
    async fn get_leave_type(&self, id: u64) -> Result<Option<LeaveType>, StoreError> {
        let leave_type = sqlx::query_as::<_, LeaveType>(
            "SELECT id, name, description, max_days_per_year, is_active \
             FROM leave_types WHERE id = ? AND is_active = true",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(leave_type)
    }
}

/// Open transaction holding row and gap locks on one user's day. The locking
/// read in `lock_day` gap-locks the (user_id, entry_date) index range, so a
/// racing insert for the same day blocks until this commits or drops.
pub struct MySqlDayLock {
    tx: Transaction<'static, MySql>,
}

impl DayLock for MySqlDayLock {
    async fn insert(mut self, entry: NewTimesheetEntry) -> Result<TimesheetEntry, StoreError> {
        let result = sqlx::query(
            "INSERT INTO timesheet_entries \
                 (user_id, project_id, task_description, entry_date, start_time, end_time, \
                  duration_hours, break_time_minutes, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'draft')",
        )
        .bind(entry.user_id)
        .bind(entry.project_id)
        .bind(entry.task_description)
        .bind(entry.entry_date)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.duration_hours)
        .bind(entry.break_time_minutes)
        .execute(&mut *self.tx)
        .await?;

        let id = result.last_insert_id();
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM timesheet_entries WHERE id = ?");
        let created = sqlx::query_as::<_, TimesheetEntry>(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;

        self.tx.commit().await.map_err(StoreError::Database)?;
        Ok(created)
    }

    async fn update(mut self, entry_id: u64, changes: EntryChanges) -> Result<(), StoreError> {
        // Dynamic SET clause with typed binds, same discipline as the
        // balance/application updates above.
        enum Bind {
            Str(String),
            Dt(NaiveDateTime),
            Dec(Decimal),
            I32(i32),
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Bind> = Vec::new();

        if let Some(task) = changes.task_description {
            sets.push("task_description = ?");
            binds.push(Bind::Str(task));
        }
        if let Some(start) = changes.start_time {
            sets.push("start_time = ?");
            binds.push(Bind::Dt(start));
        }
        if let Some(end) = changes.end_time {
            sets.push("end_time = ?");
            binds.push(Bind::Dt(end));
        }
        if let Some(hours) = changes.duration_hours {
            sets.push("duration_hours = ?");
            binds.push(Bind::Dec(hours));
        }
        if let Some(minutes) = changes.break_time_minutes {
            sets.push("break_time_minutes = ?");
            binds.push(Bind::I32(minutes));
        }

        if sets.is_empty() {
            self.tx.commit().await.map_err(StoreError::Database)?;
            return Ok(());
        }

        let sql = format!(
            "UPDATE timesheet_entries SET {} WHERE id = ? AND status = 'draft'",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Bind::Str(v) => query.bind(v),
                Bind::Dt(v) => query.bind(v),
                Bind::Dec(v) => query.bind(v),
                Bind::I32(v) => query.bind(v),
            };
        }
        query.bind(entry_id).execute(&mut *self.tx).await?;

        self.tx.commit().await.map_err(StoreError::Database)?;
        Ok(())
    }
}

impl TimesheetStore for MySqlStore {
    type Lock = MySqlDayLock;

    async fn entries_for_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> Result<Vec<TimesheetEntry>, StoreError> {
        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM timesheet_entries WHERE user_id = ? AND entry_date = ?"
        );
        if exclude.is_some() {
            sql.push_str(" AND id <> ?");
        }
        let mut query = sqlx::query_as::<_, TimesheetEntry>(&sql)
            .bind(user_id)
            .bind(day);
        if let Some(id) = exclude {
            query = query.bind(id);
        }
        let entries = query.fetch_all(&self.pool).await?;
        Ok(entries)
    }

    async fn lock_day(
        &self,
        user_id: u64,
        day: NaiveDate,
        exclude: Option<u64>,
    ) -> Result<(MySqlDayLock, Vec<TimesheetEntry>), StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM timesheet_entries WHERE user_id = ? AND entry_date = ?"
        );
        if exclude.is_some() {
            sql.push_str(" AND id <> ?");
        }
        sql.push_str(" FOR UPDATE");

        let mut query = sqlx::query_as::<_, TimesheetEntry>(&sql)
            .bind(user_id)
            .bind(day);
        if let Some(id) = exclude {
            query = query.bind(id);
        }
        let entries = query.fetch_all(&mut *tx).await?;

        Ok((MySqlDayLock { tx }, entries))
    }

    async fn get_entry(&self, id: u64, user_id: u64) -> Result<Option<TimesheetEntry>, StoreError> {
        let sql =
            format!("SELECT {ENTRY_COLUMNS} FROM timesheet_entries WHERE id = ? AND user_id = ?");
        let entry = sqlx::query_as::<_, TimesheetEntry>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn delete_draft(&self, id: u64, user_id: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM timesheet_entries WHERE id = ? AND user_id = ? AND status = 'draft'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_submitted(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE timesheet_entries SET status = 'submitted', submitted_at = ? \
             WHERE user_id = ? AND status = 'draft' AND entry_date BETWEEN ? AND ?",
        )
        .bind(at)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
