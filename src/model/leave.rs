use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Day equivalent of a half-day application (0.5).
pub const HALF_DAY: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Catalog entry for a kind of leave (sick, casual, ...). The catalog is
/// seeded and managed outside the engine; it is only consulted here to
/// validate submissions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaveType {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub max_days_per_year: Option<i32>,
    pub is_active: bool,
}

/// Per (user, leave type, calendar year) ledger row. The identity triple is
/// unique; `allocated_days` is set once at allocation time and never mutated
/// by the engine, `used_days` only ever grows through
/// [`crate::leave::LeaveAccountant::deduct`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaveBalance {
    pub id: u64,
    pub user_id: u64,
    pub leave_type_id: u64,
    pub year: i32,
    pub allocated_days: i32,
    pub used_days: Decimal,
}

impl LeaveBalance {
    /// Always recomputed, never persisted.
    pub fn remaining_days(&self) -> Decimal {
        Decimal::from(self.allocated_days) - self.used_days
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaveApplication {
    pub id: u64,
    pub user_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    /// Paid/LOP split stamped once at submission from the then-current
    /// balance; not recomputed at approval time.
    pub is_lop: bool,
    pub lop_days: Decimal,
    pub paid_days: Decimal,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub approved_by: Option<u64>,
    pub approved_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl LeaveApplication {
    /// 0.5 for a half-day application, otherwise the inclusive day count of
    /// the span. Derived on read, never stored.
    pub fn days_requested(&self) -> Decimal {
        days_requested(self.start_date, self.end_date, self.is_half_day)
    }

    /// Display form of the span, recomputed on read.
    pub fn date_range(&self) -> String {
        if self.start_date == self.end_date {
            self.start_date.format("%d %b %Y").to_string()
        } else {
            format!(
                "{} to {}",
                self.start_date.format("%d %b %Y"),
                self.end_date.format("%d %b %Y")
            )
        }
    }
}

pub fn days_requested(start: NaiveDate, end: NaiveDate, is_half_day: bool) -> Decimal {
    if is_half_day {
        HALF_DAY
    } else {
        Decimal::from((end - start).num_days() + 1)
    }
}

/// Insert shape for a freshly submitted application (id and timestamps are
/// assigned by the store).
#[derive(Debug, Clone)]
pub struct NewLeaveApplication {
    pub user_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub is_lop: bool,
    pub lop_days: Decimal,
    pub paid_days: Decimal,
    pub reason: Option<String>,
}
