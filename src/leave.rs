//! Leave balance / loss-of-pay accounting.
//!
//! [`LeaveAccountant`] owns the authoritative used/allocated ledger per
//! (user, leave type, year) and everything that touches it: the paid/LOP
//! breakdown stamped at submission, the hard-capped deduction at approval,
//! and the approve/reject orchestration with its compensating rollback.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EngineError, StoreError};
use crate::model::{
    LeaveApplication, LeaveBalance, LeaveStatus, NewLeaveApplication, days_requested,
};
use crate::store::{ApplicationStore, BalanceKey, BalanceStore, CatalogStore, Decision};

/// Company policy: 2 leaves accrue per month.
pub const MONTHLY_LEAVE_ALLOCATION: i32 = 2;

/// Annual allocation derived from the monthly accrual.
pub fn annual_leave_allocation() -> i32 {
    MONTHLY_LEAVE_ALLOCATION * 12
}

/// Attempts before giving up on the compare-and-swap deduction loop.
const DEDUCT_RETRIES: u32 = 5;

/// How a requested span splits into paid days and loss-of-pay days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBreakdown {
    pub paid_days: Decimal,
    pub lop_days: Decimal,
    pub is_lop: bool,
}

/// A leave application as submitted by its owner. The caller supplies an
/// authenticated `user_id`; the engine never authorizes by itself.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRequestForm {
    pub user_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_half_day: bool,
    pub reason: Option<String>,
}

pub struct LeaveAccountant<S> {
    store: S,
    timezone: Tz,
}

impl<S> LeaveAccountant<S>
where
    S: BalanceStore + ApplicationStore + CatalogStore,
{
    pub fn new(store: S, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Splits `requested` days into paid and LOP against the current balance.
    ///
    /// Pure projection, no mutation. Used for display and for stamping the
    /// application record before admin review. A missing ledger row is a
    /// data-setup problem surfaced as [`EngineError::BalanceNotFound`], not a
    /// server fault.
    pub async fn compute_breakdown(
        &self,
        user_id: u64,
        leave_type_id: u64,
        year: i32,
        requested: Decimal,
    ) -> Result<LeaveBreakdown, EngineError> {
        if requested <= Decimal::ZERO {
            return Err(EngineError::InvalidDays { days: requested });
        }

        let key = BalanceKey {
            user_id,
            leave_type_id,
            year,
        };
        let balance = self
            .store
            .get_balance(key)
            .await?
            .ok_or(EngineError::BalanceNotFound {
                user_id,
                leave_type_id,
                year,
            })?;

        let remaining = balance.remaining_days();
        if requested <= remaining {
            Ok(LeaveBreakdown {
                paid_days: requested,
                lop_days: Decimal::ZERO,
                is_lop: false,
            })
        } else {
            // Remaining can only go negative transiently here, before the
            // LOP days are excluded from the deduction; clamp so the split
            // still sums to the request.
            let paid_days = remaining.max(Decimal::ZERO);
            Ok(LeaveBreakdown {
                paid_days,
                lop_days: requested - paid_days,
                is_lop: true,
            })
        }
    }

    /// Adds `days_used` to the ledger, refusing to cross `allocated_days`.
    ///
    /// The single and only code path that increases `used_days`. Invoked at
    /// the approval transition, never at submission, and only ever with the
    /// paid portion of a span; LOP days must not reach the ledger. The
    /// read-modify-write is serialized per key by a compare-and-swap on the
    /// previous `used_days`, retried on lost races.
    pub async fn deduct(
        &self,
        user_id: u64,
        leave_type_id: u64,
        year: i32,
        days_used: Decimal,
    ) -> Result<LeaveBalance, EngineError> {
        if days_used <= Decimal::ZERO {
            return Err(EngineError::InvalidDays { days: days_used });
        }

        let key = BalanceKey {
            user_id,
            leave_type_id,
            year,
        };
        for _ in 0..DEDUCT_RETRIES {
            let balance =
                self.store
                    .get_balance(key)
                    .await?
                    .ok_or(EngineError::BalanceNotFound {
                        user_id,
                        leave_type_id,
                        year,
                    })?;

            let new_used = balance.used_days + days_used;
            if new_used > Decimal::from(balance.allocated_days) {
                return Err(EngineError::InsufficientBalance {
                    requested: days_used,
                    remaining: balance.remaining_days(),
                });
            }

            if self
                .store
                .store_used_days(key, balance.used_days, new_used)
                .await?
            {
                info!(
                    user_id,
                    used = %new_used,
                    remaining = %(Decimal::from(balance.allocated_days) - new_used),
                    "updated leave balance"
                );
                return Ok(LeaveBalance {
                    used_days: new_used,
                    ..balance
                });
            }
            // Lost the swap to a concurrent deduction; re-read and retry.
        }

        Err(StoreError::Conflict {
            key: key.to_string(),
        }
        .into())
    }

    /// Files a pending application. The paid/LOP split is computed from the
    /// then-current balance and stamped onto the record; it is not
    /// recomputed at approval time. No deduction happens here.
    pub async fn submit(&self, form: LeaveRequestForm) -> Result<LeaveApplication, EngineError> {
        let new = self.build_application(&form).await?;
        let app = self.store.insert_application(new).await?;
        info!(
            user_id = form.user_id,
            application_id = app.id,
            paid_days = %app.paid_days,
            lop_days = %app.lop_days,
            "leave application submitted"
        );
        Ok(app)
    }

    /// Approves a pending application and deducts its paid days.
    ///
    /// Single orchestrating operation: the status moves to approved first,
    /// then the ledger is charged. If the deduction fails the status is
    /// rolled back to pending and the deduction error is surfaced: an
    /// approval is not durable until its deduction has succeeded.
    pub async fn approve(
        &self,
        id: u64,
        approver_id: u64,
    ) -> Result<LeaveApplication, EngineError> {
        self.pending_application(id).await?;

        let moved = self
            .store
            .transition(
                id,
                LeaveStatus::Pending,
                LeaveStatus::Approved,
                Some(Decision {
                    decided_by: approver_id,
                    decided_at: self.now_local(),
                    rejection_reason: None,
                }),
            )
            .await?;
        if !moved {
            return Err(self.not_pending(id).await?);
        }

        // Re-read after the status change: an owner revision can re-stamp
        // the split up to the moment the transition lands, and the ledger
        // must be charged what the approved record actually says.
        let app = self.reload(id).await?;

        // Only the paid portion reaches the ledger; a fully-LOP approval
        // deducts nothing.
        if app.paid_days > Decimal::ZERO {
            let year = app.start_date.year();
            if let Err(deduction_err) = self
                .deduct(app.user_id, app.leave_type_id, year, app.paid_days)
                .await
            {
                let rolled_back = self
                    .store
                    .transition(id, LeaveStatus::Approved, LeaveStatus::Pending, None)
                    .await?;
                if !rolled_back {
                    error!(
                        application_id = id,
                        "failed to roll back approval after deduction failure"
                    );
                }
                return Err(deduction_err);
            }
        }

        Ok(app)
    }

    /// Rejects a pending application. No balance effect, nothing to roll
    /// back.
    pub async fn reject(
        &self,
        id: u64,
        approver_id: u64,
        rejection_reason: Option<String>,
    ) -> Result<LeaveApplication, EngineError> {
        self.pending_application(id).await?;

        let moved = self
            .store
            .transition(
                id,
                LeaveStatus::Pending,
                LeaveStatus::Rejected,
                Some(Decision {
                    decided_by: approver_id,
                    decided_at: self.now_local(),
                    rejection_reason,
                }),
            )
            .await?;
        if !moved {
            return Err(self.not_pending(id).await?);
        }

        self.reload(id).await
    }

    /// Owner edit, allowed only while pending. The paid/LOP split is
    /// re-stamped from the balance as it stands now.
    pub async fn revise(
        &self,
        id: u64,
        form: LeaveRequestForm,
    ) -> Result<LeaveApplication, EngineError> {
        let owner = form.user_id;
        let new = self.build_application(&form).await?;

        if !self.store.update_pending(id, owner, new).await? {
            return Err(self.owner_edit_failure(id, owner).await?);
        }
        self.reload(id).await
    }

    /// Owner delete, allowed only while pending.
    pub async fn withdraw(&self, id: u64, owner: u64) -> Result<(), EngineError> {
        if self.store.delete_pending(id, owner).await? {
            Ok(())
        } else {
            Err(self.owner_edit_failure(id, owner).await?)
        }
    }

    async fn build_application(
        &self,
        form: &LeaveRequestForm,
    ) -> Result<NewLeaveApplication, EngineError> {
        if form.end_date < form.start_date {
            return Err(EngineError::InvalidDateRange {
                start: form.start_date,
                end: form.end_date,
            });
        }
        self.store
            .get_leave_type(form.leave_type_id)
            .await?
            .ok_or(EngineError::UnknownLeaveType {
                leave_type_id: form.leave_type_id,
            })?;

        let requested = days_requested(form.start_date, form.end_date, form.is_half_day);
        let breakdown = self
            .compute_breakdown(
                form.user_id,
                form.leave_type_id,
                form.start_date.year(),
                requested,
            )
            .await?;

        Ok(NewLeaveApplication {
            user_id: form.user_id,
            leave_type_id: form.leave_type_id,
            start_date: form.start_date,
            end_date: form.end_date,
            is_half_day: form.is_half_day,
            is_lop: breakdown.is_lop,
            lop_days: breakdown.lop_days,
            paid_days: breakdown.paid_days,
            reason: form.reason.clone(),
        })
    }

    async fn pending_application(&self, id: u64) -> Result<LeaveApplication, EngineError> {
        let app = self
            .store
            .get_application(id)
            .await?
            .ok_or(EngineError::ApplicationNotFound { id })?;
        if app.status != LeaveStatus::Pending {
            return Err(EngineError::NotPending {
                id,
                status: app.status,
            });
        }
        Ok(app)
    }

    async fn reload(&self, id: u64) -> Result<LeaveApplication, EngineError> {
        self.store
            .get_application(id)
            .await?
            .ok_or(EngineError::ApplicationNotFound { id })
    }

    /// Distinguishes why a guarded status transition matched no row: the
    /// application vanished, or a rival decision got there first.
    async fn not_pending(&self, id: u64) -> Result<EngineError, EngineError> {
        match self.store.get_application(id).await? {
            None => Ok(EngineError::ApplicationNotFound { id }),
            Some(app) => Ok(EngineError::NotPending {
                id,
                status: app.status,
            }),
        }
    }

    /// Distinguishes why a guarded owner mutation matched no row.
    async fn owner_edit_failure(&self, id: u64, owner: u64) -> Result<EngineError, EngineError> {
        match self.store.get_application(id).await? {
            // Someone else's application reads as not-found to its caller.
            None => Ok(EngineError::ApplicationNotFound { id }),
            Some(app) if app.user_id != owner => Ok(EngineError::ApplicationNotFound { id }),
            Some(app) => Ok(EngineError::NotPending {
                id,
                status: app.status,
            }),
        }
    }

    fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}
