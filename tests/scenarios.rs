//! End-to-end scenarios across both engines, backed by the in-memory store.
//!
//! Covers:
//! - Fully paid leave: submit and approve within balance
//! - Paid/LOP split when the request exceeds the remaining balance
//! - Ledger hard cap after the balance is exhausted
//! - Timesheet overlap rejection referencing the conflicting entry
//! - Daily-cap rejection with current and attempted hours
//! - Property checks for the breakdown split, the overlap predicate and
//!   the daily cap

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use hrm_core::model::TimesheetStatus;
use hrm_core::store::{BalanceKey, MemoryStore};
use hrm_core::timesheet::{check_daily_cap, overlaps};
use hrm_core::{
    DAILY_HOURS_CAP, EngineError, EntryDraft, LeaveAccountant, LeaveRequestForm, TimesheetGuard,
};

const USER: u64 = 7;
const CASUAL: u64 = 3;
const PROJECT: u64 = 4;
const ADMIN: u64 = 1;
const YEAR: i32 = 2024;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

fn key() -> BalanceKey {
    BalanceKey {
        user_id: USER,
        leave_type_id: CASUAL,
        year: YEAR,
    }
}

async fn seeded_accountant(
    allocated: i32,
    used: &str,
) -> (LeaveAccountant<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    store.put_balance(key(), allocated, dec(used)).await;
    store.put_leave_type(CASUAL, "Casual Leave").await;
    (
        LeaveAccountant::new(store.clone(), chrono_tz::Asia::Kolkata),
        store,
    )
}

fn guard(store: &MemoryStore) -> TimesheetGuard<MemoryStore> {
    TimesheetGuard::new(store.clone(), chrono_tz::Asia::Kolkata)
}

fn leave_form(start: &str, end: &str) -> LeaveRequestForm {
    LeaveRequestForm {
        user_id: USER,
        leave_type_id: CASUAL,
        start_date: date(start),
        end_date: date(end),
        is_half_day: false,
        reason: Some("personal".to_string()),
    }
}

fn entry_draft(day: &str, start: Option<&str>, end: Option<&str>, hours: &str) -> EntryDraft {
    EntryDraft {
        user_id: USER,
        project_id: PROJECT,
        task_description: "implementation".to_string(),
        entry_date: date(day),
        start_time: start.map(str::to_string),
        end_time: end.map(str::to_string),
        duration_hours: dec(hours),
        break_time_minutes: 0,
    }
}

#[tokio::test]
async fn fully_paid_leave_submitted_and_approved() {
    let (accountant, store) = seeded_accountant(12, "0").await;

    let app = accountant
        .submit(leave_form("2024-05-06", "2024-05-10"))
        .await
        .unwrap();
    assert_eq!(app.paid_days, dec("5"));
    assert_eq!(app.lop_days, Decimal::ZERO);
    assert!(!app.is_lop);
    // Nothing deducted until the approval lands.
    assert_eq!(store.balance(key()).await.unwrap().used_days, Decimal::ZERO);

    accountant.approve(app.id, ADMIN).await.unwrap();
    let balance = store.balance(key()).await.unwrap();
    assert_eq!(balance.used_days, dec("5"));
    assert_eq!(balance.remaining_days(), dec("7"));
}

#[tokio::test]
async fn lop_split_deducts_only_paid_days_and_then_caps_out() {
    let (accountant, store) = seeded_accountant(12, "10").await;

    // Four days requested against two remaining: two paid, two LOP.
    let app = accountant
        .submit(leave_form("2024-05-06", "2024-05-09"))
        .await
        .unwrap();
    assert_eq!(app.paid_days, dec("2"));
    assert_eq!(app.lop_days, dec("2"));
    assert!(app.is_lop);

    accountant.approve(app.id, ADMIN).await.unwrap();
    assert_eq!(store.balance(key()).await.unwrap().used_days, dec("12"));

    // The ledger is now full; charging the LOP days by mistake must fail
    // without moving it.
    let err = accountant
        .deduct(USER, CASUAL, YEAR, dec("2"))
        .await
        .unwrap_err();
    match err {
        EngineError::InsufficientBalance {
            requested,
            remaining,
        } => {
            assert_eq!(requested, dec("2"));
            assert_eq!(remaining, Decimal::ZERO);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }
    assert_eq!(store.balance(key()).await.unwrap().used_days, dec("12"));
}

#[tokio::test]
async fn overlapping_entry_is_rejected_with_the_conflict() {
    let store = MemoryStore::new();
    let existing = guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("09:00"),
            Some("12:00"),
            "3",
        ))
        .await
        .unwrap();

    let err = guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("11:30"),
            Some("14:00"),
            "2.5",
        ))
        .await
        .unwrap_err();
    match err {
        EngineError::TimeOverlap {
            entry_id,
            start,
            end,
        } => {
            assert_eq!(entry_id, existing.id);
            assert_eq!(start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
            assert_eq!(end, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        }
        other => panic!("expected TimeOverlap, got {other:?}"),
    }
}

#[tokio::test]
async fn crossing_the_daily_cap_is_rejected() {
    let store = MemoryStore::new();
    guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("09:00"),
            Some("13:00"),
            "4",
        ))
        .await
        .unwrap();
    guard(&store)
        .admit(entry_draft("2024-05-01", None, None, "3.5"))
        .await
        .unwrap();

    let err = guard(&store)
        .admit(entry_draft("2024-05-01", None, None, "1"))
        .await
        .unwrap_err();
    match err {
        EngineError::DailyCapExceeded { current, attempted } => {
            assert_eq!(current, dec("7.5"));
            assert_eq!(attempted, dec("1"));
        }
        other => panic!("expected DailyCapExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn abutting_entries_share_a_boundary_without_conflict() {
    let store = MemoryStore::new();
    guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("09:00"),
            Some("13:00"),
            "4",
        ))
        .await
        .unwrap();
    guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("13:00"),
            Some("17:00"),
            "4",
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn submitted_week_is_closed_to_further_edits() {
    let store = MemoryStore::new();
    let entry = guard(&store)
        .admit(entry_draft(
            "2024-05-01",
            Some("09:00"),
            Some("13:00"),
            "4",
        ))
        .await
        .unwrap();

    let submitted = guard(&store)
        .submit_range(USER, date("2024-04-29"), date("2024-05-05"))
        .await
        .unwrap();
    assert_eq!(submitted, 1);
    assert_eq!(
        store.entry(entry.id).await.unwrap().status,
        TimesheetStatus::Submitted
    );

    let err = guard(&store).remove(entry.id, USER).await.unwrap_err();
    assert!(matches!(err, EngineError::EntrySubmitted { .. }));
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn half_days(halves: u32) -> Decimal {
    // 1 half = 0.5 days.
    Decimal::new(5 * i64::from(halves), 1)
}

fn minute(day: NaiveDate, offset: i64) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).unwrap() + Duration::minutes(offset)
}

proptest! {
    /// The split always sums back to the request, the paid part never
    /// exceeds what remains, and LOP is flagged exactly when the request
    /// spills over.
    #[test]
    fn breakdown_split_sums_to_the_request(
        allocated in 0i32..=30,
        used_halves in 0u32..=60,
        requested_halves in 1u32..=60,
    ) {
        let used = half_days(used_halves).min(Decimal::from(allocated));
        let requested = half_days(requested_halves);

        let breakdown = block_on(async {
            let store = MemoryStore::new();
            store.put_balance(key(), allocated, used).await;
            LeaveAccountant::new(store, chrono_tz::Asia::Kolkata)
                .compute_breakdown(USER, CASUAL, YEAR, requested)
                .await
                .unwrap()
        });

        let remaining = Decimal::from(allocated) - used;
        prop_assert_eq!(breakdown.paid_days + breakdown.lop_days, requested);
        prop_assert!(breakdown.paid_days <= remaining.max(Decimal::ZERO));
        prop_assert_eq!(breakdown.is_lop, requested > remaining);
        prop_assert_eq!(breakdown.is_lop, breakdown.lop_days > Decimal::ZERO);
    }

    /// Half-open intersection, including symmetry and shared endpoints.
    #[test]
    fn overlap_matches_the_half_open_formula(
        s1 in 0i64..1439,
        len1 in 1i64..=480,
        s2 in 0i64..1439,
        len2 in 1i64..=480,
    ) {
        let day = date("2024-05-01");
        let (a1, b1) = (minute(day, s1), minute(day, s1 + len1));
        let (a2, b2) = (minute(day, s2), minute(day, s2 + len2));

        prop_assert_eq!(overlaps(a1, b1, a2, b2), a1 < b2 && a2 < b1);
        prop_assert_eq!(overlaps(a1, b1, a2, b2), overlaps(a2, b2, a1, b1));
        // An interval starting exactly where another ends never conflicts.
        prop_assert!(!overlaps(a1, b1, b1, b1 + Duration::minutes(30)));
    }

    /// Admission against a day holding `s` hours succeeds iff `s + h <= 8`.
    #[test]
    fn daily_cap_admits_exactly_up_to_eight_hours(
        existing_halves in proptest::collection::vec(1u32..=8, 0..4),
        additional_halves in 1u32..=20,
    ) {
        let entries: Vec<_> = existing_halves
            .iter()
            .enumerate()
            .map(|(i, halves)| materialized_entry(i as u64 + 1, half_days(*halves)))
            .collect();
        let sum: Decimal = entries.iter().map(|e| e.duration_hours).sum();
        let additional = half_days(additional_halves);

        let result = check_daily_cap(&entries, additional);
        if sum + additional <= DAILY_HOURS_CAP {
            prop_assert!(result.is_ok());
        } else {
            let rejected = matches!(
                result,
                Err(EngineError::DailyCapExceeded { current, attempted })
                    if current == sum && attempted == additional
            );
            prop_assert!(rejected);
        }
    }
}

fn materialized_entry(id: u64, hours: Decimal) -> hrm_core::model::TimesheetEntry {
    hrm_core::model::TimesheetEntry {
        id,
        user_id: USER,
        project_id: PROJECT,
        task_description: "work".to_string(),
        entry_date: date("2024-05-01"),
        start_time: None,
        end_time: None,
        duration_hours: hours,
        break_time_minutes: 0,
        status: TimesheetStatus::Draft,
        submitted_at: None,
    }
}
