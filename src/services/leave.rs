//! Leave application rules and the approval state machine.
//!
//! Everything here is pure: callers load a [`LeaveSnapshot`], ask for a
//! [`LeaveTransition`], and persist it. The persistence side lives in
//! `api::leave_request`.

use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;

use crate::auth::permissions::{LEAVE_APPROVE_HR, LEAVE_APPROVE_MANAGER, role_has_permission};
use crate::error::AppError;
use crate::model::employee::LeaveBalance;
use crate::model::leave_request::{Approval, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::utils::dates::calculate_working_days;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum LeaveError {
    #[display(fmt = "start_date cannot be after end_date")]
    InvalidRange,
    #[display(fmt = "The selected range contains no working days")]
    NoWorkingDays,
    #[display(fmt = "Insufficient {} leave balance: {} available, {} requested", leave_type, available, requested)]
    InsufficientBalance {
        leave_type: LeaveType,
        available: u32,
        requested: u32,
    },
    #[display(fmt = "Cannot {} a leave request that is {}", action, from)]
    InvalidTransition { from: LeaveStatus, action: &'static str },
    #[display(fmt = "You cannot act on your own leave request")]
    SelfApproval,
    #[display(fmt = "Only the employee's manager can do this")]
    NotDirectReport,
    #[display(fmt = "Only the applicant can cancel a leave request")]
    NotApplicant,
    #[display(fmt = "Not permitted to {} leave requests", _0)]
    NotPermitted(&'static str),
}

impl From<LeaveError> for AppError {
    fn from(e: LeaveError) -> Self {
        match e {
            LeaveError::InvalidRange
            | LeaveError::NoWorkingDays
            | LeaveError::InsufficientBalance { .. }
            | LeaveError::InvalidTransition { .. } => AppError::BadRequest(e.to_string()),
            LeaveError::SelfApproval
            | LeaveError::NotDirectReport
            | LeaveError::NotApplicant
            | LeaveError::NotPermitted(_) => AppError::Forbidden(e.to_string()),
        }
    }
}

/// The parts of a stored leave request the state machine needs.
#[derive(Debug, Clone)]
pub struct LeaveSnapshot {
    pub employee_id: u64,
    /// Manager of the applicant at the time of the action.
    pub applicant_manager_id: Option<u64>,
    pub leave_type: LeaveType,
    pub total_days: u32,
    pub status: LeaveStatus,
}

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum LeaveAction {
    ManagerApprove { remarks: Option<String> },
    HrApprove { remarks: Option<String> },
    Reject { remarks: Option<String> },
    Cancel,
}

impl LeaveAction {
    fn verb(&self) -> &'static str {
        match self {
            LeaveAction::ManagerApprove { .. } | LeaveAction::HrApprove { .. } => "approve",
            LeaveAction::Reject { .. } => "reject",
            LeaveAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStep {
    Manager,
    Hr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveTransition {
    pub from: LeaveStatus,
    pub to: LeaveStatus,
    /// Sign-off to record, and in which slot.
    pub approval: Option<(ApprovalStep, Approval)>,
    /// Days to take off the applicant's balance; only set on final approval of a paid type.
    pub balance_debit: Option<(LeaveType, u32)>,
}

/// Checks a new application and returns the number of working days it covers.
pub fn validate_application(
    start: NaiveDate,
    end: NaiveDate,
    leave_type: LeaveType,
    balance: &LeaveBalance,
) -> Result<u32, LeaveError> {
    if start > end {
        return Err(LeaveError::InvalidRange);
    }
    let days = calculate_working_days(start, end);
    if days == 0 {
        return Err(LeaveError::NoWorkingDays);
    }
    ensure_balance(balance, leave_type, days)?;
    Ok(days)
}

fn ensure_balance(balance: &LeaveBalance, leave_type: LeaveType, days: u32) -> Result<(), LeaveError> {
    match balance.available(leave_type) {
        Some(available) if available < days => Err(LeaveError::InsufficientBalance {
            leave_type,
            available,
            requested: days,
        }),
        _ => Ok(()),
    }
}

/// Balance after taking `days` of `leave_type`. Unpaid leave leaves it unchanged.
pub fn debit(balance: &LeaveBalance, leave_type: LeaveType, days: u32) -> Result<LeaveBalance, LeaveError> {
    ensure_balance(balance, leave_type, days)?;
    let mut next = *balance;
    match leave_type {
        LeaveType::Casual => next.casual -= days,
        LeaveType::Sick => next.sick -= days,
        LeaveType::Earned => next.earned -= days,
        LeaveType::Maternity => next.maternity -= days,
        LeaveType::Paternity => next.paternity -= days,
        LeaveType::Unpaid => {}
    }
    Ok(next)
}

fn is_own(leave: &LeaveSnapshot, actor: &Actor) -> bool {
    actor.employee_id == Some(leave.employee_id)
}

/// Manager-level authority: the applicant's own manager, or anyone who can
/// also give HR approval (HR, admin).
fn check_manager_authority(leave: &LeaveSnapshot, actor: &Actor) -> Result<(), LeaveError> {
    if role_has_permission(actor.role, LEAVE_APPROVE_HR) {
        return Ok(());
    }
    if !role_has_permission(actor.role, LEAVE_APPROVE_MANAGER) {
        return Err(LeaveError::NotPermitted("approve"));
    }
    match (actor.employee_id, leave.applicant_manager_id) {
        (Some(actor_emp), Some(manager)) if actor_emp == manager => Ok(()),
        _ => Err(LeaveError::NotDirectReport),
    }
}

fn sign_off(actor: &Actor, now: DateTime<Utc>, remarks: Option<String>) -> Approval {
    Approval {
        approved_by: actor.user_id,
        approved_at: now,
        remarks,
    }
}

fn final_debit(leave: &LeaveSnapshot) -> Option<(LeaveType, u32)> {
    match leave.leave_type {
        LeaveType::Unpaid => None,
        t => Some((t, leave.total_days)),
    }
}

/// Decides what `action` by `actor` does to `leave`.
///
/// | from              | manager approve  | hr approve | reject   | cancel    |
/// |-------------------|------------------|------------|----------|-----------|
/// | pending           | manager_approved | approved   | rejected | cancelled |
/// | manager_approved  | -                | approved   | rejected | -         |
/// | terminal          | -                | -          | -        | -         |
pub fn apply_action(
    leave: &LeaveSnapshot,
    action: LeaveAction,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<LeaveTransition, LeaveError> {
    let from = leave.status;
    let invalid = |action: &LeaveAction| LeaveError::InvalidTransition {
        from,
        action: action.verb(),
    };

    if let LeaveAction::Cancel = action {
        if !is_own(leave, actor) {
            return Err(LeaveError::NotApplicant);
        }
        if from != LeaveStatus::Pending {
            return Err(invalid(&action));
        }
        return Ok(LeaveTransition {
            from,
            to: LeaveStatus::Cancelled,
            approval: None,
            balance_debit: None,
        });
    }

    if is_own(leave, actor) {
        return Err(LeaveError::SelfApproval);
    }

    match action {
        LeaveAction::ManagerApprove { remarks } => {
            check_manager_authority(leave, actor)?;
            if from != LeaveStatus::Pending {
                return Err(invalid(&LeaveAction::ManagerApprove { remarks }));
            }
            Ok(LeaveTransition {
                from,
                to: LeaveStatus::ManagerApproved,
                approval: Some((ApprovalStep::Manager, sign_off(actor, now, remarks))),
                balance_debit: None,
            })
        }
        LeaveAction::HrApprove { remarks } => {
            if !role_has_permission(actor.role, LEAVE_APPROVE_HR) {
                return Err(LeaveError::NotPermitted("approve"));
            }
            if from.is_terminal() {
                return Err(invalid(&LeaveAction::HrApprove { remarks }));
            }
            Ok(LeaveTransition {
                from,
                to: LeaveStatus::Approved,
                approval: Some((ApprovalStep::Hr, sign_off(actor, now, remarks))),
                balance_debit: final_debit(leave),
            })
        }
        LeaveAction::Reject { remarks } => {
            check_manager_authority(leave, actor)?;
            if from.is_terminal() {
                return Err(invalid(&LeaveAction::Reject { remarks }));
            }
            let step = if role_has_permission(actor.role, LEAVE_APPROVE_HR) {
                ApprovalStep::Hr
            } else {
                ApprovalStep::Manager
            };
            Ok(LeaveTransition {
                from,
                to: LeaveStatus::Rejected,
                approval: Some((step, sign_off(actor, now, remarks))),
                balance_debit: None,
            })
        }
        LeaveAction::Cancel => Err(invalid(&LeaveAction::Cancel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    const APPLICANT: u64 = 40;
    const MANAGER: u64 = 30;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn leave(status: LeaveStatus, leave_type: LeaveType) -> LeaveSnapshot {
        LeaveSnapshot {
            employee_id: APPLICANT,
            applicant_manager_id: Some(MANAGER),
            leave_type,
            total_days: 3,
            status,
        }
    }

    fn actor(role: Role, employee_id: Option<u64>) -> Actor {
        Actor {
            user_id: 900 + employee_id.unwrap_or(0),
            role,
            employee_id,
        }
    }

    fn manager() -> Actor {
        actor(Role::Manager, Some(MANAGER))
    }

    fn hr() -> Actor {
        actor(Role::Hr, Some(20))
    }

    fn applicant() -> Actor {
        actor(Role::Employee, Some(APPLICANT))
    }

    fn balance() -> LeaveBalance {
        LeaveBalance {
            casual: 5,
            sick: 2,
            earned: 10,
            maternity: 0,
            paternity: 0,
        }
    }

    #[test]
    fn application_counts_working_days() {
        // Friday 2026-01-16 .. Tuesday 2026-01-20
        let days = validate_application(d(2026, 1, 16), d(2026, 1, 20), LeaveType::Casual, &balance());
        assert_eq!(days, Ok(3));
    }

    #[test]
    fn application_rejects_inverted_and_weekend_only_ranges() {
        assert_eq!(
            validate_application(d(2026, 1, 20), d(2026, 1, 16), LeaveType::Casual, &balance()),
            Err(LeaveError::InvalidRange)
        );
        assert_eq!(
            validate_application(d(2026, 1, 17), d(2026, 1, 18), LeaveType::Casual, &balance()),
            Err(LeaveError::NoWorkingDays)
        );
    }

    #[test]
    fn application_requires_balance_for_paid_types() {
        let err = validate_application(d(2026, 1, 12), d(2026, 1, 14), LeaveType::Sick, &balance());
        assert_eq!(
            err,
            Err(LeaveError::InsufficientBalance {
                leave_type: LeaveType::Sick,
                available: 2,
                requested: 3
            })
        );
        // unpaid is never limited by balance
        let ok = validate_application(d(2026, 1, 12), d(2026, 1, 30), LeaveType::Unpaid, &balance());
        assert_eq!(ok, Ok(15));
    }

    #[test]
    fn debit_takes_exact_days_from_matching_counter() {
        let after = debit(&balance(), LeaveType::Earned, 4).unwrap();
        assert_eq!(after.earned, 6);
        assert_eq!(after.casual, 5);
        assert_eq!(debit(&balance(), LeaveType::Unpaid, 30).unwrap(), balance());
        assert!(debit(&balance(), LeaveType::Maternity, 1).is_err());
    }

    #[test]
    fn two_step_approval() {
        let first = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Casual),
            LeaveAction::ManagerApprove { remarks: None },
            &manager(),
            now(),
        )
        .unwrap();
        assert_eq!(first.to, LeaveStatus::ManagerApproved);
        assert_eq!(first.approval.as_ref().unwrap().0, ApprovalStep::Manager);
        assert_eq!(first.balance_debit, None);

        let second = apply_action(
            &leave(LeaveStatus::ManagerApproved, LeaveType::Casual),
            LeaveAction::HrApprove {
                remarks: Some("ok".into()),
            },
            &hr(),
            now(),
        )
        .unwrap();
        assert_eq!(second.to, LeaveStatus::Approved);
        let (step, approval) = second.approval.unwrap();
        assert_eq!(step, ApprovalStep::Hr);
        assert_eq!(approval.approved_at, now());
        assert_eq!(approval.remarks.as_deref(), Some("ok"));
        assert_eq!(second.balance_debit, Some((LeaveType::Casual, 3)));
    }

    #[test]
    fn hr_may_approve_directly_from_pending() {
        let t = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Sick),
            LeaveAction::HrApprove { remarks: None },
            &hr(),
            now(),
        )
        .unwrap();
        assert_eq!(t.to, LeaveStatus::Approved);
        assert_eq!(t.balance_debit, Some((LeaveType::Sick, 3)));
    }

    #[test]
    fn unpaid_final_approval_has_no_debit() {
        let t = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Unpaid),
            LeaveAction::HrApprove { remarks: None },
            &hr(),
            now(),
        )
        .unwrap();
        assert_eq!(t.balance_debit, None);
    }

    #[test]
    fn manager_of_someone_else_cannot_approve() {
        let other_manager = actor(Role::Manager, Some(31));
        let err = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Casual),
            LeaveAction::ManagerApprove { remarks: None },
            &other_manager,
            now(),
        );
        assert_eq!(err, Err(LeaveError::NotDirectReport));
    }

    #[test]
    fn manager_cannot_give_hr_approval() {
        let err = apply_action(
            &leave(LeaveStatus::ManagerApproved, LeaveType::Casual),
            LeaveAction::HrApprove { remarks: None },
            &manager(),
            now(),
        );
        assert_eq!(err, Err(LeaveError::NotPermitted("approve")));
    }

    #[test]
    fn nobody_approves_their_own_leave() {
        let mut snapshot = leave(LeaveStatus::Pending, LeaveType::Casual);
        snapshot.employee_id = 20;
        let err = apply_action(&snapshot, LeaveAction::HrApprove { remarks: None }, &hr(), now());
        assert_eq!(err, Err(LeaveError::SelfApproval));
    }

    #[test]
    fn employees_cannot_approve_or_reject() {
        let colleague = actor(Role::Employee, Some(41));
        for action in [
            LeaveAction::ManagerApprove { remarks: None },
            LeaveAction::HrApprove { remarks: None },
            LeaveAction::Reject { remarks: None },
        ] {
            let err = apply_action(&leave(LeaveStatus::Pending, LeaveType::Casual), action, &colleague, now());
            assert_eq!(err, Err(LeaveError::NotPermitted("approve")));
        }
    }

    #[test]
    fn rejection_slot_follows_rejecter_authority() {
        let by_manager = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Casual),
            LeaveAction::Reject { remarks: None },
            &manager(),
            now(),
        )
        .unwrap();
        assert_eq!(by_manager.to, LeaveStatus::Rejected);
        assert_eq!(by_manager.approval.unwrap().0, ApprovalStep::Manager);

        let by_hr = apply_action(
            &leave(LeaveStatus::ManagerApproved, LeaveType::Casual),
            LeaveAction::Reject { remarks: None },
            &hr(),
            now(),
        )
        .unwrap();
        assert_eq!(by_hr.approval.unwrap().0, ApprovalStep::Hr);
        assert_eq!(by_hr.balance_debit, None);
    }

    #[test]
    fn only_applicant_cancels_and_only_while_pending() {
        let t = apply_action(
            &leave(LeaveStatus::Pending, LeaveType::Casual),
            LeaveAction::Cancel,
            &applicant(),
            now(),
        )
        .unwrap();
        assert_eq!(t.to, LeaveStatus::Cancelled);

        assert_eq!(
            apply_action(
                &leave(LeaveStatus::Pending, LeaveType::Casual),
                LeaveAction::Cancel,
                &hr(),
                now()
            ),
            Err(LeaveError::NotApplicant)
        );
        assert!(matches!(
            apply_action(
                &leave(LeaveStatus::ManagerApproved, LeaveType::Casual),
                LeaveAction::Cancel,
                &applicant(),
                now()
            ),
            Err(LeaveError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn transition_table_is_exhaustive() {
        let admin = actor(Role::Admin, Some(1));
        for from in LeaveStatus::iter() {
            let snapshot = leave(from, LeaveType::Earned);
            let manager_approve = apply_action(&snapshot, LeaveAction::ManagerApprove { remarks: None }, &admin, now());
            let hr_approve = apply_action(&snapshot, LeaveAction::HrApprove { remarks: None }, &admin, now());
            let reject = apply_action(&snapshot, LeaveAction::Reject { remarks: None }, &admin, now());
            let cancel = apply_action(&snapshot, LeaveAction::Cancel, &applicant(), now());

            let to = |r: &Result<LeaveTransition, LeaveError>| r.as_ref().ok().map(|t| t.to);
            match from {
                LeaveStatus::Pending => {
                    assert_eq!(to(&manager_approve), Some(LeaveStatus::ManagerApproved));
                    assert_eq!(to(&hr_approve), Some(LeaveStatus::Approved));
                    assert_eq!(to(&reject), Some(LeaveStatus::Rejected));
                    assert_eq!(to(&cancel), Some(LeaveStatus::Cancelled));
                }
                LeaveStatus::ManagerApproved => {
                    assert_eq!(to(&manager_approve), None);
                    assert_eq!(to(&hr_approve), Some(LeaveStatus::Approved));
                    assert_eq!(to(&reject), Some(LeaveStatus::Rejected));
                    assert_eq!(to(&cancel), None);
                }
                _ => {
                    assert!(from.is_terminal());
                    assert_eq!(to(&manager_approve), None);
                    assert_eq!(to(&hr_approve), None);
                    assert_eq!(to(&reject), None);
                    assert_eq!(to(&cancel), None);
                }
            }
        }
    }
}
