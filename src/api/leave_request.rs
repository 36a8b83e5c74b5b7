use crate::{
    api::Paginated,
    auth::{
        auth::AuthUser,
        permissions::{LEAVE_APPLY, LEAVE_READ_ALL, LEAVE_READ_OWN, LEAVE_READ_TEAM},
    },
    cache::{CacheHandle, employee_key},
    error::{AppError, AppResult},
    model::{
        employee::LeaveBalance,
        leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveRequestRow, LeaveStatus, LeaveType},
    },
    services::{
        audit::{self, AuditEntry},
        leave::{
            ApprovalStep, LeaveAction, LeaveError, LeaveSnapshot, LeaveTransition, apply_action, debit,
            validate_application,
        },
    },
    utils::{
        db_utils::{Filter, bind_values, paginate},
        validation::validate_payload,
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySqlPool, prelude::FromRow};
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "casual")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    #[schema(example = "Family function")]
    pub reason: Option<String>,
}

/// Optional body of approve / reject calls.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct LeaveDecision {
    #[validate(length(max = 255, message = "Remarks are limited to 255 characters"))]
    #[schema(example = "Enjoy")]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    /// Filter by leave type
    pub leave_type: Option<LeaveType>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

/// Locked view of a leave request and its applicant, read inside the approval transaction.
#[derive(Debug, FromRow)]
struct LeaveForUpdate {
    employee_id: u64,
    leave_type: String,
    total_days: u32,
    status: String,
    manager_id: Option<u64>,
    #[sqlx(flatten)]
    balance: LeaveBalance,
}

impl LeaveForUpdate {
    fn snapshot(&self) -> AppResult<LeaveSnapshot> {
        let parse_err = |what: &str, value: &str| {
            error!(what, value, "Unreadable leave row");
            AppError::Internal
        };
        Ok(LeaveSnapshot {
            employee_id: self.employee_id,
            applicant_manager_id: self.manager_id,
            leave_type: self
                .leave_type
                .parse()
                .map_err(|_| parse_err("leave_type", &self.leave_type))?,
            total_days: self.total_days,
            status: self.status.parse().map_err(|_| parse_err("status", &self.status))?,
        })
    }
}

fn into_api(row: LeaveRequestRow) -> AppResult<LeaveRequest> {
    LeaveRequest::try_from(row).map_err(|e| {
        error!(error = %e, "Unreadable leave row");
        AppError::Internal
    })
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 12,
            "total_days": 3,
            "status": "pending"
         })
        ),
        (status = 400, description = "Invalid range, no working days or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    auth.require_permission(LEAVE_APPLY)?;
    let employee_id = auth.require_employee_id()?;
    validate_payload(&*payload)?;

    // 1️⃣ validate dates
    if payload.start_date > payload.end_date {
        return Err(LeaveError::InvalidRange.into());
    }

    // 2️⃣ check working days and balance
    let balance = sqlx::query_as::<_, LeaveBalance>(
        r#"
        SELECT casual_leave, sick_leave, earned_leave, maternity_leave, paternity_leave
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Employee not found".into()))?;

    let total_days = validate_application(payload.start_date, payload.end_date, payload.leave_type, &balance)?;

    // 3️⃣ insert request
    let id = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, total_days, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type.to_string())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(total_days)
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending.to_string())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to create leave request");
        AppError::Internal
    })?
    .last_insert_id();

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "apply",
            entity: "leave_request",
            entity_id: Some(id),
            changes: Some(json!({
                "leave_type": payload.leave_type,
                "start_date": payload.start_date,
                "end_date": payload.end_date,
                "total_days": total_days,
            })),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "total_days": total_days,
        "status": LeaveStatus::Pending
    })))
}

/* =========================
List leave requests
========================= */
/// Lists what the caller may see: everything, their team plus their own, or only their own.
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave requests", body = crate::api::LeavePage),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn list_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let mut filter = Filter::new();
    if auth.can(LEAVE_READ_ALL) {
        // no scope restriction
    } else if auth.can(LEAVE_READ_TEAM) {
        let me = auth.require_employee_id()?;
        filter.and_many(
            "(employee_id = ? OR employee_id IN (SELECT id FROM employees WHERE manager_id = ?))",
            [me, me],
        );
    } else {
        auth.require_permission(LEAVE_READ_OWN)?;
        filter.and("employee_id = ?", auth.require_employee_id()?);
    }

    if let Some(employee_id) = query.employee_id {
        filter.and("employee_id = ?", employee_id);
    }
    if let Some(status) = query.status {
        filter.and("status = ?", status.to_string());
    }
    if let Some(leave_type) = query.leave_type {
        filter.and("leave_type = ?", leave_type.to_string());
    }
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests {}", where_clause);
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {} FROM leave_requests {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        LEAVE_COLUMNS, where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching leave requests");

    let rows = bind_values!(sqlx::query_as::<_, LeaveRequestRow>(&data_sql), filter.values.iter())
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    let data = rows.into_iter().map(into_api).collect::<AppResult<Vec<_>>>()?;

    Ok(HttpResponse::Ok().json(Paginated {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 404, description = "Leave request not found"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave_id = path.into_inner();

    let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", LEAVE_COLUMNS);
    let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(leave_id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("Leave request not found".into()))?;

    let own = auth.employee_id == Some(row.employee_id);
    let visible = auth.can(LEAVE_READ_ALL)
        || (own && auth.can(LEAVE_READ_OWN))
        || (auth.can(LEAVE_READ_TEAM) && {
            let manager_id = sqlx::query_scalar::<_, Option<u64>>("SELECT manager_id FROM employees WHERE id = ?")
                .bind(row.employee_id)
                .fetch_optional(pool.get_ref())
                .await?
                .flatten();
            manager_id.is_some() && manager_id == auth.employee_id
        });

    if !visible {
        return Err(AppError::Forbidden("Not allowed to view this leave request".into()));
    }

    Ok(HttpResponse::Ok().json(into_api(row)?))
}

fn approval_columns(step: ApprovalStep) -> (&'static str, &'static str, &'static str) {
    match step {
        ApprovalStep::Manager => ("manager_approved_by", "manager_approved_at", "manager_remarks"),
        ApprovalStep::Hr => ("hr_approved_by", "hr_approved_at", "hr_remarks"),
    }
}

/// Employee cache entries made stale by a committed transition; a balance
/// debit changes the applicant's cached `leave_balance`.
fn stale_employee_keys(employee_id: u64, transition: &LeaveTransition) -> Vec<String> {
    transition
        .balance_debit
        .map(|_| employee_key(employee_id))
        .into_iter()
        .collect()
}

/// Loads, decides and persists one workflow step in a single transaction.
async fn run_transition(
    auth: &AuthUser,
    pool: &MySqlPool,
    cache: &CacheHandle,
    leave_id: u64,
    action: LeaveAction,
    audit_action: &str,
) -> AppResult<LeaveTransition> {
    let mut tx = pool.begin().await?;

    // 1️⃣ lock the request and the applicant's balance row
    let locked = sqlx::query_as::<_, LeaveForUpdate>(
        r#"
        SELECT l.employee_id, l.leave_type, l.total_days, l.status, e.manager_id,
               e.casual_leave, e.sick_leave, e.earned_leave, e.maternity_leave, e.paternity_leave
        FROM leave_requests l
        JOIN employees e ON e.id = l.employee_id
        WHERE l.id = ?
        FOR UPDATE
        "#,
    )
    .bind(leave_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Leave request not found".into()))?;

    // 2️⃣ decide
    let snapshot = locked.snapshot()?;
    let transition = apply_action(&snapshot, action, &auth.actor(), Utc::now())?;

    // 3️⃣ status and sign-off
    let result = match &transition.approval {
        Some((step, approval)) => {
            let (by, at, remarks) = approval_columns(*step);
            let sql = format!(
                "UPDATE leave_requests SET status = ?, {by} = ?, {at} = ?, {remarks} = ? WHERE id = ? AND status = ?"
            );
            sqlx::query(&sql)
                .bind(transition.to.to_string())
                .bind(approval.approved_by)
                .bind(approval.approved_at)
                .bind(&approval.remarks)
                .bind(leave_id)
                .bind(transition.from.to_string())
                .execute(&mut *tx)
                .await?
        }
        None => {
            sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
                .bind(transition.to.to_string())
                .bind(leave_id)
                .bind(transition.from.to_string())
                .execute(&mut *tx)
                .await?
        }
    };
    if result.rows_affected() == 0 {
        return Err(AppError::Conflict("Leave request was changed concurrently".into()));
    }

    // 4️⃣ balance, guarded so it can never go negative
    if let Some((leave_type, days)) = transition.balance_debit {
        debit(&locked.balance, leave_type, days)?;
        if let Some(column) = LeaveBalance::column(leave_type) {
            let sql = format!("UPDATE employees SET {column} = {column} - ? WHERE id = ? AND {column} >= ?");
            let debited = sqlx::query(&sql)
                .bind(days)
                .bind(snapshot.employee_id)
                .bind(days)
                .execute(&mut *tx)
                .await?;
            if debited.rows_affected() == 0 {
                return Err(LeaveError::InsufficientBalance {
                    leave_type,
                    available: locked.balance.available(leave_type).unwrap_or(0),
                    requested: days,
                }
                .into());
            }
        }
    }

    tx.commit().await?;

    for key in stale_employee_keys(snapshot.employee_id, &transition) {
        cache.invalidate(&key).await;
    }

    info!(
        leave_id,
        from = %transition.from,
        to = %transition.to,
        actor = auth.user_id,
        "Leave request transitioned"
    );

    audit::record(
        pool,
        AuditEntry {
            user_id: Some(auth.user_id),
            action: audit_action,
            entity: "leave_request",
            entity_id: Some(leave_id),
            changes: Some(json!({
                "from": transition.from,
                "to": transition.to,
                "remarks": transition.approval.as_ref().and_then(|(_, a)| a.remarks.clone()),
                "debited_days": transition.balance_debit.map(|(_, d)| d),
            })),
        },
    )
    .await;

    Ok(transition)
}

fn remarks(body: Option<web::Json<LeaveDecision>>) -> AppResult<Option<String>> {
    let decision = body.map(web::Json::into_inner).unwrap_or_default();
    validate_payload(&decision)?;
    Ok(decision.remarks.filter(|r| !r.trim().is_empty()))
}

fn transitioned(message: &str, transition: &LeaveTransition) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": message,
        "status": transition.to
    }))
}

/* =========================
Manager approval
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/manager-approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = Option<LeaveDecision>, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved by manager", body = Object, example = json!({
            "message": "Leave approved by manager",
            "status": "manager_approved"
        })),
        (status = 400, description = "Leave request already processed"),
        (status = 403, description = "Not the applicant's manager"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn manager_approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> AppResult<HttpResponse> {
    let action = LeaveAction::ManagerApprove { remarks: remarks(body)? };
    let transition = run_transition(
        &auth,
        pool.get_ref(),
        cache.get_ref(),
        path.into_inner(),
        action,
        "manager_approve",
    )
    .await?;
    Ok(transitioned("Leave approved by manager", &transition))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = Option<LeaveDecision>, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved",
            "status": "approved"
        })),
        (status = 400, description = "Already processed or insufficient balance"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> AppResult<HttpResponse> {
    let action = LeaveAction::HrApprove { remarks: remarks(body)? };
    let transition = run_transition(
        &auth,
        pool.get_ref(),
        cache.get_ref(),
        path.into_inner(),
        action,
        "approve",
    )
    .await?;
    Ok(transitioned("Leave approved", &transition))
}

/* =========================
Reject leave
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body(content = Option<LeaveDecision>, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected",
            "status": "rejected"
        })),
        (status = 400, description = "Leave request already processed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
    body: Option<web::Json<LeaveDecision>>,
) -> AppResult<HttpResponse> {
    let action = LeaveAction::Reject { remarks: remarks(body)? };
    let transition = run_transition(
        &auth,
        pool.get_ref(),
        cache.get_ref(),
        path.into_inner(),
        action,
        "reject",
    )
    .await?;
    Ok(transitioned("Leave rejected", &transition))
}

/* =========================
Cancel leave (applicant)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave cancelled",
            "status": "cancelled"
        })),
        (status = 400, description = "Only pending requests can be cancelled"),
        (status = 403, description = "Not the applicant"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let transition = run_transition(
        &auth,
        pool.get_ref(),
        cache.get_ref(),
        path.into_inner(),
        LeaveAction::Cancel,
        "cancel",
    )
    .await?;
    Ok(transitioned("Leave cancelled", &transition))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked(leave_type: &str, status: &str) -> LeaveForUpdate {
        LeaveForUpdate {
            employee_id: 4,
            leave_type: leave_type.into(),
            total_days: 2,
            status: status.into(),
            manager_id: Some(3),
            balance: LeaveBalance::default_allocation(),
        }
    }

    #[test]
    fn locked_row_becomes_snapshot() {
        let snapshot = locked("earned", "manager_approved").snapshot().unwrap();
        assert_eq!(snapshot.leave_type, LeaveType::Earned);
        assert_eq!(snapshot.status, LeaveStatus::ManagerApproved);
        assert_eq!(snapshot.applicant_manager_id, Some(3));
    }

    #[test]
    fn unreadable_row_is_internal_error() {
        assert!(matches!(locked("annual", "pending").snapshot(), Err(AppError::Internal)));
    }

    #[test]
    fn approval_slots() {
        assert_eq!(approval_columns(ApprovalStep::Hr).0, "hr_approved_by");
        assert_eq!(approval_columns(ApprovalStep::Manager).2, "manager_remarks");
    }

    #[test]
    fn final_approval_clears_the_applicants_cached_record() {
        let approved = LeaveTransition {
            from: LeaveStatus::ManagerApproved,
            to: LeaveStatus::Approved,
            approval: None,
            balance_debit: Some((LeaveType::Casual, 3)),
        };
        assert_eq!(stale_employee_keys(4, &approved), vec![employee_key(4)]);

        let rejected = LeaveTransition {
            from: LeaveStatus::Pending,
            to: LeaveStatus::Rejected,
            approval: None,
            balance_debit: None,
        };
        assert!(stale_employee_keys(4, &rejected).is_empty());
    }

    #[test]
    fn blank_remarks_are_dropped() {
        let body = web::Json(LeaveDecision {
            remarks: Some("   ".into()),
        });
        assert_eq!(remarks(Some(body)).unwrap(), None);
        assert_eq!(remarks(None).unwrap(), None);
    }
}
