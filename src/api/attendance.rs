use crate::{
    api::Paginated,
    auth::{
        auth::AuthUser,
        permissions::{ATTENDANCE_MARK, ATTENDANCE_READ_ALL},
    },
    db::is_constraint_violation,
    error::{AppError, AppResult},
    model::attendance::Attendance,
    utils::db_utils::{Filter, bind_values, paginate},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    /// Only honoured for callers who can read everyone's attendance
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_permission(ATTENDANCE_MARK)?;
    let employee_id = auth.require_employee_id()?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in)
        VALUES (?, CURDATE(), CURTIME())
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "message": "Checked in successfully"
        }))),
        // Duplicate check-in for same day
        Err(e) if is_constraint_violation(&e) => {
            Err(AppError::BadRequest("Already checked in today".into()))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Check-in failed");
            Err(AppError::Internal)
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/v1/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    auth.require_permission(ATTENDANCE_MARK)?;
    let employee_id = auth.require_employee_id()?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = CURTIME()
        WHERE employee_id = ?
        AND date = CURDATE()
        AND check_out IS NULL
        "#,
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Check-out failed");
        AppError::Internal
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest("No active check-in found for today".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully"
    })))
}

/// Attendance history; callers without `attendance:read_all` only see their own.
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records", body = crate::api::AttendancePage),
        (status = 400, description = "from is after to"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::BadRequest("from cannot be after to".into()));
        }
    }

    let mut filter = Filter::new();
    if auth.can(ATTENDANCE_READ_ALL) {
        if let Some(employee_id) = query.employee_id {
            filter.and("employee_id = ?", employee_id);
        }
    } else {
        auth.require_permission(ATTENDANCE_MARK)?;
        filter.and("employee_id = ?", auth.require_employee_id()?);
    }
    if let Some(from) = query.from {
        filter.and("date >= ?", from);
    }
    if let Some(to) = query.to {
        filter.and("date <= ?", to);
    }
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM attendance {}", where_clause);
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT id, employee_id, date, check_in, check_out FROM attendance {} \
         ORDER BY date DESC, employee_id LIMIT ? OFFSET ?",
        where_clause
    );
    let data = bind_values!(sqlx::query_as::<_, Attendance>(&data_sql), filter.values.iter())
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data,
        page,
        per_page,
        total,
    }))
}
