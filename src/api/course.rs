use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::Paginated,
    auth::{
        auth::AuthUser,
        permissions::{COURSE_ENROLL, COURSE_MANAGE, COURSE_READ},
    },
    db::is_constraint_violation,
    error::{AppError, AppResult},
    model::course::{Course, Enrollment},
    services::audit::{self, AuditEntry},
    utils::{
        db_utils::{Filter, bind_values, paginate},
        validation::validate_payload,
    },
};

const COURSE_COLUMNS: &str = "id, title, description, trainer, start_date, end_date, capacity, status, created_at";

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateCourse {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    #[schema(example = "Workplace Safety")]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100, message = "Trainer name too long"))]
    pub trainer: Option<String>,
    #[schema(example = "2026-02-02", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-02-04", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[validate(range(min = 1, max = 1000, message = "Capacity must be between 1 and 1000"))]
    #[schema(example = 30)]
    pub capacity: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CourseQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// `scheduled`, `ongoing`, `completed` or `cancelled`
    pub status: Option<String>,
}

/// Whether a course in `status` with `enrolled` seats taken out of `capacity`
/// can take one more enrollment.
fn check_open(status: &str, capacity: u32, enrolled: i64) -> AppResult<()> {
    if matches!(status, "completed" | "cancelled") {
        return Err(AppError::Conflict(format!("Course is {status}")));
    }
    if enrolled >= i64::from(capacity) {
        return Err(AppError::Conflict("Course is full".into()));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/courses",
    request_body = CreateCourse,
    responses(
        (status = 201, description = "Course created", body = Object, example = json!({ "id": 1 })),
        (status = 400, description = "end_date before start_date"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn create_course(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateCourse>,
) -> AppResult<HttpResponse> {
    auth.require_permission(COURSE_MANAGE)?;
    validate_payload(&*payload)?;
    if payload.end_date < payload.start_date {
        return Err(AppError::BadRequest("end_date cannot be before start_date".into()));
    }

    let id = sqlx::query(
        r#"
        INSERT INTO courses (title, description, trainer, start_date, end_date, capacity)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(&payload.trainer)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.capacity)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(course_id = id, "Course created");

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "create",
            entity: "course",
            entity_id: Some(id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/courses",
    params(CourseQuery),
    responses((status = 200, description = "Courses", body = crate::api::CoursePage)),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn list_courses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CourseQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(COURSE_READ)?;
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let mut filter = Filter::new();
    if let Some(status) = query.status.as_deref() {
        filter.and("status = ?", status);
    }
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM courses {}", where_clause);
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {} FROM courses {} ORDER BY start_date DESC, id DESC LIMIT ? OFFSET ?",
        COURSE_COLUMNS, where_clause
    );
    let data = bind_values!(sqlx::query_as::<_, Course>(&data_sql), filter.values.iter())
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

/// Enroll the calling employee.
#[utoipa::path(
    post,
    path = "/api/v1/courses/{course_id}/enroll",
    params(("course_id" = u64, Path, description = "Course ID")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Already enrolled, course full or closed")
    ),
    security(("bearer_auth" = [])),
    tag = "Courses"
)]
pub async fn enroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_permission(COURSE_ENROLL)?;
    let employee_id = auth.require_employee_id()?;
    let course_id = path.into_inner();

    let mut tx = pool.begin().await?;

    // the course row lock serialises enrollments so capacity holds
    let (status, capacity) =
        sqlx::query_as::<_, (String, u32)>("SELECT status, capacity FROM courses WHERE id = ? FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM course_enrollments WHERE course_id = ? AND status <> 'dropped'",
    )
    .bind(course_id)
    .fetch_one(&mut *tx)
    .await?;
    check_open(&status, capacity, enrolled)?;

    let id = match sqlx::query("INSERT INTO course_enrollments (course_id, employee_id) VALUES (?, ?)")
        .bind(course_id)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
    {
        Ok(result) => result.last_insert_id(),
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Already enrolled in this course".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let enrollment = sqlx::query_as::<_, Enrollment>(
        "SELECT id, course_id, employee_id, status, enrolled_at FROM course_enrollments WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(course_id, employee_id, "Employee enrolled");
    Ok(HttpResponse::Created().json(enrollment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_course_rejects() {
        assert!(check_open("scheduled", 2, 1).is_ok());
        assert!(matches!(check_open("scheduled", 2, 2), Err(AppError::Conflict(_))));
    }

    #[test]
    fn closed_course_rejects() {
        assert!(check_open("ongoing", 10, 0).is_ok());
        assert!(check_open("completed", 10, 0).is_err());
        assert!(check_open("cancelled", 10, 0).is_err());
    }

    #[test]
    fn capacity_is_validated() {
        let course = CreateCourse {
            title: "Safety".into(),
            description: None,
            trainer: None,
            start_date: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 2, 4).unwrap(),
            capacity: 0,
        };
        let err = course.validate().unwrap_err();
        assert!(err.field_errors().contains_key("capacity"));
    }
}
