use crate::{
    api::{PageQuery, Paginated},
    auth::{
        auth::AuthUser,
        permissions::{ORG_MANAGE, ORG_READ},
    },
    db::is_constraint_violation,
    error::{AppError, AppResult},
    model::department::Department,
    services::audit::{self, AuditEntry},
    utils::{
        db_utils::{build_update_sql, execute_update, paginate},
        validation::validate_payload,
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;
use validator::Validate;

const UPDATABLE_COLUMNS: &[&str] = &["name", "code", "description"];

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateDepartment {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    #[schema(example = "Engineering")]
    pub name: String,
    #[validate(length(min = 2, max = 20, message = "Code must be 2 to 20 characters"))]
    #[schema(example = "ENG")]
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDepartment {
    #[validate(length(min = 1, max = 100, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 20, message = "Code must be 2 to 20 characters"))]
    pub code: Option<String>,
    pub description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Object, example = json!({
            "message": "Department created", "id": 3
        })),
        (status = 409, description = "Name or code already exists"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    validate_payload(&*payload)?;

    let result = sqlx::query("INSERT INTO departments (name, code, description) VALUES (?, ?, ?)")
        .bind(payload.name.trim())
        .bind(payload.code.trim())
        .bind(&payload.description)
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Department name or code already exists".into()));
        }
        Err(e) => {
            error!(error = %e, "Failed to create department");
            return Err(AppError::Internal);
        }
    };

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "create",
            entity: "department",
            entity_id: Some(id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "message": "Department created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/departments",
    params(PageQuery),
    responses((status = 200, description = "Departments", body = crate::api::DepartmentPage)),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_READ)?;
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments")
        .fetch_one(pool.get_ref())
        .await?;

    let data = sqlx::query_as::<_, Department>(
        "SELECT id, name, code, description, created_at FROM departments ORDER BY name LIMIT ? OFFSET ?",
    )
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

#[utoipa::path(
    put,
    path = "/api/v1/departments/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    request_body = UpdateDepartment,
    responses(
        (status = 200, description = "Department updated"),
        (status = 404, description = "Department not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    let department_id = path.into_inner();

    let fields = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Body must be a JSON object".into()))?;
    let typed: UpdateDepartment = serde_json::from_value(body.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid department update: {e}")))?;
    validate_payload(&typed)?;

    let update = build_update_sql("departments", fields, UPDATABLE_COLUMNS, "id", department_id)?;
    match execute_update(pool.get_ref(), update).await {
        Ok(0) => {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM departments WHERE id = ?)")
                .bind(department_id)
                .fetch_one(pool.get_ref())
                .await?;
            if !exists {
                return Err(AppError::NotFound("Department not found".into()));
            }
        }
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Department name or code already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "update",
            entity: "department",
            entity_id: Some(department_id),
            changes: Some(body.into_inner()),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Department updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/departments/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department deleted"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department still has employees")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    let department_id = path.into_inner();

    match sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(pool.get_ref())
        .await
    {
        Ok(res) if res.rows_affected() == 0 => {
            return Err(AppError::NotFound("Department not found".into()));
        }
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Department still has employees".into()));
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "delete",
            entity: "department",
            entity_id: Some(department_id),
            changes: None,
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Department deleted" })))
}
