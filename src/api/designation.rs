use crate::{
    api::{PageQuery, Paginated},
    auth::{
        auth::AuthUser,
        permissions::{ORG_MANAGE, ORG_READ},
    },
    db::is_constraint_violation,
    error::{AppError, AppResult},
    model::designation::Designation,
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

const UPDATABLE_COLUMNS: &[&str] = &["title", "level", "department_id"];

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateDesignation {
    #[validate(length(min = 1, max = 100, message = "Title is required"))]
    #[schema(example = "Senior Engineer")]
    pub title: String,
    #[validate(range(min = 1, max = 20, message = "Level must be between 1 and 20"))]
    #[schema(example = 3)]
    pub level: Option<u32>,
    pub department_id: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDesignation {
    #[validate(length(min = 1, max = 100, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(range(min = 1, max = 20, message = "Level must be between 1 and 20"))]
    pub level: Option<u32>,
    pub department_id: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/designations",
    request_body = CreateDesignation,
    responses(
        (status = 201, description = "Designation created"),
        (status = 409, description = "Title already exists"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn create_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDesignation>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    validate_payload(&*payload)?;

    let result = sqlx::query("INSERT INTO designations (title, level, department_id) VALUES (?, ?, ?)")
        .bind(payload.title.trim())
        .bind(payload.level.unwrap_or(1))
        .bind(payload.department_id)
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict(
                "Designation already exists or department is missing".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "Failed to create designation");
            return Err(AppError::Internal);
        }
    };

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "create",
            entity: "designation",
            entity_id: Some(id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    Ok(HttpResponse::Created().json(json!({ "message": "Designation created", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/v1/designations",
    params(PageQuery),
    responses((status = 200, description = "Designations", body = crate::api::DesignationPage)),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn list_designations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_READ)?;
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM designations")
        .fetch_one(pool.get_ref())
        .await?;

    let data = sqlx::query_as::<_, Designation>(
        r#"
        SELECT id, title, level, department_id, created_at
        FROM designations
        ORDER BY level, title
        LIMIT ? OFFSET ?
        "#,
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
    path = "/api/v1/designations/{designation_id}",
    params(("designation_id" = u64, Path, description = "Designation ID")),
    request_body = UpdateDesignation,
    responses(
        (status = 200, description = "Designation updated"),
        (status = 404, description = "Designation not found")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn update_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    let designation_id = path.into_inner();

    let fields = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Body must be a JSON object".into()))?;
    let typed: UpdateDesignation = serde_json::from_value(body.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid designation update: {e}")))?;
    validate_payload(&typed)?;

    let update = build_update_sql("designations", fields, UPDATABLE_COLUMNS, "id", designation_id)?;
    match execute_update(pool.get_ref(), update).await {
        Ok(0) => {
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM designations WHERE id = ?)")
                .bind(designation_id)
                .fetch_one(pool.get_ref())
                .await?;
            if !exists {
                return Err(AppError::NotFound("Designation not found".into()));
            }
        }
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Designation title already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "update",
            entity: "designation",
            entity_id: Some(designation_id),
            changes: Some(body.into_inner()),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Designation updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/designations/{designation_id}",
    params(("designation_id" = u64, Path, description = "Designation ID")),
    responses(
        (status = 200, description = "Designation deleted"),
        (status = 404, description = "Designation not found"),
        (status = 409, description = "Designation still assigned to employees")
    ),
    tag = "Organization",
    security(("bearer_auth" = []))
)]
pub async fn delete_designation(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_permission(ORG_MANAGE)?;
    let designation_id = path.into_inner();

    match sqlx::query("DELETE FROM designations WHERE id = ?")
        .bind(designation_id)
        .execute(pool.get_ref())
        .await
    {
        Ok(res) if res.rows_affected() == 0 => {
            return Err(AppError::NotFound("Designation not found".into()));
        }
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Designation still assigned to employees".into()));
        }
        Err(e) => return Err(e.into()),
    }

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "delete",
            entity: "designation",
            entity_id: Some(designation_id),
            changes: None,
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Designation deleted" })))
}
