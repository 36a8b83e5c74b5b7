use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

use crate::{
    api::Paginated,
    auth::{auth::AuthUser, permissions::AUDIT_READ},
    error::AppResult,
    model::audit_log::AuditLog,
    utils::db_utils::{Filter, bind_values, paginate},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// e.g. `employee`, `leave_request`, `payroll`
    pub entity: Option<String>,
    pub entity_id: Option<u64>,
    pub user_id: Option<u64>,
    pub action: Option<String>,
}

impl AuditQuery {
    fn filter(&self) -> Filter {
        let mut filter = Filter::new();
        if let Some(entity) = self.entity.as_deref() {
            filter.and("entity = ?", entity);
        }
        if let Some(entity_id) = self.entity_id {
            filter.and("entity_id = ?", entity_id);
        }
        if let Some(user_id) = self.user_id {
            filter.and("user_id = ?", user_id);
        }
        if let Some(action) = self.action.as_deref() {
            filter.and("action = ?", action);
        }
        filter
    }
}

/// Audit trail, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = crate::api::AuditLogPage),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_audit_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(AUDIT_READ)?;
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let filter = query.filter();
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT id, user_id, action, entity, entity_id, changes, created_at \
         FROM audit_logs {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let data = bind_values!(sqlx::query_as::<_, AuditLog>(&data_sql), filter.values.iter())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_follow_query_order() {
        let query = AuditQuery {
            page: None,
            per_page: None,
            entity: Some("employee".into()),
            entity_id: Some(7),
            user_id: None,
            action: Some("update".into()),
        };
        let filter = query.filter();
        assert_eq!(
            filter.where_clause(),
            "WHERE entity = ? AND entity_id = ? AND action = ?"
        );
        assert_eq!(filter.values.len(), 3);
    }
}
