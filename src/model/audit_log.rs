use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// One row of the append-only audit trail.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AuditLog {
    pub id: u64,
    pub user_id: Option<u64>,
    #[schema(example = "update")]
    pub action: String,
    #[schema(example = "employee")]
    pub entity: String,
    pub entity_id: Option<u64>,
    #[schema(value_type = Option<Object>)]
    pub changes: Option<Value>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
