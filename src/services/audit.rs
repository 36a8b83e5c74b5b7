use serde_json::Value;
use sqlx::MySqlPool;

/// One audit trail entry. There is no update or delete path for these rows.
#[derive(Debug)]
pub struct AuditEntry<'a> {
    pub user_id: Option<u64>,
    pub action: &'a str,
    pub entity: &'a str,
    pub entity_id: Option<u64>,
    pub changes: Option<Value>,
}

/// Appends `entry`. A failed write is logged and swallowed; the business
/// operation it describes has already happened.
pub async fn record(pool: &MySqlPool, entry: AuditEntry<'_>) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (user_id, action, entity, entity_id, changes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.action)
    .bind(entry.entity)
    .bind(entry.entity_id)
    .bind(entry.changes)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(
            error = %e,
            action = entry.action,
            entity = entry.entity,
            entity_id = ?entry.entity_id,
            "Failed to write audit log"
        );
    }
}
