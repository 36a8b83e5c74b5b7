use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Designation {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Software Engineer")]
    pub title: String,
    #[schema(example = 2)]
    pub level: u32,
    pub department_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
