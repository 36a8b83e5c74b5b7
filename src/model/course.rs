use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Course {
    pub id: u64,
    #[schema(example = "Workplace Safety")]
    pub title: String,
    pub description: Option<String>,
    pub trainer: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 30)]
    pub capacity: u32,
    #[schema(example = "scheduled")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Enrollment {
    pub id: u64,
    pub course_id: u64,
    pub employee_id: u64,
    #[schema(example = "enrolled")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub enrolled_at: DateTime<Utc>,
}
