use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    /// Anyone signed in.
    Public,
    /// Members of the document's department.
    Department,
    /// HR and admins only.
    Restricted,
    /// The owning employee, the uploader, HR and admins.
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Document {
    pub id: u64,
    /// Previous version of this document, if any.
    pub parent_id: Option<u64>,
    #[schema(example = "Offer letter")]
    pub title: String,
    #[schema(example = "offer-letter.pdf")]
    pub file_name: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    pub size_bytes: u64,
    #[schema(example = 1)]
    pub version: u32,
    #[schema(example = "private")]
    pub access_level: String,
    pub employee_id: Option<u64>,
    pub department_id: Option<u64>,
    pub uploaded_by: u64,
    pub view_count: u32,
    pub download_count: u32,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

pub const DOCUMENT_COLUMNS: &str = "id, parent_id, title, file_name, storage_key, mime_type, \
    size_bytes, version, access_level, employee_id, department_id, uploaded_by, view_count, \
    download_count, created_at";
