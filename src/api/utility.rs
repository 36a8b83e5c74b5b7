use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{auth::AuthUser, permissions::permissions_for},
    error::{AppError, AppResult},
    model::role::Role,
    utils::dates::{calculate_working_days, financial_year_bounds, get_financial_year},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    #[param(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkingDays {
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,
    #[schema(example = 5)]
    pub working_days: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FinancialYear {
    #[schema(example = "2025-2026")]
    pub financial_year: String,
    #[schema(value_type = String, format = "date")]
    pub starts: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub ends: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyPermissions {
    pub role: Role,
    /// `true` for super_admin, which is granted every permission
    pub all: bool,
    pub permissions: Vec<&'static str>,
}

#[utoipa::path(
    get,
    path = "/api/v1/utils/working-days",
    params(RangeQuery),
    responses(
        (status = 200, description = "Working days in the inclusive range", body = WorkingDays),
        (status = 400, description = "start is after end")
    ),
    security(("bearer_auth" = [])),
    tag = "Utilities"
)]
pub async fn working_days(_auth: AuthUser, query: web::Query<RangeQuery>) -> AppResult<HttpResponse> {
    if query.start > query.end {
        return Err(AppError::BadRequest("start cannot be after end".into()));
    }
    Ok(HttpResponse::Ok().json(WorkingDays {
        start: query.start,
        end: query.end,
        working_days: calculate_working_days(query.start, query.end),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/utils/financial-year",
    params(DateQuery),
    responses((status = 200, description = "Financial year containing the date", body = FinancialYear)),
    security(("bearer_auth" = [])),
    tag = "Utilities"
)]
pub async fn financial_year(_auth: AuthUser, query: web::Query<DateQuery>) -> AppResult<HttpResponse> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let (starts, ends) = financial_year_bounds(date);
    Ok(HttpResponse::Ok().json(FinancialYear {
        financial_year: get_financial_year(date),
        starts,
        ends,
    }))
}

/// Permissions granted to the caller's role.
#[utoipa::path(
    get,
    path = "/auth/permissions",
    responses(
        (status = 200, description = "Caller's permissions", body = MyPermissions),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn my_permissions(auth: AuthUser) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(MyPermissions {
        role: auth.role,
        all: auth.role == Role::SuperAdmin,
        permissions: permissions_for(auth.role),
    }))
}
