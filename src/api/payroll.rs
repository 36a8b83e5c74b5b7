use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    api::Paginated,
    auth::{
        auth::AuthUser,
        permissions::{PAYROLL_CREATE, PAYROLL_READ_ALL, PAYROLL_READ_OWN, PAYROLL_UPDATE},
    },
    error::{AppError, AppResult},
    model::payroll::{Deductions, Earnings, PAYROLL_COLUMNS, Payroll, PayrollRow, PayrollStatus, PayrollSummary},
    services::{
        audit::{self, AuditEntry},
        payroll::{aggregate, compute_summary, gross_of, statutory_deductions},
    },
    utils::{
        dates::{get_financial_year, month_start},
        db_utils::{Filter, bind_values, paginate},
        validation::{validate_non_negative, validate_payload},
    },
};

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 4)]
    pub employee_id: u64,

    /// Any day of the pay month; stored as the first of the month
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub month: NaiveDate,

    #[validate(custom(function = "validate_non_negative"))]
    #[schema(example = "30000.00", value_type = String)]
    pub basic: Decimal,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(example = "12000.00", value_type = Option<String>)]
    pub hra: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub allowances: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub bonus: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub overtime: Option<Decimal>,

    /// Defaults to 12% of basic, on a basic of at most 15000
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub pf: Option<Decimal>,
    /// Defaults to 0.75% of gross while gross is at most 21000
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub esic: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub tax: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub recoveries: Option<Decimal>,

    pub status: Option<PayrollStatus>,
}

impl CreatePayroll {
    /// Earnings and deductions with absent components zeroed and statutory defaults filled in.
    fn components(&self) -> (Earnings, Deductions) {
        let earnings = Earnings {
            basic: self.basic,
            hra: self.hra.unwrap_or_default(),
            allowances: self.allowances.unwrap_or_default(),
            bonus: self.bonus.unwrap_or_default(),
            overtime: self.overtime.unwrap_or_default(),
        };
        let (pf, esic) = statutory_deductions(earnings.basic, gross_of(&earnings));
        let deductions = Deductions {
            pf: self.pf.unwrap_or(pf),
            esic: self.esic.unwrap_or(esic),
            tax: self.tax.unwrap_or_default(),
            recoveries: self.recoveries.unwrap_or_default(),
        };
        (earnings, deductions)
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdatePayroll {
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub basic: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub hra: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub allowances: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub bonus: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub overtime: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub pf: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub esic: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub tax: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub recoveries: Option<Decimal>,
    pub status: Option<PayrollStatus>,
}

impl UpdatePayroll {
    fn apply(&self, earnings: &mut Earnings, deductions: &mut Deductions) {
        let set = |target: &mut Decimal, value: Option<Decimal>| {
            if let Some(v) = value {
                *target = v;
            }
        };
        set(&mut earnings.basic, self.basic);
        set(&mut earnings.hra, self.hra);
        set(&mut earnings.allowances, self.allowances);
        set(&mut earnings.bonus, self.bonus);
        set(&mut earnings.overtime, self.overtime);
        set(&mut deductions.pf, self.pf);
        set(&mut deductions.esic, self.esic);
        set(&mut deductions.tax, self.tax);
        set(&mut deductions.recoveries, self.recoveries);
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Ignored for callers who can only read their own payslips
    pub employee_id: Option<u64>,
    /// Any day of the month to list
    #[param(value_type = Option<String>, format = "date")]
    pub month: Option<NaiveDate>,
    /// e.g. `2025-2026`
    pub financial_year: Option<String>,
    pub status: Option<PayrollStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollSummaryQuery {
    pub employee_id: Option<u64>,
    pub financial_year: Option<String>,
}

/// Filter limited to what the caller may read.
fn scoped_filter(auth: &AuthUser, employee_id: Option<u64>) -> AppResult<Filter> {
    let mut filter = Filter::new();
    if auth.can(PAYROLL_READ_ALL) {
        if let Some(employee_id) = employee_id {
            filter.and("employee_id = ?", employee_id);
        }
    } else {
        auth.require_permission(PAYROLL_READ_OWN)?;
        filter.and("employee_id = ?", auth.require_employee_id()?);
    }
    Ok(filter)
}

async fn write_components<'c, E>(
    executor: E,
    id: u64,
    earnings: &Earnings,
    deductions: &Deductions,
    summary: &PayrollSummary,
    status: PayrollStatus,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    sqlx::query(
        r#"
        UPDATE payroll
        SET basic = ?, hra = ?, allowances = ?, bonus = ?, overtime = ?,
            pf = ?, esic = ?, tax = ?, recoveries = ?,
            gross = ?, total_deductions = ?, net = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(earnings.basic)
    .bind(earnings.hra)
    .bind(earnings.allowances)
    .bind(earnings.bonus)
    .bind(earnings.overtime)
    .bind(deductions.pf)
    .bind(deductions.esic)
    .bind(deductions.tax)
    .bind(deductions.recoveries)
    .bind(summary.gross)
    .bind(summary.deductions)
    .bind(summary.net)
    .bind(status.to_string())
    .bind(id)
    .execute(executor)
    .await
    .map(|_| ())
}

/// Creates the month's payroll for an employee, or replaces the draft already there.
#[utoipa::path(
    post,
    path = "/api/v1/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = Object, example = json!({
            "message": "Payroll created successfully", "id": 7, "net": "44250.00"
        })),
        (status = 200, description = "Existing payroll for the month replaced"),
        (status = 400, description = "Negative component or deductions exceed gross"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Payroll for the month is already paid"),
        (status = 422, description = "Validation failed"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> AppResult<HttpResponse> {
    auth.require_permission(PAYROLL_CREATE)?;
    validate_payload(&*payload)?;

    let month = month_start(payload.month);
    let (earnings, deductions) = payload.components();
    let summary = compute_summary(&earnings, &deductions)?;
    let status = payload.status.unwrap_or(PayrollStatus::Draft);

    let mut tx = pool.begin().await?;

    let employee_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM employees WHERE id = ?)")
        .bind(payload.employee_id)
        .fetch_one(&mut *tx)
        .await?;
    if !employee_exists {
        return Err(AppError::NotFound("Employee not found".into()));
    }

    let existing = sqlx::query_as::<_, (u64, String)>(
        "SELECT id, status FROM payroll WHERE employee_id = ? AND month = ? FOR UPDATE",
    )
    .bind(payload.employee_id)
    .bind(month)
    .fetch_optional(&mut *tx)
    .await?;

    let (id, created) = match existing {
        Some((_, current)) if current == PayrollStatus::Paid.to_string() => {
            return Err(AppError::Conflict("Payroll for this month is already paid".into()));
        }
        Some((id, _)) => {
            write_components(&mut *tx, id, &earnings, &deductions, &summary, status).await?;
            (id, false)
        }
        None => {
            let id = sqlx::query(
                r#"
                INSERT INTO payroll
                (employee_id, month, financial_year, basic, hra, allowances, bonus, overtime,
                 pf, esic, tax, recoveries, gross, total_deductions, net, status)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(payload.employee_id)
            .bind(month)
            .bind(get_financial_year(month))
            .bind(earnings.basic)
            .bind(earnings.hra)
            .bind(earnings.allowances)
            .bind(earnings.bonus)
            .bind(earnings.overtime)
            .bind(deductions.pf)
            .bind(deductions.esic)
            .bind(deductions.tax)
            .bind(deductions.recoveries)
            .bind(summary.gross)
            .bind(summary.deductions)
            .bind(summary.net)
            .bind(status.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, employee_id = payload.employee_id, "Failed to create payroll");
                AppError::Internal
            })?
            .last_insert_id();
            (id, true)
        }
    };

    tx.commit().await?;

    info!(payroll_id = id, employee_id = payload.employee_id, %month, created, "Payroll saved");

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: if created { "create" } else { "replace" },
            entity: "payroll",
            entity_id: Some(id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    let body = json!({
        "message": if created { "Payroll created successfully" } else { "Payroll replaced" },
        "id": id,
        "net": summary.net,
    });
    Ok(if created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    })
}

#[utoipa::path(
    put,
    path = "/api/v1/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated"),
        (status = 400, description = "Deductions exceed gross"),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Payroll already paid")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> AppResult<HttpResponse> {
    auth.require_permission(PAYROLL_UPDATE)?;
    validate_payload(&*payload)?;
    let payroll_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {} FROM payroll WHERE id = ? FOR UPDATE", PAYROLL_COLUMNS);
    let current: Payroll = sqlx::query_as::<_, PayrollRow>(&sql)
        .bind(payroll_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payroll not found".into()))?
        .into();

    if current.status == PayrollStatus::Paid.to_string() {
        return Err(AppError::Conflict("Paid payrolls cannot be changed".into()));
    }

    let mut earnings = current.earnings;
    let mut deductions = current.deductions;
    payload.apply(&mut earnings, &mut deductions);
    let summary = compute_summary(&earnings, &deductions)?;

    let status = match payload.status {
        Some(s) => s,
        None => current.status.parse().map_err(|_| {
            error!(payroll_id, status = %current.status, "Unreadable payroll status");
            AppError::Internal
        })?,
    };

    write_components(&mut *tx, payroll_id, &earnings, &deductions, &summary, status).await?;
    tx.commit().await?;

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "update",
            entity: "payroll",
            entity_id: Some(payroll_id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payroll updated successfully",
        "summary": summary,
        "status": status,
    })))
}

/// Loads one payroll by id; shared with the payslip report.
pub async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> AppResult<Payroll> {
    let sql = format!("SELECT {} FROM payroll WHERE id = ?", PAYROLL_COLUMNS);
    let row = sqlx::query_as::<_, PayrollRow>(&sql)
        .bind(payroll_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Payroll not found".into()))?;
    Ok(row.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll/{payroll_id}",
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll", body = Payroll),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let payroll = fetch_payroll(pool.get_ref(), path.into_inner()).await?;
    auth.require_own_or(PAYROLL_READ_ALL, PAYROLL_READ_OWN, payroll.employee_id)?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payrolls", body = crate::api::PayrollPage)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    let (page, per_page, offset) = paginate(query.page, query.per_page);

    let mut filter = scoped_filter(&auth, query.employee_id)?;
    if let Some(month) = query.month {
        filter.and("month = ?", month_start(month));
    }
    if let Some(fy) = &query.financial_year {
        filter.and("financial_year = ?", fy.as_str());
    }
    if let Some(status) = query.status {
        filter.and("status = ?", status.to_string());
    }
    let where_clause = filter.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM payroll {}", where_clause);
    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {} FROM payroll {} ORDER BY month DESC, employee_id LIMIT ? OFFSET ?",
        PAYROLL_COLUMNS, where_clause
    );
    let rows = bind_values!(sqlx::query_as::<_, PayrollRow>(&data_sql), filter.values.iter())
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data: rows.into_iter().map(Payroll::from).collect::<Vec<_>>(),
        page,
        per_page,
        total,
    }))
}

/// Totals per month and per financial year
#[utoipa::path(
    get,
    path = "/api/v1/payroll/summary",
    params(PayrollSummaryQuery),
    responses(
        (status = 200, description = "Period totals", body = crate::services::payroll::PeriodTotals)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollSummaryQuery>,
) -> AppResult<HttpResponse> {
    let mut filter = scoped_filter(&auth, query.employee_id)?;
    if let Some(fy) = &query.financial_year {
        filter.and("financial_year = ?", fy.as_str());
    }

    let sql = format!(
        "SELECT {} FROM payroll {} ORDER BY month",
        PAYROLL_COLUMNS,
        filter.where_clause()
    );
    let rows = bind_values!(sqlx::query_as::<_, PayrollRow>(&sql), filter.values.iter())
        .fetch_all(pool.get_ref())
        .await?;

    let payrolls: Vec<Payroll> = rows.into_iter().map(Payroll::from).collect();
    Ok(HttpResponse::Ok().json(aggregate(&payrolls)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn request(basic: &str) -> CreatePayroll {
        CreatePayroll {
            employee_id: 4,
            month: NaiveDate::from_ymd_opt(2026, 1, 17).unwrap(),
            basic: dec(basic),
            hra: Some(dec("2000")),
            allowances: None,
            bonus: None,
            overtime: None,
            pf: None,
            esic: None,
            tax: None,
            recoveries: None,
            status: None,
        }
    }

    #[test]
    fn omitted_pf_and_esic_use_statutory_defaults() {
        let (earnings, deductions) = request("12000").components();
        assert_eq!(gross_of(&earnings), dec("14000"));
        assert_eq!(deductions.pf, dec("1440.00"));
        assert_eq!(deductions.esic, dec("105.00"));
        assert_eq!(deductions.tax, Decimal::ZERO);
    }

    #[test]
    fn explicit_pf_and_esic_are_kept() {
        let mut req = request("40000");
        req.pf = Some(dec("0"));
        req.esic = Some(dec("10"));
        let (_, deductions) = req.components();
        assert_eq!(deductions.pf, Decimal::ZERO);
        assert_eq!(deductions.esic, dec("10"));
    }

    #[test]
    fn update_overrides_only_given_components() {
        let (mut earnings, mut deductions) = request("40000").components();
        let update = UpdatePayroll {
            bonus: Some(dec("5000")),
            tax: Some(dec("3000")),
            ..Default::default()
        };
        update.apply(&mut earnings, &mut deductions);
        assert_eq!(earnings.basic, dec("40000"));
        assert_eq!(earnings.bonus, dec("5000"));
        assert_eq!(deductions.tax, dec("3000"));
        assert_eq!(deductions.pf, dec("1800.00"));
    }

    #[test]
    fn negative_components_fail_validation() {
        let mut req = request("40000");
        req.bonus = Some(dec("-1"));
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("bonus"));
    }
}
