use actix_web::{
    HttpResponse,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::payroll::fetch_payroll,
    auth::{
        auth::AuthUser,
        permissions::{PAYROLL_READ_ALL, PAYROLL_READ_OWN, REPORT_ATTENDANCE, REPORT_PAYROLL},
    },
    config::Config,
    error::{AppError, AppResult},
    model::{attendance::AttendanceRow, payroll::PayrollRegisterRow, payroll::Payslip},
    reports::{
        excel::{render_attendance_xlsx, render_payroll_register_xlsx},
        pdf::render_payslip_pdf,
    },
    utils::{
        dates::{financial_year_bounds, get_financial_year, month_bounds},
        db_utils::{Filter, bind_values},
    },
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Longest range one attendance export may cover.
const MAX_EXPORT_DAYS: i64 = 366;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceReportQuery {
    #[param(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[param(value_type = String, format = "date")]
    pub to: NaiveDate,
    pub department_id: Option<u64>,
    pub employee_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PeriodScope {
    #[default]
    Month,
    FinancialYear,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PayrollReportQuery {
    /// Any day inside the period
    #[param(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// `month` (default) or `financial_year`
    #[param(value_type = Option<String>)]
    pub scope: Option<PeriodScope>,
}

impl PayrollReportQuery {
    fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match self.scope.unwrap_or_default() {
            PeriodScope::Month => month_bounds(self.date),
            PeriodScope::FinancialYear => financial_year_bounds(self.date),
        }
    }

    fn label(&self) -> String {
        match self.scope.unwrap_or_default() {
            PeriodScope::Month => self.date.format("%Y-%m").to_string(),
            PeriodScope::FinancialYear => get_financial_year(self.date),
        }
    }
}

fn attachment(file_name: String) -> ContentDisposition {
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file_name)],
    }
}

/// Payslip for one payroll record as a PDF.
#[utoipa::path(
    get,
    path = "/api/v1/reports/payslip/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payslip PDF", content_type = "application/pdf"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Payroll not found"),
        (status = 500, description = "Rendering failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn payslip_pdf(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let payroll = fetch_payroll(pool.get_ref(), path.into_inner()).await?;
    auth.require_own_or(PAYROLL_READ_ALL, PAYROLL_READ_OWN, payroll.employee_id)?;

    let (employee_code, employee_name, department, designation) = sqlx::query_as::<_, (String, String, String, String)>(
        r#"
        SELECT e.employee_code, CONCAT(e.first_name, ' ', e.last_name), d.name, g.title
        FROM employees e
        JOIN departments d ON d.id = e.department_id
        JOIN designations g ON g.id = e.designation_id
        WHERE e.id = ?
        "#,
    )
    .bind(payroll.employee_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Employee not found".into()))?;

    let file_name = format!("payslip-{}-{}.pdf", employee_code, payroll.month.format("%Y-%m"));
    let payslip = Payslip {
        company_name: config.company_name.clone(),
        employee_code,
        employee_name,
        department,
        designation,
        payroll,
    };
    let bytes = render_payslip_pdf(&payslip, Utc::now().naive_utc())?;

    info!(payroll_id = payslip.payroll.id, size = bytes.len(), "Payslip rendered");

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(attachment(file_name))
        .body(bytes))
}

/// Attendance export for a date range.
#[utoipa::path(
    get,
    path = "/api/v1/reports/attendance.xlsx",
    params(AttendanceReportQuery),
    responses(
        (status = 200, description = "Attendance workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid range"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn attendance_xlsx(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceReportQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(REPORT_ATTENDANCE)?;
    if query.from > query.to {
        return Err(AppError::BadRequest("from cannot be after to".into()));
    }
    if (query.to - query.from).num_days() >= MAX_EXPORT_DAYS {
        return Err(AppError::BadRequest(format!(
            "Range cannot exceed {MAX_EXPORT_DAYS} days"
        )));
    }

    let mut filter = Filter::new();
    filter.and("a.date >= ?", query.from).and("a.date <= ?", query.to);
    if let Some(department_id) = query.department_id {
        filter.and("e.department_id = ?", department_id);
    }
    if let Some(employee_id) = query.employee_id {
        filter.and("a.employee_id = ?", employee_id);
    }

    let sql = format!(
        r#"
        SELECT e.employee_code, CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
               a.date, a.check_in, a.check_out
        FROM attendance a
        JOIN employees e ON e.id = a.employee_id
        {}
        ORDER BY a.date, e.employee_code
        "#,
        filter.where_clause()
    );
    let rows = bind_values!(sqlx::query_as::<_, AttendanceRow>(&sql), filter.values.iter())
        .fetch_all(pool.get_ref())
        .await?;

    let bytes = render_attendance_xlsx(&rows)?;
    info!(rows = rows.len(), from = %query.from, to = %query.to, "Attendance report rendered");

    Ok(HttpResponse::Ok()
        .content_type(XLSX_MIME)
        .insert_header(attachment(format!("attendance-{}-{}.xlsx", query.from, query.to)))
        .body(bytes))
}

/// Payroll register for a month or a financial year.
#[utoipa::path(
    get,
    path = "/api/v1/reports/payroll.xlsx",
    params(PayrollReportQuery),
    responses(
        (status = 200, description = "Payroll register workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn payroll_xlsx(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollReportQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(REPORT_PAYROLL)?;
    let (start, end) = query.bounds();

    let rows = sqlx::query_as::<_, PayrollRegisterRow>(
        r#"
        SELECT e.employee_code, CONCAT(e.first_name, ' ', e.last_name) AS employee_name,
               p.month, p.gross, p.total_deductions, p.net
        FROM payroll p
        JOIN employees e ON e.id = p.employee_id
        WHERE p.month BETWEEN ? AND ?
        ORDER BY p.month, e.employee_code
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool.get_ref())
    .await?;

    let bytes = render_payroll_register_xlsx(&rows)?;
    info!(rows = rows.len(), %start, %end, "Payroll register rendered");

    Ok(HttpResponse::Ok()
        .content_type(XLSX_MIME)
        .insert_header(attachment(format!("payroll-{}.xlsx", query.label())))
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(y: i32, m: u32, d: u32, scope: Option<PeriodScope>) -> PayrollReportQuery {
        PayrollReportQuery {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            scope,
        }
    }

    #[test]
    fn month_scope_is_default() {
        let q = query(2026, 2, 14, None);
        assert_eq!(
            q.bounds(),
            (
                NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()
            )
        );
        assert_eq!(q.label(), "2026-02");
    }

    #[test]
    fn financial_year_scope_spans_april_to_march() {
        let q = query(2026, 2, 14, Some(PeriodScope::FinancialYear));
        assert_eq!(
            q.bounds(),
            (
                NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
            )
        );
        assert_eq!(q.label(), "2025-2026");
    }
}
