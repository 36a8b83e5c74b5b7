use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Earnings {
    #[schema(value_type = String, example = "50000.00")]
    pub basic: Decimal,
    #[schema(value_type = String, example = "20000.00")]
    pub hra: Decimal,
    #[schema(value_type = String, example = "5000.00")]
    pub allowances: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub bonus: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub overtime: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Deductions {
    /// Provident Fund
    #[schema(value_type = String, example = "1800.00")]
    pub pf: Decimal,
    /// Employee State Insurance
    #[schema(value_type = String, example = "0.00")]
    pub esic: Decimal,
    /// Tax deducted at source
    #[schema(value_type = String, example = "4500.00")]
    pub tax: Decimal,
    #[schema(value_type = String, example = "0.00")]
    pub recoveries: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PayrollSummary {
    #[schema(value_type = String, example = "75000.00")]
    pub gross: Decimal,
    #[schema(value_type = String, example = "6300.00")]
    pub deductions: Decimal,
    #[schema(value_type = String, example = "68700.00")]
    pub net: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Processed,
    Paid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    /// First day of the pay month.
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub month: NaiveDate,
    #[schema(example = "2025-2026")]
    pub financial_year: String,
    pub earnings: Earnings,
    pub deductions: Deductions,
    pub summary: PayrollSummary,
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PayrollRow {
    pub id: u64,
    pub employee_id: u64,
    pub month: NaiveDate,
    pub financial_year: String,
    pub basic: Decimal,
    pub hra: Decimal,
    pub allowances: Decimal,
    pub bonus: Decimal,
    pub overtime: Decimal,
    pub pf: Decimal,
    pub esic: Decimal,
    pub tax: Decimal,
    pub recoveries: Decimal,
    pub gross: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub const PAYROLL_COLUMNS: &str = "id, employee_id, month, financial_year, basic, hra, allowances, \
    bonus, overtime, pf, esic, tax, recoveries, gross, total_deductions, net, status, created_at";

impl From<PayrollRow> for Payroll {
    fn from(row: PayrollRow) -> Self {
        Self {
            id: row.id,
            employee_id: row.employee_id,
            month: row.month,
            financial_year: row.financial_year,
            earnings: Earnings {
                basic: row.basic,
                hra: row.hra,
                allowances: row.allowances,
                bonus: row.bonus,
                overtime: row.overtime,
            },
            deductions: Deductions {
                pf: row.pf,
                esic: row.esic,
                tax: row.tax,
                recoveries: row.recoveries,
            },
            summary: PayrollSummary {
                gross: row.gross,
                deductions: row.total_deductions,
                net: row.net,
            },
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Everything printed on a payslip: the payroll plus the employee block.
#[derive(Debug, Clone)]
pub struct Payslip {
    pub company_name: String,
    pub employee_code: String,
    pub employee_name: String,
    pub department: String,
    pub designation: String,
    pub payroll: Payroll,
}

/// Payroll joined with employee identity; one line of the payroll register.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayrollRegisterRow {
    pub employee_code: String,
    pub employee_name: String,
    pub month: NaiveDate,
    pub gross: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
}
