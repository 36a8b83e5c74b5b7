use crate::api::{
    AttendancePage, AuditLogPage, CoursePage, DepartmentPage, DesignationPage, DocumentPage, EmployeePage, LeavePage,
    PageQuery, PayrollPage,
    course::CreateCourse,
    department::{CreateDepartment, UpdateDepartment},
    designation::{CreateDesignation, UpdateDesignation},
    employee::{CreateEmployee, UpdateEmployee},
    leave_request::{CreateLeave, LeaveDecision},
    payroll::{CreatePayroll, UpdatePayroll},
    report::PeriodScope,
    utility::{FinancialYear, MyPermissions, WorkingDays},
};
use crate::model::{
    attendance::Attendance,
    audit_log::AuditLog,
    course::{Course, Enrollment},
    department::Department,
    designation::Designation,
    document::{AccessLevel, Document},
    employee::{Employee, LeaveBalance},
    leave_request::{Approval, LeaveRequest, LeaveStatus, LeaveType},
    payroll::{Deductions, Earnings, Payroll, PayrollStatus, PayrollSummary},
    role::Role,
};
use crate::services::payroll::{PeriodTotals, Totals};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS API",
        version = "1.0.0",
        description = r#"
## Human Resource Management System

Backend for day-to-day HR operations.

### Features
- **Employees, departments, designations**
- **Leave** with manager then HR approval and balance tracking
- **Attendance** check-in/check-out and history
- **Payroll** with statutory deductions and month / financial-year totals
- **Documents** with access levels and versioning
- **Training courses** and enrollment
- **Reports**: payslip PDF, attendance and payroll workbooks
- **Audit trail** of every write

### Security
All `/api/v1` endpoints need a JWT access token (`Authorization: Bearer ...`).
Tokens come from `POST /auth/login` and are rotated with `POST /auth/refresh`.
What a caller may do is decided by the permissions of their role; see `GET /auth/permissions`.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::get_leave_balance,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::designation::create_designation,
        crate::api::designation::list_designations,
        crate::api::designation::update_designation,
        crate::api::designation::delete_designation,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::list_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::manager_approve_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::payroll_summary,

        crate::api::document::upload_document,
        crate::api::document::upload_version,
        crate::api::document::list_documents,
        crate::api::document::get_document,
        crate::api::document::download_document,

        crate::api::course::create_course,
        crate::api::course::list_courses,
        crate::api::course::enroll,

        crate::api::audit_log::list_audit_logs,

        crate::api::report::payslip_pdf,
        crate::api::report::attendance_xlsx,
        crate::api::report::payroll_xlsx,

        crate::api::utility::working_days,
        crate::api::utility::financial_year,
        crate::api::utility::my_permissions
    ),
    components(
        schemas(
            PageQuery,
            EmployeePage, DepartmentPage, DesignationPage, LeavePage, PayrollPage,
            DocumentPage, CoursePage, AuditLogPage, AttendancePage,
            Employee, LeaveBalance, CreateEmployee, UpdateEmployee,
            Department, CreateDepartment, UpdateDepartment,
            Designation, CreateDesignation, UpdateDesignation,
            LeaveRequest, LeaveType, LeaveStatus, Approval, CreateLeave, LeaveDecision,
            Attendance,
            Payroll, Earnings, Deductions, PayrollSummary, PayrollStatus, CreatePayroll, UpdatePayroll,
            Totals, PeriodTotals,
            Document, AccessLevel,
            Course, Enrollment, CreateCourse,
            AuditLog,
            PeriodScope,
            WorkingDays, FinancialYear, MyPermissions, Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employee", description = "Employee records"),
        (name = "Organization", description = "Departments and designations"),
        (name = "Leave", description = "Leave applications and approvals"),
        (name = "Attendance", description = "Check-in, check-out and history"),
        (name = "Payroll", description = "Monthly payroll"),
        (name = "Documents", description = "Document storage"),
        (name = "Courses", description = "Training courses"),
        (name = "Audit", description = "Audit trail"),
        (name = "Reports", description = "PDF and Excel reports"),
        (name = "Utilities", description = "Date helpers"),
        (name = "Auth", description = "Authentication"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_documented_path_is_bearer_protected() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(doc.paths.paths.contains_key("/api/v1/payroll/summary"));
        assert!(doc.paths.paths.contains_key("/api/v1/documents/{document_id}/download"));
    }
}
