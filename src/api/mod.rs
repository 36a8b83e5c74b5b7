use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{
    attendance::Attendance, audit_log::AuditLog, course::Course, department::Department, designation::Designation,
    document::Document, employee::Employee, leave_request::LeaveRequest, payroll::Payroll,
};

pub mod attendance;
pub mod audit_log;
pub mod course;
pub mod department;
pub mod designation;
pub mod document;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod report;
pub mod utility;

/// `page` / `per_page` query pair shared by every list endpoint.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// Page number, starting at 1
    pub page: Option<u32>,
    /// Items per page, 1 to 100
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[aliases(
    EmployeePage = Paginated<Employee>,
    DepartmentPage = Paginated<Department>,
    DesignationPage = Paginated<Designation>,
    LeavePage = Paginated<LeaveRequest>,
    PayrollPage = Paginated<Payroll>,
    DocumentPage = Paginated<Document>,
    CoursePage = Paginated<Course>,
    AuditLogPage = Paginated<AuditLog>,
    AttendancePage = Paginated<Attendance>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}
