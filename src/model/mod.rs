pub mod attendance;
pub mod audit_log;
pub mod course;
pub mod department;
pub mod designation;
pub mod document;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod role;
pub mod user;
