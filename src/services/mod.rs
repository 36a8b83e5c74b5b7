pub mod audit;
pub mod leave;
pub mod payroll;
