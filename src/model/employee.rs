use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::leave_request::LeaveType;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+919812345678",
        "department_id": 1,
        "designation_id": 3,
        "manager_id": null,
        "hire_date": "2024-01-01",
        "status": "active",
        "ctc": "1200000.00",
        "leave_balance": {"casual": 12, "sick": 12, "earned": 15, "maternity": 0, "paternity": 0}
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+919812345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 1)]
    pub department_id: u64,

    #[schema(example = 3)]
    pub designation_id: u64,

    /// Employee id of the direct manager, who performs the first leave approval.
    #[schema(nullable = true)]
    pub manager_id: Option<u64>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,

    /// Annual cost to company.
    #[schema(value_type = String, example = "1200000.00")]
    pub ctc: Decimal,

    #[sqlx(flatten)]
    pub leave_balance: LeaveBalance,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    #[sqlx(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Remaining leave days per paid leave type. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    #[sqlx(rename = "casual_leave")]
    pub casual: u32,
    #[sqlx(rename = "sick_leave")]
    pub sick: u32,
    #[sqlx(rename = "earned_leave")]
    pub earned: u32,
    #[sqlx(rename = "maternity_leave")]
    pub maternity: u32,
    #[sqlx(rename = "paternity_leave")]
    pub paternity: u32,
}

impl LeaveBalance {
    /// Yearly allocation given to a new hire unless the request overrides it.
    pub fn default_allocation() -> Self {
        Self {
            casual: 12,
            sick: 12,
            earned: 15,
            maternity: 0,
            paternity: 0,
        }
    }

    /// Days available for `leave_type`; `None` for types that are not balance-tracked.
    pub fn available(&self, leave_type: LeaveType) -> Option<u32> {
        match leave_type {
            LeaveType::Casual => Some(self.casual),
            LeaveType::Sick => Some(self.sick),
            LeaveType::Earned => Some(self.earned),
            LeaveType::Maternity => Some(self.maternity),
            LeaveType::Paternity => Some(self.paternity),
            LeaveType::Unpaid => None,
        }
    }

    /// Column holding the counter for `leave_type`.
    pub fn column(leave_type: LeaveType) -> Option<&'static str> {
        match leave_type {
            LeaveType::Casual => Some("casual_leave"),
            LeaveType::Sick => Some("sick_leave"),
            LeaveType::Earned => Some("earned_leave"),
            LeaveType::Maternity => Some("maternity_leave"),
            LeaveType::Paternity => Some("paternity_leave"),
            LeaveType::Unpaid => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaid_leave_is_not_balance_tracked() {
        let balance = LeaveBalance {
            casual: 3,
            ..Default::default()
        };
        assert_eq!(balance.available(LeaveType::Casual), Some(3));
        assert_eq!(balance.available(LeaveType::Unpaid), None);
        assert_eq!(LeaveBalance::column(LeaveType::Unpaid), None);
        assert_eq!(LeaveBalance::column(LeaveType::Earned), Some("earned_leave"));
    }
}
