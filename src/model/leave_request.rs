use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Casual,
    Sick,
    Earned,
    Maternity,
    Paternity,
    Unpaid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    ManagerApproved,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }
}

/// Who signed off one approval step, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Approval {
    #[schema(example = 2)]
    pub approved_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub approved_at: DateTime<Utc>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "employee_id": 4,
    "leave_type": "casual",
    "start_date": "2026-01-05",
    "end_date": "2026-01-07",
    "total_days": 3,
    "reason": "Family function",
    "status": "manager_approved",
    "manager_approval": {"approved_by": 3, "approved_at": "2026-01-02T10:00:00Z", "remarks": null},
    "hr_approval": null,
    "created_at": "2026-01-01T09:00:00Z"
}))]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: LeaveType,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub manager_approval: Option<Approval>,
    pub hr_approval: Option<Approval>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Flat row as stored in `leave_requests`.
#[derive(Debug, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub reason: Option<String>,
    pub status: String,
    pub manager_approved_by: Option<u64>,
    pub manager_approved_at: Option<DateTime<Utc>>,
    pub manager_remarks: Option<String>,
    pub hr_approved_by: Option<u64>,
    pub hr_approved_at: Option<DateTime<Utc>>,
    pub hr_remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, total_days, \
    reason, status, manager_approved_by, manager_approved_at, manager_remarks, \
    hr_approved_by, hr_approved_at, hr_remarks, created_at";

fn approval(
    by: Option<u64>,
    at: Option<DateTime<Utc>>,
    remarks: Option<String>,
) -> Option<Approval> {
    match (by, at) {
        (Some(approved_by), Some(approved_at)) => Some(Approval {
            approved_by,
            approved_at,
            remarks,
        }),
        _ => None,
    }
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = String;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        let leave_type = row
            .leave_type
            .parse()
            .map_err(|_| format!("unknown leave type '{}'", row.leave_type))?;
        let status = row
            .status
            .parse()
            .map_err(|_| format!("unknown leave status '{}'", row.status))?;

        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            leave_type,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            reason: row.reason,
            status,
            manager_approval: approval(
                row.manager_approved_by,
                row.manager_approved_at,
                row.manager_remarks,
            ),
            hr_approval: approval(row.hr_approved_by, row.hr_approved_at, row.hr_remarks),
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: &str) -> LeaveRequestRow {
        LeaveRequestRow {
            id: 7,
            employee_id: 4,
            leave_type: "sick".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            total_days: 2,
            reason: None,
            status: status.into(),
            manager_approved_by: Some(3),
            manager_approved_at: Some(Utc.with_ymd_and_hms(2026, 1, 2, 10, 0, 0).unwrap()),
            manager_remarks: None,
            hr_approved_by: None,
            hr_approved_at: None,
            hr_remarks: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn row_maps_to_nested_approvals() {
        let leave = LeaveRequest::try_from(row("manager_approved")).unwrap();
        assert_eq!(leave.status, LeaveStatus::ManagerApproved);
        assert_eq!(leave.leave_type, LeaveType::Sick);
        assert_eq!(leave.manager_approval.unwrap().approved_by, 3);
        assert!(leave.hr_approval.is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(LeaveRequest::try_from(row("on_hold")).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!LeaveStatus::Pending.is_terminal());
        assert!(!LeaveStatus::ManagerApproved.is_terminal());
        assert!(LeaveStatus::Approved.is_terminal());
        assert!(LeaveStatus::Rejected.is_terminal());
        assert!(LeaveStatus::Cancelled.is_terminal());
    }
}
