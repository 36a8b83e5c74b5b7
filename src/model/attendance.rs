use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:02:11")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:10:45")]
    pub check_out: Option<NaiveTime>,
}

/// Attendance joined with the employee it belongs to; one line of the attendance report.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceRow {
    pub employee_code: String,
    pub employee_name: String,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
}

impl AttendanceRow {
    /// Hours between check-in and check-out, `None` until checked out.
    pub fn hours_worked(&self) -> Option<f64> {
        match (self.check_in, self.check_out) {
            (Some(i), Some(o)) if o >= i => {
                let minutes = (o - i).num_minutes();
                Some((minutes as f64 / 60.0 * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match (self.check_in, self.check_out) {
            (Some(_), Some(_)) => "Present",
            (Some(_), None) => "Checked In",
            _ => "Absent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(check_in: Option<(u32, u32)>, check_out: Option<(u32, u32)>) -> AttendanceRow {
        AttendanceRow {
            employee_code: "EMP-004".into(),
            employee_name: "Esha Verma".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: check_in.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
            check_out: check_out.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
        }
    }

    #[test]
    fn hours_and_status() {
        let full = row(Some((9, 0)), Some((17, 30)));
        assert_eq!(full.hours_worked(), Some(8.5));
        assert_eq!(full.status(), "Present");

        let open = row(Some((9, 0)), None);
        assert_eq!(open.hours_worked(), None);
        assert_eq!(open.status(), "Checked In");

        assert_eq!(row(None, None).status(), "Absent");
    }
}
