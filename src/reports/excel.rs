use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use super::ReportError;
use crate::model::attendance::AttendanceRow;
use crate::model::payroll::PayrollRegisterRow;

pub const ATTENDANCE_COLUMNS: [&str; 7] = [
    "Employee Code",
    "Employee Name",
    "Date",
    "Check In",
    "Check Out",
    "Hours Worked",
    "Status",
];

const PAYROLL_COLUMNS: [&str; 6] = [
    "Employee Code",
    "Employee Name",
    "Month",
    "Gross",
    "Deductions",
    "Net",
];

fn write_header(sheet: &mut Worksheet, columns: &[&str], bold: &Format) -> Result<(), ReportError> {
    for (col, title) in columns.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, bold)?;
        sheet.set_column_width(col, 18)?;
    }
    Ok(())
}

fn as_number(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// Attendance sheet with the fixed seven columns, one row per attendance record.
pub fn render_attendance_xlsx(rows: &[AttendanceRow]) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Attendance")?;
    write_header(sheet, &ATTENDANCE_COLUMNS, &bold)?;

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.employee_code)?;
        sheet.write_string(r, 1, &row.employee_name)?;
        sheet.write_string(r, 2, row.date.format("%Y-%m-%d").to_string())?;
        let time = |t: Option<chrono::NaiveTime>| t.map(|t| t.format("%H:%M").to_string()).unwrap_or_default();
        sheet.write_string(r, 3, time(row.check_in))?;
        sheet.write_string(r, 4, time(row.check_out))?;
        match row.hours_worked() {
            Some(hours) => sheet.write_number(r, 5, hours)?,
            None => sheet.write_string(r, 5, "")?,
        };
        sheet.write_string(r, 6, row.status())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Payroll register for a period with a bold totals row.
pub fn render_payroll_register_xlsx(rows: &[PayrollRegisterRow]) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");
    let money_bold = Format::new().set_num_format("#,##0.00").set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Payroll")?;
    write_header(sheet, &PAYROLL_COLUMNS, &bold)?;

    let (mut gross, mut deductions, mut net) = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.employee_code)?;
        sheet.write_string(r, 1, &row.employee_name)?;
        sheet.write_string(r, 2, row.month.format("%Y-%m").to_string())?;
        sheet.write_number_with_format(r, 3, as_number(row.gross), &money)?;
        sheet.write_number_with_format(r, 4, as_number(row.total_deductions), &money)?;
        sheet.write_number_with_format(r, 5, as_number(row.net), &money)?;
        gross += row.gross;
        deductions += row.total_deductions;
        net += row.net;
    }

    let total_row = rows.len() as u32 + 1;
    sheet.write_string_with_format(total_row, 0, "Total", &bold)?;
    sheet.write_number_with_format(total_row, 3, as_number(gross), &money_bold)?;
    sheet.write_number_with_format(total_row, 4, as_number(deductions), &money_bold)?;
    sheet.write_number_with_format(total_row, 5, as_number(net), &money_bold)?;

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn attendance_sheet_has_seven_columns() {
        assert_eq!(ATTENDANCE_COLUMNS.len(), 7);
        assert_eq!(ATTENDANCE_COLUMNS[5], "Hours Worked");
    }

    #[test]
    fn attendance_workbook_is_a_zip_container() {
        let rows = vec![AttendanceRow {
            employee_code: "EMP-004".into(),
            employee_name: "Esha Verma".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: NaiveTime::from_hms_opt(9, 0, 0),
            check_out: NaiveTime::from_hms_opt(17, 30, 0),
        }];
        let bytes = render_attendance_xlsx(&rows).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn empty_reports_still_render() {
        assert!(render_attendance_xlsx(&[]).unwrap().starts_with(b"PK"));
        assert!(render_payroll_register_xlsx(&[]).unwrap().starts_with(b"PK"));
    }
}
