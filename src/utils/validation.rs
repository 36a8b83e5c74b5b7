use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;

/// Field name -> messages, sorted by field for stable responses.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Runs the derived rules and turns failures into a 422 listing every bad field.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(collect_errors(&e)))
}

pub fn collect_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(m) => m.to_string(),
                    None => e.code.to_string(),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// `EMP-001` style: 2-5 uppercase letters, a dash, 3-6 digits.
pub fn validate_employee_code(code: &str) -> Result<(), ValidationError> {
    let Some((prefix, number)) = code.split_once('-') else {
        return Err(rule("employee_code", "Employee code must look like EMP-001"));
    };
    let prefix_ok = (2..=5).contains(&prefix.len()) && prefix.chars().all(|c| c.is_ascii_uppercase());
    let number_ok = (3..=6).contains(&number.len()) && number.chars().all(|c| c.is_ascii_digit());
    if prefix_ok && number_ok {
        Ok(())
    } else {
        Err(rule("employee_code", "Employee code must look like EMP-001"))
    }
}

/// Optional leading `+`, then 10-15 digits; spaces and dashes are ignored.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let mut count = 0;
    for c in digits.chars() {
        match c {
            '0'..='9' => count += 1,
            ' ' | '-' => {}
            _ => return Err(rule("phone", "Phone number may only contain digits")),
        }
    }
    if (10..=15).contains(&count) {
        Ok(())
    } else {
        Err(rule("phone", "Phone number must have 10 to 15 digits"))
    }
}

/// Hire dates more than a year ahead are almost always typos.
pub fn validate_hire_date(date: &NaiveDate) -> Result<(), ValidationError> {
    let limit = Utc::now().date_naive() + Duration::days(365);
    if *date > limit {
        Err(rule("hire_date", "Hire date cannot be more than a year in the future"))
    } else {
        Ok(())
    }
}

pub fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(rule("non_negative", "Amount cannot be negative"))
    } else {
        Ok(())
    }
}

pub fn validate_employee_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "active" | "inactive" | "on_leave" | "terminated" => Ok(()),
        _ => Err(rule(
            "status",
            "Status must be one of active, inactive, on_leave, terminated",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employee_codes() {
        assert!(validate_employee_code("EMP-001").is_ok());
        assert!(validate_employee_code("HR-123456").is_ok());
        assert!(validate_employee_code("emp-001").is_err());
        assert!(validate_employee_code("EMP001").is_err());
        assert!(validate_employee_code("EMP-01").is_err());
        assert!(validate_employee_code("EMPLOYEE-001").is_err());
    }

    #[test]
    fn phones() {
        assert!(validate_phone("+91 98123 45678").is_ok());
        assert!(validate_phone("9812345678").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("98123abc78").is_err());
    }

    #[test]
    fn hire_date_far_future_rejected() {
        let today = Utc::now().date_naive();
        assert!(validate_hire_date(&today).is_ok());
        assert!(validate_hire_date(&(today + Duration::days(800))).is_err());
    }

    #[test]
    fn negative_amounts_rejected() {
        assert!(validate_non_negative(&Decimal::new(100, 0)).is_ok());
        assert!(validate_non_negative(&Decimal::ZERO).is_ok());
        assert!(validate_non_negative(&Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn statuses() {
        assert!(validate_employee_status("active").is_ok());
        assert!(validate_employee_status("retired").is_err());
    }
}
