use crate::{
    api::Paginated,
    auth::{
        auth::AuthUser,
        permissions::{EMPLOYEE_CREATE, EMPLOYEE_DELETE, EMPLOYEE_READ, EMPLOYEE_READ_OWN, EMPLOYEE_UPDATE},
    },
    cache::{CacheHandle, employee_key},
    db::is_constraint_violation,
    error::{AppError, AppResult},
    model::employee::{Employee, LeaveBalance},
    services::audit::{self, AuditEntry},
    utils::{
        db_utils::{Filter, bind_values, build_update_sql, execute_update, paginate},
        validation::{
            validate_employee_code, validate_employee_status, validate_hire_date, validate_non_negative,
            validate_payload, validate_phone,
        },
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Columns a PUT body may name.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "designation_id",
    "manager_id",
    "hire_date",
    "status",
    "ctc",
    "casual_leave",
    "sick_leave",
    "earned_leave",
    "maternity_leave",
    "paternity_leave",
];

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateEmployee {
    #[validate(custom(function = "validate_employee_code"))]
    #[schema(example = "EMP-010")]
    pub employee_code: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    #[schema(example = "Asha")]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    #[schema(example = "Rao")]
    pub last_name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "asha.rao@company.com", format = "email")]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    #[schema(example = "+919812345678")]
    pub phone: Option<String>,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = 2)]
    pub designation_id: u64,
    pub manager_id: Option<u64>,
    #[validate(custom(function = "validate_hire_date"))]
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[validate(custom(function = "validate_employee_status"))]
    #[schema(example = "active")]
    pub status: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(example = "900000.00", value_type = Option<String>)]
    pub ctc: Option<Decimal>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub casual_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub sick_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub earned_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub maternity_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub paternity_leave: Option<i64>,
}

/// Partial update; every present field is checked with the same rules as create.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmployee {
    #[validate(custom(function = "validate_employee_code"))]
    pub employee_code: Option<String>,
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub department_id: Option<u64>,
    pub designation_id: Option<u64>,
    pub manager_id: Option<u64>,
    #[validate(custom(function = "validate_hire_date"))]
    #[schema(format = "date", value_type = Option<String>)]
    pub hire_date: Option<NaiveDate>,
    #[validate(custom(function = "validate_employee_status"))]
    pub status: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub ctc: Option<Decimal>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub casual_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub sick_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub earned_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub maternity_leave: Option<i64>,
    #[validate(range(min = 0i64, max = 4294967295i64, message = "Leave balance must be between 0 and 4294967295"))]
    pub paternity_leave: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub designation_id: Option<u64>,
    pub manager_id: Option<u64>,
    pub status: Option<String>,
    /// Matches first name, last name, email or employee code
    pub search: Option<String>,
}

/// Balance from a create request, or the default allocation when absent.
fn leave_days(value: Option<i64>, default: u32) -> AppResult<u32> {
    match value {
        None => Ok(default),
        Some(n) => u32::try_from(n).map_err(|_| AppError::BadRequest(format!("Leave balance {n} is out of range"))),
    }
}

/// Cache keys made stale by deleting an employee: its own entry and those of
/// its direct reports, whose `manager_id` the foreign key clears.
fn keys_after_delete(employee_id: u64, direct_reports: &[u64]) -> Vec<String> {
    std::iter::once(employee_id)
        .chain(direct_reports.iter().copied())
        .map(employee_key)
        .collect()
}

/// Loads one employee, going through the shared cache when one is configured.
pub async fn fetch_employee(pool: &MySqlPool, cache: &CacheHandle, employee_id: u64) -> AppResult<Employee> {
    let key = employee_key(employee_id);
    if let Some(employee) = cache.get_json::<Employee>(&key).await {
        debug!(employee_id, "Employee served from cache");
        return Ok(employee);
    }

    let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Employee not found".into()))?;

    cache.set_json(&key, &employee).await;
    Ok(employee)
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 5
        })),
        (status = 409, description = "Employee code or email already exists"),
        (status = 422, description = "Validation failed", body = Object, example = json!({
            "message": "Validation failed",
            "errors": {"email": ["Invalid email format"]}
        })),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_permission(EMPLOYEE_CREATE)?;
    validate_payload(&*payload)?;

    let defaults = LeaveBalance::default_allocation();

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, designation_id,
         manager_id, hire_date, status, ctc,
         casual_leave, sick_leave, earned_leave, maternity_leave, paternity_leave)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.employee_code)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.department_id)
    .bind(payload.designation_id)
    .bind(payload.manager_id)
    .bind(payload.hire_date)
    .bind(payload.status.as_deref().unwrap_or("active"))
    .bind(payload.ctc.unwrap_or_default())
    .bind(leave_days(payload.casual_leave, defaults.casual)?)
    .bind(leave_days(payload.sick_leave, defaults.sick)?)
    .bind(leave_days(payload.earned_leave, defaults.earned)?)
    .bind(leave_days(payload.maternity_leave, defaults.maternity)?)
    .bind(leave_days(payload.paternity_leave, defaults.paternity)?)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict(
                "Employee code or email already exists, or a referenced record is missing".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "Failed to Create Employee");
            return Err(AppError::Internal);
        }
    };

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "create",
            entity: "employee",
            entity_id: Some(id),
            changes: serde_json::to_value(&*payload).ok(),
        },
    )
    .await;

    info!(employee_id = id, created_by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = crate::api::EmployeePage),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    auth.require_permission(EMPLOYEE_READ)?;

    let (page, per_page, offset) = paginate(query.page, query.per_page);

    // ---------- build WHERE clause dynamically ----------
    let mut filter = Filter::new();
    if let Some(department_id) = query.department_id {
        filter.and("department_id = ?", department_id);
    }
    if let Some(designation_id) = query.designation_id {
        filter.and("designation_id = ?", designation_id);
    }
    if let Some(manager_id) = query.manager_id {
        filter.and("manager_id = ?", manager_id);
    }
    if let Some(status) = &query.status {
        filter.and("status = ?", status.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let like = format!("%{}%", search.trim());
        filter.and_many(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)",
            [like.clone(), like.clone(), like.clone(), like],
        );
    }
    let where_clause = filter.where_clause();

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?filter.values, "Counting employees");

    let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), filter.values.iter())
        .fetch_one(pool.get_ref())
        .await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let employees = bind_values!(sqlx::query_as::<_, Employee>(&data_sql), filter.values.iter())
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_own_or(EMPLOYEE_READ, EMPLOYEE_READ_OWN, employee_id)?;

    let employee = fetch_employee(pool.get_ref(), cache.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_permission(EMPLOYEE_UPDATE)?;
    let employee_id = path.into_inner();

    let fields = body
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Body must be a JSON object".into()))?;

    let typed: UpdateEmployee = serde_json::from_value(body.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid employee update: {e}")))?;
    validate_payload(&typed)?;

    let update = build_update_sql("employees", fields, UPDATABLE_COLUMNS, "id", employee_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Employee code or email already exists".into()));
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to update employee");
            return Err(AppError::Internal);
        }
    };

    // MySQL reports 0 for a no-op update too, so check existence before answering 404
    if affected == 0 {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM employees WHERE id = ?)")
            .bind(employee_id)
            .fetch_one(pool.get_ref())
            .await?;
        if !exists {
            return Err(AppError::NotFound("Employee not found".into()));
        }
    }

    cache.invalidate(&employee_key(employee_id)).await;

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "update",
            entity: "employee",
            entity_id: Some(employee_id),
            changes: Some(body.into_inner()),
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<CacheHandle>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_permission(EMPLOYEE_DELETE)?;
    let employee_id = path.into_inner();

    let direct_reports = sqlx::query_scalar::<_, u64>("SELECT id FROM employees WHERE manager_id = ?")
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await?;

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => {
            return Err(AppError::NotFound("Employee not found".into()));
        }
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(AppError::Conflict("Employee is still referenced by other records".into()));
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");
            return Err(AppError::Internal);
        }
    }

    for key in keys_after_delete(employee_id, &direct_reports) {
        cache.invalidate(&key).await;
    }

    audit::record(
        pool.get_ref(),
        AuditEntry {
            user_id: Some(auth.user_id),
            action: "delete",
            entity: "employee",
            entity_id: Some(employee_id),
            changes: None,
        },
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Current leave balances of one employee
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}/leave-balance",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Leave balance", body = LeaveBalance),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_leave_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    auth.require_own_or(EMPLOYEE_READ, EMPLOYEE_READ_OWN, employee_id)?;

    let balance = sqlx::query_as::<_, LeaveBalance>(
        r#"
        SELECT casual_leave, sick_leave, earned_leave, maternity_leave, paternity_leave
        FROM employees
        WHERE id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Employee not found".into()))?;

    Ok(HttpResponse::Ok().json(balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::collect_errors;

    fn valid() -> CreateEmployee {
        CreateEmployee {
            employee_code: "EMP-010".into(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha.rao@company.com".into(),
            phone: Some("+91 98123 45678".into()),
            department_id: 1,
            designation_id: 2,
            manager_id: None,
            hire_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            status: None,
            ctc: Some(Decimal::new(90_000_000, 2)),
            casual_leave: None,
            sick_leave: None,
            earned_leave: None,
            maternity_leave: None,
            paternity_leave: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn every_failing_field_is_reported() {
        let payload = CreateEmployee {
            employee_code: "emp10".into(),
            first_name: "".into(),
            email: "not-an-email".into(),
            phone: Some("12ab".into()),
            status: Some("retired".into()),
            ctc: Some(Decimal::new(-1, 0)),
            sick_leave: Some(-2),
            ..valid()
        };
        let errors = collect_errors(&payload.validate().unwrap_err());
        for field in [
            "employee_code",
            "first_name",
            "email",
            "phone",
            "status",
            "ctc",
            "sick_leave",
        ] {
            assert!(errors.contains_key(field), "missing error for {field}");
        }
        assert!(!errors.contains_key("last_name"));
    }

    #[test]
    fn oversized_balance_is_a_field_error() {
        let payload = CreateEmployee {
            casual_leave: Some(4_294_967_296),
            ..valid()
        };
        let errors = collect_errors(&payload.validate().unwrap_err());
        assert!(errors.contains_key("casual_leave"));

        let update = UpdateEmployee {
            earned_leave: Some(i64::MAX),
            ..Default::default()
        };
        let errors = collect_errors(&update.validate().unwrap_err());
        assert!(errors.contains_key("earned_leave"));
    }

    #[test]
    fn balances_are_stored_without_wrapping() {
        assert_eq!(leave_days(None, 12).unwrap(), 12);
        assert_eq!(leave_days(Some(4_294_967_295), 12).unwrap(), u32::MAX);
        assert!(matches!(leave_days(Some(4_294_967_296), 12), Err(AppError::BadRequest(_))));
        assert!(matches!(leave_days(Some(-1), 12), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn deleting_a_manager_clears_the_reports_cache_entries() {
        assert_eq!(
            keys_after_delete(3, &[4, 7]),
            vec![employee_key(3), employee_key(4), employee_key(7)]
        );
        assert_eq!(keys_after_delete(9, &[]), vec![employee_key(9)]);
    }

    #[test]
    fn update_rejects_unknown_fields() {
        let parsed: Result<UpdateEmployee, _> = serde_json::from_value(json!({"salary": 10}));
        assert!(parsed.is_err());
    }

    #[test]
    fn update_columns_match_the_update_payload() {
        let all = json!({
            "employee_code": "EMP-011", "first_name": "A", "last_name": "B",
            "email": "a@b.co", "phone": "9812345678", "department_id": 1,
            "designation_id": 1, "manager_id": 2, "hire_date": "2024-01-01",
            "status": "active", "ctc": "100.00", "casual_leave": 1, "sick_leave": 1,
            "earned_leave": 1, "maternity_leave": 0, "paternity_leave": 0
        });
        let typed: UpdateEmployee = serde_json::from_value(all.clone()).unwrap();
        assert!(typed.validate().is_ok());
        for key in all.as_object().unwrap().keys() {
            assert!(UPDATABLE_COLUMNS.contains(&key.as_str()), "{key} not updatable");
        }
    }
}
