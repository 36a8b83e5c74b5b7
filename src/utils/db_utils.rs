use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> Result<SqlValue, AppError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::BadRequest("Unsupported number".into()));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::BadRequest("Unsupported JSON value type".into())),
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `allowed_columns` may appear in `fields`; anything else
/// is rejected so request bodies can never name arbitrary columns.
pub fn build_update_sql(
    table: &str,
    fields: &Map<String, Value>,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    if fields.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    if let Some(unknown) = fields.keys().find(|k| !allowed_columns.contains(&k.as_str())) {
        return Err(AppError::BadRequest(format!("Field '{unknown}' cannot be updated")));
    }

    let set_clause = fields
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(fields.len() + 1);
    for value in fields.values() {
        values.push(to_sql_value(value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// Binds `values` in order onto any sqlx query builder (`query`, `query_as`,
/// `query_scalar`).
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        use $crate::utils::db_utils::SqlValue;
        let mut query = $query;
        for value in $values {
            query = match value {
                SqlValue::String(v) => query.bind(v.clone()),
                SqlValue::I64(v) => query.bind(*v),
                SqlValue::U64(v) => query.bind(*v),
                SqlValue::F64(v) => query.bind(*v),
                SqlValue::Bool(v) => query.bind(*v),
                SqlValue::Date(v) => query.bind(*v),
                SqlValue::DateTime(v) => query.bind(*v),
                SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }};
}
pub(crate) use bind_values;

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'c, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = sqlx::MySql>,
{
    let query = bind_values!(sqlx::query(&update.sql), update.values.iter());
    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_owned())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

/// ===============================
/// Dynamic WHERE clause
/// ===============================
///
/// Conditions are ANDed; `values` line up with the `?` placeholders in the
/// order conditions were added.
#[derive(Debug, Default)]
pub struct Filter {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, condition: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.conditions.push(condition.to_owned());
        self.values.push(value.into());
        self
    }

    /// A condition with several placeholders, e.g. a multi-column `LIKE`.
    pub fn and_many<I>(&mut self, condition: &str, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<SqlValue>,
    {
        self.conditions.push(condition.to_owned());
        self.values.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// Clamped `(page, per_page, offset)` for list endpoints.
pub fn paginate(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn builds_set_clause_in_key_order() {
        let update = build_update_sql(
            "employees",
            &fields(json!({"first_name": "Asha", "hire_date": "2024-02-01", "manager_id": 3})),
            &["first_name", "hire_date", "manager_id"],
            "id",
            9,
        )
        .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE employees SET first_name = ?, hire_date = ?, manager_id = ? WHERE id = ?"
        );
        assert_eq!(update.values[0], SqlValue::String("Asha".into()));
        assert_eq!(
            update.values[1],
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert_eq!(update.values[2], SqlValue::U64(3));
        assert_eq!(update.values[3], SqlValue::U64(9));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = build_update_sql(
            "employees",
            &fields(json!({"id = 1; --": "x"})),
            &["first_name"],
            "id",
            1,
        );
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(build_update_sql("employees", &Map::new(), &["first_name"], "id", 1).is_err());
    }

    #[test]
    fn filter_joins_conditions_in_order() {
        let mut filter = Filter::new();
        assert_eq!(filter.where_clause(), "");

        filter
            .and("department_id = ?", 2u64)
            .and_many("(first_name LIKE ? OR email LIKE ?)", ["%an%", "%an%"]);
        assert_eq!(
            filter.where_clause(),
            "WHERE department_id = ? AND (first_name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(filter.values.len(), 3);
        assert_eq!(filter.values[0], SqlValue::U64(2));
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(paginate(None, None), (1, 20, 0));
        assert_eq!(paginate(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(paginate(Some(3), Some(10)), (3, 10, 20));
    }
}
