use crate::error::AppError;
use crate::utils::pagination::PageQuery;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{FromRow, MySql, MySqlPool};
use tracing::debug;

/// SQL bindable value decoded from a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Converts one JSON scalar into a typed SQL value.
///
/// Strings that look like dates, timestamps or wall-clock times are bound with
/// their chrono type so MySQL does not have to coerce them.
pub fn json_to_sql_value(value: &Value) -> Result<SqlValue, AppError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                SqlValue::DateTime(dt)
            } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
                SqlValue::Time(t)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::bad_request("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::bad_request("Unsupported JSON value type")),
    })
}

/// Builds a partial `UPDATE` from a JSON object.
///
/// Only keys listed in `allowed` may be written; anything else is rejected so
/// column names never reach the SQL text unchecked.
pub fn build_update_sql(
    table: &str,
    allowed: &[&str],
    payload: &Value,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj: &Map<String, Value> = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        if !allowed.contains(&key.as_str()) {
            return Err(AppError::BadRequest(format!("Field '{key}' cannot be updated")));
        }
        columns.push(format!("{key} = ?"));
        values.push(json_to_sql_value(value)?);
    }

    let sql = format!("UPDATE {} SET {} WHERE id = ?", table, columns.join(", "));
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

// Query, QueryAs and QueryScalar share `bind` but no trait.
macro_rules! bind_sql_value {
    ($query:expr, $value:expr) => {
        match $value {
            SqlValue::String(v) => $query.bind(v),
            SqlValue::I64(v) => $query.bind(v),
            SqlValue::U64(v) => $query.bind(v),
            SqlValue::F64(v) => $query.bind(v),
            SqlValue::Bool(v) => $query.bind(v),
            SqlValue::Date(v) => $query.bind(v),
            SqlValue::DateTime(v) => $query.bind(v),
            SqlValue::Time(v) => $query.bind(v),
            SqlValue::Null => $query.bind(None::<String>),
        }
    };
}

pub fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    bind_sql_value!(query, value)
}

pub fn bind_value_as<'q, T>(
    query: QueryAs<'q, MySql, T, MySqlArguments>,
    value: SqlValue,
) -> QueryAs<'q, MySql, T, MySqlArguments> {
    bind_sql_value!(query, value)
}

pub fn bind_value_scalar<'q, O>(
    query: QueryScalar<'q, MySql, O, MySqlArguments>,
    value: SqlValue,
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    bind_sql_value!(query, value)
}

/// `WHERE` clause assembled from optional list filters.
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw condition with one value per `?`.
    pub fn push(&mut self, condition: &str, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
        self
    }

    /// `column = ?` when `value` is present.
    pub fn eq<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(&format!("{column} = ?"), [v.into()]);
        }
        self
    }

    /// `column >= ?` when `value` is present.
    pub fn at_least<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(&format!("{column} >= ?"), [v.into()]);
        }
        self
    }

    /// `column <= ?` when `value` is present.
    pub fn at_most<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(&format!("{column} <= ?"), [v.into()]);
        }
        self
    }

    /// Case-insensitive substring match over several columns.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let like = format!("%{term}%");
        let condition = columns
            .iter()
            .map(|c| format!("{c} LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            &format!("({condition})"),
            columns.iter().map(|_| SqlValue::String(like.clone())),
        )
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Counts and fetches one page of `from` rows matching `filters`.
pub async fn fetch_page<T>(
    pool: &MySqlPool,
    from: &str,
    columns: &str,
    filters: &Filters,
    order_by: &str,
    page: &PageQuery,
) -> Result<(Vec<T>, i64), sqlx::Error>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let where_clause = filters.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM {from} {where_clause}");
    debug!(sql = %count_sql, values = ?filters.values(), "Counting rows");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for value in filters.values() {
        count_query = bind_value_scalar(count_query, value.clone());
    }
    let total = count_query.fetch_one(pool).await?;

    let data_sql = format!(
        "SELECT {columns} FROM {from} {where_clause} ORDER BY {order_by} LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page = page.page(), per_page = page.per_page(), "Fetching page");

    let mut data_query = sqlx::query_as::<_, T>(&data_sql);
    for value in filters.values() {
        data_query = bind_value_as(data_query, value.clone());
    }
    let rows = data_query
        .bind(page.per_page() as i64)
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    Ok((rows, total))
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);
    for value in update.values {
        query = bind_value(query, value);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Fetches every `from` row matching `filters`.
pub async fn fetch_filtered<T>(
    pool: &MySqlPool,
    from: &str,
    columns: &str,
    filters: &Filters,
    order_by: &str,
) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {columns} FROM {from} {} ORDER BY {order_by}",
        filters.where_clause()
    );
    let mut query = sqlx::query_as::<_, T>(&sql);
    for value in filters.values() {
        query = bind_value_as(query, value.clone());
    }
    query.fetch_all(pool).await
}

pub async fn find_by_id<T>(
    pool: &MySqlPool,
    table: &str,
    columns: &str,
    id: u64,
) -> Result<Option<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let sql = format!("SELECT {columns} FROM {table} WHERE id = ?");
    sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(pool).await
}

/// Deletes a row by primary key; returns rows affected.
pub async fn delete_by_id(pool: &MySqlPool, table: &str, id: u64) -> Result<u64, sqlx::Error> {
    let sql = format!("DELETE FROM {table} WHERE id = ?");
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Checks existence of a row by primary key.
pub async fn row_exists(pool: &MySqlPool, table: &str, id: u64) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id = ?");
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
    Ok(count > 0)
}

/// Reads an enum-valued column from a partial update body.
///
/// An absent key is `None`; a present key must be a string naming a variant,
/// so `null` and numbers are refused before they reach a `NOT NULL` column.
pub fn enum_field<E: std::str::FromStr>(
    body: &Value,
    key: &str,
    label: &str,
) -> Result<Option<E>, AppError> {
    let Some(value) = body.get(key) else {
        return Ok(None);
    };
    let raw = value
        .as_str()
        .ok_or_else(|| AppError::BadRequest(format!("{key} must be a string")))?;
    E::from_str(raw)
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("Unknown {label} {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vehicle::VehicleStatus;
    use serde_json::json;

    #[test]
    fn enum_field_requires_a_known_string() {
        let parsed: Option<VehicleStatus> =
            enum_field(&json!({"status": "maintenance"}), "status", "vehicle status").unwrap();
        assert_eq!(parsed, Some(VehicleStatus::Maintenance));

        let absent: Option<VehicleStatus> =
            enum_field(&json!({"plate": "X"}), "status", "vehicle status").unwrap();
        assert_eq!(absent, None);

        for body in [json!({"status": 7}), json!({"status": null}), json!({"status": "parked"})] {
            let result = enum_field::<VehicleStatus>(&body, "status", "vehicle status");
            assert!(matches!(result, Err(AppError::BadRequest(_))), "{body}");
        }
    }

    #[test]
    fn update_sql_keeps_payload_order_and_appends_id() {
        let update = build_update_sql(
            "vehicles",
            &["make", "status"],
            &json!({"make": "Toyota", "status": "maintenance"}),
            7,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE vehicles SET make = ?, status = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Toyota".into()),
                SqlValue::String("maintenance".into()),
                SqlValue::U64(7)
            ]
        );
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = build_update_sql("employees", &["first_name"], &json!({"id; DROP": 1}), 1)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn empty_and_non_object_payloads_are_rejected() {
        assert!(build_update_sql("clients", &["name"], &json!({}), 1).is_err());
        assert!(build_update_sql("clients", &["name"], &json!([1, 2]), 1).is_err());
    }

    #[test]
    fn strings_are_typed_when_they_look_temporal() {
        assert_eq!(
            json_to_sql_value(&json!("2026-03-01")).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        );
        assert_eq!(
            json_to_sql_value(&json!("09:30:00")).unwrap(),
            SqlValue::Time(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
        assert!(matches!(
            json_to_sql_value(&json!("2026-03-01 08:00:00")).unwrap(),
            SqlValue::DateTime(_)
        ));
        assert_eq!(
            json_to_sql_value(&json!("hello")).unwrap(),
            SqlValue::String("hello".into())
        );
    }

    #[test]
    fn filters_skip_missing_values() {
        let mut filters = Filters::new();
        filters
            .eq("employee_id", Some(4u64))
            .eq::<String>("status", None)
            .at_least("date", NaiveDate::from_ymd_opt(2026, 1, 1))
            .search(&["first_name", "email"], Some(" ali "));

        assert_eq!(
            filters.where_clause(),
            "WHERE employee_id = ? AND date >= ? AND (first_name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(filters.values().len(), 4);
        assert_eq!(filters.values()[2], SqlValue::String("%ali%".into()));
    }

    #[test]
    fn empty_filters_have_no_where_clause() {
        let mut filters = Filters::new();
        filters.search(&["name"], Some("   "));
        assert_eq!(filters.where_clause(), "");
        assert!(filters.values().is_empty());
    }

    #[test]
    fn nested_values_are_not_bindable() {
        assert!(json_to_sql_value(&json!({"a": 1})).is_err());
        assert_eq!(json_to_sql_value(&json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(json_to_sql_value(&json!(2.5)).unwrap(), SqlValue::F64(2.5));
    }
}
