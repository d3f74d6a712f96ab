use crate::{
    auth::{auth::AuthUser, password::hash_password},
    error::{AppError, AppResult, ErrorBody, failure_reason},
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus},
        role::Role,
    },
    service::{
        codes::{EMPLOYEE_PREFIX, EMPLOYEE_WIDTH, allocate_code, current_max, next_code},
        import::{CHUNK_SIZE, Chunk, ChunkReport, ImportReport, ImportRow, parse_chunks},
    },
    utils::{
        db_utils::{Filters, build_update_sql, delete_by_id, execute_update, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "designation",
    "join_date",
    "status",
    "basic_salary",
    "overtime_rate",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    /// Generated as `EMP-001` style when omitted
    #[schema(example = "EMP-014")]
    pub employee_code: Option<String>,
    #[schema(example = "Rahim")]
    pub first_name: String,
    #[schema(example = "Uddin")]
    pub last_name: Option<String>,
    #[schema(example = "rahim@company.com", format = "email")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<u64>,
    #[schema(example = "Driver")]
    pub designation: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub join_date: NaiveDate,
    #[schema(example = "active")]
    pub status: Option<EmployeeStatus>,
    #[schema(example = "25000.00", value_type = String)]
    pub basic_salary: Option<Decimal>,
    #[schema(example = "150.00", value_type = String)]
    pub overtime_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeFilter {
    pub department_id: Option<u64>,
    /// active, inactive or terminated
    pub status: Option<String>,
    /// Matches code, names and email
    pub search: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetPassword {
    #[schema(example = "s3cure-pass")]
    pub password: String,
}

page_response!(EmployeeListResponse, Employee);

pub const MIN_PASSWORD_LEN: usize = 8;

pub async fn load_employee(pool: &MySqlPool, id: u64) -> AppResult<Employee> {
    find_by_id(pool, "employees", EMPLOYEE_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Employee"))
}

fn check_status(raw: &str) -> AppResult<()> {
    EmployeeStatus::from_str(raw)
        .map(|_| ())
        .map_err(|_| AppError::BadRequest(format!("Unknown employee status {raw}")))
}

fn check_money(name: &str, value: Option<Decimal>) -> AppResult<()> {
    match value {
        Some(v) if v.is_sign_negative() => {
            Err(AppError::BadRequest(format!("{name} must not be negative")))
        }
        _ => Ok(()),
    }
}

/// Create employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Invalid payload or unknown department", body = ErrorBody),
        (status = 409, description = "Code or email already used", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;

    if payload.first_name.trim().is_empty() {
        return Err(AppError::bad_request("first_name is required"));
    }
    check_money("basic_salary", payload.basic_salary)?;
    check_money("overtime_rate", payload.overtime_rate)?;

    let code = match payload.employee_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => {
            allocate_code(
                pool.get_ref(),
                "employees",
                "employee_code",
                EMPLOYEE_PREFIX,
                EMPLOYEE_WIDTH,
            )
            .await?
        }
    };
    let status = payload.status.unwrap_or(EmployeeStatus::Active);

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, designation,
         join_date, status, basic_salary, overtime_rate)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(payload.first_name.trim())
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.department_id)
    .bind(&payload.designation)
    .bind(payload.join_date)
    .bind(status.as_ref())
    .bind(payload.basic_salary.unwrap_or_default())
    .bind(payload.overtime_rate.unwrap_or_default())
    .execute(pool.get_ref())
    .await?;

    let employee = load_employee(pool.get_ref(), result.last_insert_id()).await?;
    info!(employee_id = employee.id, code = %employee.employee_code, "Employee created");
    Ok(HttpResponse::Created().json(employee))
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(PageQuery, EmployeeFilter),
    responses((status = 200, description = "Paginated employee list", body = EmployeeListResponse)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<EmployeeFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("department_id", filter.department_id)
        .eq("status", filter.status.clone())
        .search(
            &["employee_code", "first_name", "last_name", "email"],
            filter.search.as_deref(),
        );

    let (data, total) = fetch_page(
        pool.get_ref(),
        "employees",
        EMPLOYEE_COLUMNS,
        &filters,
        "id DESC",
        &page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse::new(data, &page, total)))
}

/// Get employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load_employee(pool.get_ref(), path.into_inner()).await?))
}

/// Update employee
///
/// Partial update; send only the fields to change.
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    request_body(content = Object, example = json!({"designation": "Senior driver", "basic_salary": "28000.00"})),
    responses(
        (status = 200, description = "Updated employee", body = Employee),
        (status = 400, description = "Unknown field or invalid value", body = ErrorBody),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let employee_id = path.into_inner();

    if let Some(status) = body.get("status") {
        check_status(status.as_str().unwrap_or_default())?;
    }

    let update = build_update_sql("employees", UPDATABLE, &body, employee_id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load_employee(pool.get_ref(), employee_id).await?))
}

/// Delete employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id", Path, description = "Employee ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let employee_id = path.into_inner();

    if delete_by_id(pool.get_ref(), "employees", employee_id).await? == 0 {
        return Err(AppError::not_found("Employee"));
    }
    info!(employee_id, "Employee deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// Set self-service password
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}/password",
    params(("employee_id", Path, description = "Employee ID")),
    request_body = SetPassword,
    responses(
        (status = 204, description = "Password set"),
        (status = 400, description = "Password too short", body = ErrorBody),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn set_employee_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<SetPassword>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let employee_id = path.into_inner();

    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let hash = hash_password(&body.password).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let affected = sqlx::query("UPDATE employees SET password_hash = ? WHERE id = ?")
        .bind(hash)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("Employee"));
    }

    // existing sessions must log in again
    sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE principal = 'employee' AND subject_id = ?",
    )
    .bind(employee_id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

async fn insert_chunk(pool: &MySqlPool, rows: &[ImportRow]) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut sequence = current_max(&mut *tx, "employees", "employee_code", EMPLOYEE_PREFIX)
        .await?
        .unwrap_or(0);

    for row in rows {
        let code = next_code(EMPLOYEE_PREFIX, EMPLOYEE_WIDTH, Some(sequence));
        sequence += 1;

        sqlx::query(
            r#"
            INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department_id, designation,
             join_date, basic_salary, overtime_rate)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(code)
        .bind(&row.first_name)
        .bind(&row.last_name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(row.department_id)
        .bind(&row.designation)
        .bind(row.join_date)
        .bind(row.basic_salary.unwrap_or_default())
        .bind(row.overtime_rate.unwrap_or_default())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len())
}

async fn import_chunk(pool: &MySqlPool, chunk: &Chunk) -> ChunkReport {
    let rows = match &chunk.rows {
        Ok(rows) => rows,
        Err(e) => return ChunkReport::failed(chunk, e.clone()),
    };

    match insert_chunk(pool, rows).await {
        Ok(inserted) => ChunkReport::ok(chunk, inserted),
        Err(e) => {
            warn!(chunk = chunk.index, error = %e, "Import chunk failed");
            ChunkReport::failed(chunk, failure_reason(e))
        }
    }
}

/// Bulk import employees from CSV
///
/// Body is raw CSV with a header row. Columns: first_name, last_name, email,
/// phone, department_id, designation, join_date, basic_salary, overtime_rate.
/// Rows are inserted in chunks of 50; a failed chunk does not undo earlier ones.
#[utoipa::path(
    post,
    path = "/api/employees/import",
    request_body(content = String, content_type = "text/csv"),
    responses(
        (status = 200, description = "Per-chunk import report", body = ImportReport),
        (status = 400, description = "Malformed CSV header or empty file", body = ErrorBody)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn import_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;

    let chunks = parse_chunks(&body, CHUNK_SIZE)?;

    let mut reports = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        reports.push(import_chunk(pool.get_ref(), chunk).await);
    }

    let report = ImportReport::from_chunks(reports);
    info!(
        total = report.total_rows,
        inserted = report.inserted,
        failed = report.failed_rows,
        "Employee import finished"
    );
    Ok(HttpResponse::Ok().json(report))
}

/// Used by the attendance and payroll modules before touching an employee's rows.
pub async fn ensure_employee(pool: &MySqlPool, employee_id: u64) -> AppResult<()> {
    if crate::utils::db_utils::row_exists(pool, "employees", employee_id).await? {
        Ok(())
    } else {
        Err(AppError::not_found("Employee"))
    }
}
