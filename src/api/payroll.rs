use crate::{
    api::employee::{ensure_employee, load_employee},
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        leave_period::{LEAVE_COLUMNS, LeavePeriod, LeaveType},
        payroll::{PAYSLIP_COLUMNS, PayrollAdjustment, Payslip},
        role::Role,
    },
    service::{
        leave::overlap_days,
        payroll_calc::{PayInputs, compute_pay, days_in_month, month_bounds, parse_month},
    },
    utils::{
        db_utils::{Filters, SqlValue, delete_by_id, fetch_filtered, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const ADJUSTMENT_COLUMNS: &str = "id, employee_id, amount, date, note, created_at";

/// Salary advances and ad-hoc deductions live in twin tables.
#[derive(Debug, Clone, Copy)]
enum Adjustment {
    Advance,
    Deduction,
}

impl Adjustment {
    fn table(self) -> &'static str {
        match self {
            Adjustment::Advance => "salary_advances",
            Adjustment::Deduction => "salary_deductions",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Adjustment::Advance => "Advance",
            Adjustment::Deduction => "Deduction",
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAdjustment {
    pub employee_id: u64,
    #[schema(example = "2000.00", value_type = String)]
    pub amount: Decimal,
    #[schema(example = "2026-03-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdjustmentFilter {
    pub employee_id: Option<u64>,
    /// Pay month, `YYYY-MM`
    pub month: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GeneratePayslip {
    pub employee_id: u64,
    #[schema(example = "2026-03")]
    pub month: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayslipFilter {
    pub employee_id: Option<u64>,
    /// Pay month, `YYYY-MM`
    pub month: Option<String>,
}

page_response!(AdjustmentListResponse, PayrollAdjustment);
page_response!(PayslipListResponse, Payslip);

fn month_arg(raw: &str) -> AppResult<NaiveDate> {
    parse_month(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid month {raw}, expected YYYY-MM")))
}

async fn create_adjustment(
    kind: Adjustment,
    pool: &MySqlPool,
    payload: &CreateAdjustment,
) -> AppResult<PayrollAdjustment> {
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::bad_request("amount must be greater than zero"));
    }
    ensure_employee(pool, payload.employee_id).await?;

    let sql = format!(
        "INSERT INTO {} (employee_id, amount, date, note) VALUES (?, ?, ?, ?)",
        kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(payload.employee_id)
        .bind(payload.amount)
        .bind(payload.date)
        .bind(&payload.note)
        .execute(pool)
        .await?;

    info!(
        kind = kind.label(),
        employee_id = payload.employee_id,
        amount = %payload.amount,
        "Payroll adjustment recorded"
    );
    find_by_id(pool, kind.table(), ADJUSTMENT_COLUMNS, result.last_insert_id())
        .await?
        .ok_or_else(|| AppError::not_found(kind.label()))
}

async fn list_adjustments(
    kind: Adjustment,
    pool: &MySqlPool,
    filter: &AdjustmentFilter,
    page: &PageQuery,
) -> AppResult<AdjustmentListResponse> {
    let mut filters = Filters::new();
    filters.eq("employee_id", filter.employee_id);
    if let Some(raw) = filter.month.as_deref() {
        let (first, last) = month_bounds(month_arg(raw)?);
        filters.at_least("date", Some(first)).at_most("date", Some(last));
    }

    let (data, total) = fetch_page(
        pool,
        kind.table(),
        ADJUSTMENT_COLUMNS,
        &filters,
        "date DESC, id DESC",
        page,
    )
    .await?;
    Ok(AdjustmentListResponse::new(data, page, total))
}

async fn delete_adjustment(kind: Adjustment, pool: &MySqlPool, id: u64) -> AppResult<()> {
    if delete_by_id(pool, kind.table(), id).await? == 0 {
        return Err(AppError::not_found(kind.label()));
    }
    Ok(())
}

/// Record a salary advance
#[utoipa::path(
    post,
    path = "/api/payroll/advances",
    request_body = CreateAdjustment,
    responses(
        (status = 201, description = "Advance recorded", body = PayrollAdjustment),
        (status = 400, description = "Amount must be positive", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn create_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAdjustment>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let row = create_adjustment(Adjustment::Advance, pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(row))
}

/// List salary advances
#[utoipa::path(
    get,
    path = "/api/payroll/advances",
    params(PageQuery, AdjustmentFilter),
    responses((status = 200, description = "Paginated advances", body = AdjustmentListResponse)),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_advances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<AdjustmentFilter>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance, Role::Hr])?;
    let list = list_adjustments(Adjustment::Advance, pool.get_ref(), &filter, &page).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Delete a salary advance
#[utoipa::path(
    delete,
    path = "/api/payroll/advances/{id}",
    params(("id", Path, description = "Advance ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Advance not found", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn delete_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    delete_adjustment(Adjustment::Advance, pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Record a salary deduction
#[utoipa::path(
    post,
    path = "/api/payroll/deductions",
    request_body = CreateAdjustment,
    responses(
        (status = 201, description = "Deduction recorded", body = PayrollAdjustment),
        (status = 400, description = "Amount must be positive", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn create_deduction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAdjustment>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let row = create_adjustment(Adjustment::Deduction, pool.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(row))
}

/// List salary deductions
#[utoipa::path(
    get,
    path = "/api/payroll/deductions",
    params(PageQuery, AdjustmentFilter),
    responses((status = 200, description = "Paginated deductions", body = AdjustmentListResponse)),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_deductions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<AdjustmentFilter>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance, Role::Hr])?;
    let list = list_adjustments(Adjustment::Deduction, pool.get_ref(), &filter, &page).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Delete a salary deduction
#[utoipa::path(
    delete,
    path = "/api/payroll/deductions/{id}",
    params(("id", Path, description = "Deduction ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Deduction not found", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn delete_deduction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    delete_adjustment(Adjustment::Deduction, pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn sum_amount(
    pool: &MySqlPool,
    table: &str,
    employee_id: u64,
    first: NaiveDate,
    last: NaiveDate,
) -> Result<Decimal, sqlx::Error> {
    let sql = format!(
        "SELECT COALESCE(SUM(amount), 0) FROM {table} WHERE employee_id = ? AND date BETWEEN ? AND ?"
    );
    sqlx::query_scalar(&sql)
        .bind(employee_id)
        .bind(first)
        .bind(last)
        .fetch_one(pool)
        .await
}

/// Collects everything the pay computation needs for one month.
async fn gather_inputs(pool: &MySqlPool, employee_id: u64, month: NaiveDate) -> AppResult<PayInputs> {
    let employee = load_employee(pool, employee_id).await?;
    let (first, last) = month_bounds(month);

    let overtime_minutes: i64 = sqlx::query_scalar(
        r#"
        SELECT CAST(COALESCE(SUM(overtime_minutes), 0) AS SIGNED)
        FROM attendance
        WHERE employee_id = ? AND date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_one(pool)
    .await?;

    let mut filters = Filters::new();
    filters
        .eq("employee_id", Some(employee_id))
        .eq("leave_type", Some(LeaveType::Unpaid.as_ref()))
        .push("to_date >= ? AND from_date <= ?", [SqlValue::Date(first), SqlValue::Date(last)]);
    let unpaid: Vec<LeavePeriod> =
        fetch_filtered(pool, "leave_periods", LEAVE_COLUMNS, &filters, "from_date").await?;
    let unpaid_leave_days = unpaid
        .iter()
        .map(|p| overlap_days(p.from_date, p.to_date, first, last))
        .sum();

    Ok(PayInputs {
        basic_salary: employee.basic_salary,
        overtime_rate: employee.overtime_rate,
        overtime_minutes,
        unpaid_leave_days,
        days_in_month: days_in_month(month),
        advances: sum_amount(pool, "salary_advances", employee_id, first, last).await?,
        deductions: sum_amount(pool, "salary_deductions", employee_id, first, last).await?,
    })
}

/// Generate a payslip
///
/// Overtime pay is overtime minutes times the hourly rate. Unpaid leave is
/// deducted per calendar day. Advances and deductions dated in the month are
/// subtracted. Net pay can be negative.
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayslip,
    responses(
        (status = 201, description = "Payslip generated", body = Payslip),
        (status = 400, description = "Invalid month", body = ErrorBody),
        (status = 404, description = "Employee not found", body = ErrorBody),
        (status = 409, description = "Payslip already generated for the month", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn generate_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GeneratePayslip>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let month = month_arg(&payload.month)?;

    let inputs = gather_inputs(pool.get_ref(), payload.employee_id, month).await?;
    let pay = compute_pay(&inputs);

    let result = sqlx::query(
        r#"
        INSERT INTO payslips
        (employee_id, month, basic_salary, overtime_minutes, overtime_pay, unpaid_leave_days,
         unpaid_leave_deduction, advances, deductions, gross_pay, net_pay)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(month)
    .bind(inputs.basic_salary)
    .bind(inputs.overtime_minutes)
    .bind(pay.overtime_pay)
    .bind(inputs.unpaid_leave_days)
    .bind(pay.unpaid_leave_deduction)
    .bind(inputs.advances)
    .bind(inputs.deductions)
    .bind(pay.gross_pay)
    .bind(pay.net_pay)
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Payslip for {} already generated",
            payload.month.trim()
        )),
        other => other,
    })?;

    info!(
        employee_id = payload.employee_id,
        month = %month,
        net_pay = %pay.net_pay,
        "Payslip generated"
    );
    let payslip: Payslip =
        find_by_id(pool.get_ref(), "payslips", PAYSLIP_COLUMNS, result.last_insert_id())
            .await?
            .ok_or_else(|| AppError::not_found("Payslip"))?;
    Ok(HttpResponse::Created().json(payslip))
}

pub async fn page_payslips(
    pool: &MySqlPool,
    employee_id: Option<u64>,
    month: Option<&str>,
    page: &PageQuery,
) -> AppResult<PayslipListResponse> {
    let mut filters = Filters::new();
    filters.eq("employee_id", employee_id);
    if let Some(raw) = month {
        filters.eq("month", Some(month_arg(raw)?));
    }

    let (data, total) = fetch_page(
        pool,
        "payslips",
        PAYSLIP_COLUMNS,
        &filters,
        "month DESC, id DESC",
        page,
    )
    .await?;
    Ok(PayslipListResponse::new(data, page, total))
}

/// List payslips
#[utoipa::path(
    get,
    path = "/api/payroll/payslips",
    params(PageQuery, PayslipFilter),
    responses((status = 200, description = "Paginated payslips", body = PayslipListResponse)),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<PayslipFilter>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance, Role::Hr])?;
    let list =
        page_payslips(pool.get_ref(), filter.employee_id, filter.month.as_deref(), &page).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Get payslip
#[utoipa::path(
    get,
    path = "/api/payroll/payslips/{id}",
    params(("id", Path, description = "Payslip ID")),
    responses(
        (status = 200, description = "Payslip", body = Payslip),
        (status = 404, description = "Payslip not found", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn get_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance, Role::Hr])?;
    let payslip: Payslip = find_by_id(pool.get_ref(), "payslips", PAYSLIP_COLUMNS, path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Payslip"))?;
    Ok(HttpResponse::Ok().json(payslip))
}

/// Delete payslip
///
/// Lets a month be regenerated after corrections.
#[utoipa::path(
    delete,
    path = "/api/payroll/payslips/{id}",
    params(("id", Path, description = "Payslip ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Payslip not found", body = ErrorBody)
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn delete_payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    if delete_by_id(pool.get_ref(), "payslips", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Payslip"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_argument_is_validated() {
        assert_eq!(
            month_arg("2026-02").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert!(matches!(month_arg("02/2026"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn adjustment_tables() {
        assert_eq!(Adjustment::Advance.table(), "salary_advances");
        assert_eq!(Adjustment::Deduction.table(), "salary_deductions");
    }
}
