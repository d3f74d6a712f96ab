//! Employee self-service. Every handler resolves the caller's own employee id
//! from the token; ids in the query string are never trusted here.

use crate::{
    api::{
        attendance::{AttendanceListResponse, check_in_now, check_out_now},
        employee::load_employee,
        leave::{LeaveFilter, LeaveListResponse, page_leave},
        payroll::{PayslipListResponse, page_payslips},
    },
    auth::auth::AuthUser,
    config::Config,
    error::{AppResult, ErrorBody},
    model::{
        attendance::{ATTENDANCE_COLUMNS, Attendance},
        employee::Employee,
    },
    utils::{
        db_utils::{Filters, fetch_page},
        pagination::PageQuery,
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRange {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    /// Pay month, `YYYY-MM`
    pub month: Option<String>,
}

/// Own employee profile
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller's employee record", body = Employee),
        (status = 403, description = "Employee accounts only", body = ErrorBody)
    ),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    Ok(HttpResponse::Ok().json(load_employee(pool.get_ref(), employee_id).await?))
}

/// Own attendance
#[utoipa::path(
    get,
    path = "/api/me/attendance",
    params(PageQuery, DateRange),
    responses((status = 200, description = "Paginated attendance", body = AttendanceListResponse)),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    range: web::Query<DateRange>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;

    let mut filters = Filters::new();
    filters
        .eq("employee_id", Some(employee_id))
        .at_least("date", range.from)
        .at_most("date", range.to);

    let (data, total): (Vec<Attendance>, i64) = fetch_page(
        pool.get_ref(),
        "attendance",
        ATTENDANCE_COLUMNS,
        &filters,
        "date DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(AttendanceListResponse::new(data, &page, total)))
}

/// Check in now
#[utoipa::path(
    post,
    path = "/api/me/attendance/check-in",
    responses(
        (status = 201, description = "Today's attendance opened", body = Attendance),
        (status = 409, description = "Already checked in today", body = ErrorBody)
    ),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let record = check_in_now(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Created().json(record))
}

/// Check out now
///
/// Closes the open check-in from today, or from yesterday for a shift that
/// crossed midnight, and computes worked and overtime minutes.
#[utoipa::path(
    post,
    path = "/api/me/attendance/check-out",
    responses(
        (status = 200, description = "Attendance closed", body = Attendance),
        (status = 400, description = "No open check-in", body = ErrorBody)
    ),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let record = check_out_now(pool.get_ref(), employee_id, config.standard_shift_minutes).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Own leave periods
#[utoipa::path(
    get,
    path = "/api/me/leave-periods",
    params(PageQuery, DateRange),
    responses((status = 200, description = "Paginated leave periods", body = LeaveListResponse)),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn my_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    range: web::Query<DateRange>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let filter = LeaveFilter {
        employee_id: Some(employee_id),
        from: range.from,
        to: range.to,
        ..Default::default()
    };
    Ok(HttpResponse::Ok().json(page_leave(pool.get_ref(), &filter, &page).await?))
}

/// Own payslips
#[utoipa::path(
    get,
    path = "/api/me/payslips",
    params(PageQuery, MonthQuery),
    responses(
        (status = 200, description = "Paginated payslips", body = PayslipListResponse),
        (status = 400, description = "Invalid month", body = ErrorBody)
    ),
    tag = "Self-service",
    security(("bearer_auth" = []))
)]
pub async fn my_payslips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    query: web::Query<MonthQuery>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.require_employee()?;
    let list = page_payslips(pool.get_ref(), Some(employee_id), query.month.as_deref(), &page).await?;
    Ok(HttpResponse::Ok().json(list))
}
