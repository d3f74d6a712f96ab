use crate::{
    api::employee::ensure_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        leave_period::{LEAVE_COLUMNS, LeavePeriod, LeaveType},
        role::Role,
    },
    service::leave::overlap_days,
    utils::{
        db_utils::{Filters, SqlValue, delete_by_id, fetch_filtered, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLeavePeriod {
    pub employee_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-04-01", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-04-03", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateLeavePeriod {
    pub leave_type: Option<LeaveType>,
    #[schema(format = "date", value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    pub employee_id: Option<u64>,
    /// annual, sick, casual or unpaid
    pub leave_type: Option<String>,
    /// Periods ending on or after this day
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Periods starting on or before this day
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeaveSummary {
    pub employee_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    /// Days per leave type within the year
    #[schema(example = json!({"casual": 3, "sick": 2}))]
    pub days: BTreeMap<String, i64>,
    pub total_days: i64,
}

page_response!(LeaveListResponse, LeavePeriod);

fn check_range(from: NaiveDate, to: NaiveDate) -> AppResult<()> {
    if from > to {
        Err(AppError::bad_request("from_date must not be after to_date"))
    } else {
        Ok(())
    }
}

async fn load(pool: &MySqlPool, id: u64) -> AppResult<LeavePeriod> {
    find_by_id(pool, "leave_periods", LEAVE_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Leave period"))
}

/// Periods overlapping `[from, to]`, restricted to the filter.
pub fn leave_filters(filter: &LeaveFilter) -> Filters {
    let mut filters = Filters::new();
    filters
        .eq("employee_id", filter.employee_id)
        .eq("leave_type", filter.leave_type.clone())
        .at_least("to_date", filter.from)
        .at_most("from_date", filter.to);
    filters
}

pub async fn page_leave(
    pool: &MySqlPool,
    filter: &LeaveFilter,
    page: &PageQuery,
) -> AppResult<LeaveListResponse> {
    let filters = leave_filters(filter);
    let (data, total) = fetch_page(
        pool,
        "leave_periods",
        LEAVE_COLUMNS,
        &filters,
        "from_date DESC, id DESC",
        page,
    )
    .await?;
    Ok(LeaveListResponse::new(data, page, total))
}

/// Sums leave days per type, clipped to `[start, end]`.
pub fn summarize(periods: &[LeavePeriod], start: NaiveDate, end: NaiveDate) -> BTreeMap<String, i64> {
    let mut days = BTreeMap::new();
    for p in periods {
        let n = overlap_days(p.from_date, p.to_date, start, end);
        if n > 0 {
            *days.entry(p.leave_type.clone()).or_insert(0) += n;
        }
    }
    days
}

/// Create leave period
#[utoipa::path(
    post,
    path = "/api/leave-periods",
    request_body = CreateLeavePeriod,
    responses(
        (status = 201, description = "Leave period created", body = LeavePeriod),
        (status = 400, description = "from_date after to_date", body = ErrorBody),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeavePeriod>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    check_range(payload.from_date, payload.to_date)?;
    ensure_employee(pool.get_ref(), payload.employee_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO leave_periods (employee_id, leave_type, from_date, to_date, reason)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.leave_type.as_ref())
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(&payload.reason)
    .execute(pool.get_ref())
    .await?;

    let period = load(pool.get_ref(), result.last_insert_id()).await?;
    info!(
        leave_id = period.id,
        employee_id = period.employee_id,
        days = period.days(),
        "Leave period created"
    );
    Ok(HttpResponse::Created().json(period))
}

/// List leave periods
#[utoipa::path(
    get,
    path = "/api/leave-periods",
    params(PageQuery, LeaveFilter),
    responses((status = 200, description = "Paginated leave periods", body = LeaveListResponse)),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn list_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(page_leave(pool.get_ref(), &filter, &page).await?))
}

/// Get leave period
#[utoipa::path(
    get,
    path = "/api/leave-periods/{id}",
    params(("id", Path, description = "Leave period ID")),
    responses(
        (status = 200, description = "Leave period", body = LeavePeriod),
        (status = 404, description = "Leave period not found", body = ErrorBody)
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load(pool.get_ref(), path.into_inner()).await?))
}

/// Update leave period
#[utoipa::path(
    put,
    path = "/api/leave-periods/{id}",
    params(("id", Path, description = "Leave period ID")),
    request_body = UpdateLeavePeriod,
    responses(
        (status = 200, description = "Updated leave period", body = LeavePeriod),
        (status = 400, description = "from_date after to_date", body = ErrorBody),
        (status = 404, description = "Leave period not found", body = ErrorBody)
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeavePeriod>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let id = path.into_inner();
    let current = load(pool.get_ref(), id).await?;

    let from_date = payload.from_date.unwrap_or(current.from_date);
    let to_date = payload.to_date.unwrap_or(current.to_date);
    check_range(from_date, to_date)?;

    let leave_type = payload
        .leave_type
        .map(|t| t.as_ref().to_string())
        .unwrap_or(current.leave_type);

    sqlx::query(
        "UPDATE leave_periods SET leave_type = ?, from_date = ?, to_date = ?, reason = ? WHERE id = ?",
    )
    .bind(leave_type)
    .bind(from_date)
    .bind(to_date)
    .bind(payload.reason.as_ref().or(current.reason.as_ref()))
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(load(pool.get_ref(), id).await?))
}

/// Delete leave period
#[utoipa::path(
    delete,
    path = "/api/leave-periods/{id}",
    params(("id", Path, description = "Leave period ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Leave period not found", body = ErrorBody)
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    if delete_by_id(pool.get_ref(), "leave_periods", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Leave period"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Leave days per type in a year
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}/leave-summary",
    params(("employee_id", Path, description = "Employee ID"), SummaryQuery),
    responses(
        (status = 200, description = "Leave summary", body = LeaveSummary),
        (status = 404, description = "Employee not found", body = ErrorBody)
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn leave_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<SummaryQuery>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let employee_id = path.into_inner();
    ensure_employee(pool.get_ref(), employee_id).await?;

    let year = query.year.unwrap_or_else(|| Local::now().year());
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Err(AppError::BadRequest(format!("Invalid year {year}")));
    };

    let mut filters = Filters::new();
    filters
        .eq("employee_id", Some(employee_id))
        .push("to_date >= ? AND from_date <= ?", [SqlValue::Date(start), SqlValue::Date(end)]);

    let periods: Vec<LeavePeriod> = fetch_filtered(
        pool.get_ref(),
        "leave_periods",
        LEAVE_COLUMNS,
        &filters,
        "from_date",
    )
    .await?;

    let days = summarize(&periods, start, end);
    let total_days = days.values().sum();

    Ok(HttpResponse::Ok().json(LeaveSummary {
        employee_id,
        year,
        days,
        total_days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn period(kind: &str, from: NaiveDate, to: NaiveDate) -> LeavePeriod {
        LeavePeriod {
            id: 1,
            employee_id: 1,
            leave_type: kind.into(),
            from_date: from,
            to_date: to,
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_clips_to_the_year() {
        let periods = vec![
            period("casual", d(2025, 12, 30), d(2026, 1, 2)),
            period("sick", d(2026, 3, 1), d(2026, 3, 2)),
            period("casual", d(2026, 6, 10), d(2026, 6, 10)),
        ];
        let days = summarize(&periods, d(2026, 1, 1), d(2026, 12, 31));

        assert_eq!(days.get("casual"), Some(&3));
        assert_eq!(days.get("sick"), Some(&2));
        assert_eq!(days.len(), 2);
    }

    #[test]
    fn range_must_be_ordered() {
        assert!(check_range(d(2026, 1, 2), d(2026, 1, 1)).is_err());
        assert!(check_range(d(2026, 1, 1), d(2026, 1, 1)).is_ok());
    }

    #[test]
    fn filters_select_overlapping_periods() {
        let filter = LeaveFilter {
            employee_id: Some(3),
            from: Some(d(2026, 1, 1)),
            ..Default::default()
        };
        assert_eq!(
            leave_filters(&filter).where_clause(),
            "WHERE employee_id = ? AND to_date >= ?"
        );
    }
}
