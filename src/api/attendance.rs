use crate::{
    api::employee::ensure_employee,
    auth::auth::AuthUser,
    config::Config,
    error::{AppError, AppResult, ErrorBody},
    model::{
        attendance::{ATTENDANCE_COLUMNS, Attendance, AttendanceStatus},
        leave_period::LeaveType,
        role::Role,
    },
    service::{leave::apply_leave_day, worktime::day_minutes},
    utils::{
        db_utils::{Filters, delete_by_id, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Days, Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendance {
    pub employee_id: u64,
    #[schema(example = "2026-03-10", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Used when `status` is `leave`; defaults to `casual`
    pub leave_type: Option<LeaveType>,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:30:00")]
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
}

/// Fields left out keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAttendance {
    pub status: Option<AttendanceStatus>,
    pub leave_type: Option<LeaveType>,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:30:00")]
    pub check_out: Option<NaiveTime>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilter {
    pub employee_id: Option<u64>,
    /// First day, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Last day, inclusive
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

page_response!(AttendanceListResponse, Attendance);

/// Stored shape of one attendance day after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub status: AttendanceStatus,
    pub leave_type: Option<LeaveType>,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub worked_minutes: i32,
    pub overtime_minutes: i32,
}

impl DayRecord {
    /// Leave and absence days carry no clock times; leave days always carry a type.
    pub fn build(
        status: AttendanceStatus,
        leave_type: Option<LeaveType>,
        check_in: Option<NaiveTime>,
        check_out: Option<NaiveTime>,
        standard_minutes: i64,
    ) -> Self {
        let (leave_type, check_in, check_out) = match status {
            AttendanceStatus::Leave => (
                Some(leave_type.unwrap_or(LeaveType::Casual)),
                None,
                None,
            ),
            AttendanceStatus::Absent => (None, None, None),
            AttendanceStatus::Present | AttendanceStatus::HalfDay => (None, check_in, check_out),
        };
        let (worked_minutes, overtime_minutes) = day_minutes(check_in, check_out, standard_minutes);

        Self {
            status,
            leave_type,
            check_in,
            check_out,
            worked_minutes,
            overtime_minutes,
        }
    }
}

async fn load(pool: &MySqlPool, id: u64) -> AppResult<Attendance> {
    find_by_id(pool, "attendance", ATTENDANCE_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance"))
}

async fn run_leave_rule(
    conn: &mut MySqlConnection,
    employee_id: u64,
    date: NaiveDate,
    record: &DayRecord,
) -> Result<(), sqlx::Error> {
    if let (AttendanceStatus::Leave, Some(leave_type)) = (record.status, record.leave_type) {
        apply_leave_day(conn, employee_id, leave_type, date).await?;
    }
    Ok(())
}

/// Mark attendance for a day
///
/// Marking a day as `leave` also extends or creates the matching leave period.
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 404, description = "Employee not found", body = ErrorBody),
        (status = 409, description = "Day already marked for this employee", body = ErrorBody)
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<MarkAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    ensure_employee(pool.get_ref(), payload.employee_id).await?;

    let record = DayRecord::build(
        payload.status,
        payload.leave_type,
        payload.check_in,
        payload.check_out,
        config.standard_shift_minutes,
    );

    let mut tx = pool.begin().await?;
    let result = sqlx::query(
        r#"
        INSERT INTO attendance
        (employee_id, date, status, leave_type, check_in, check_out,
         worked_minutes, overtime_minutes, note)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.date)
    .bind(record.status.as_ref())
    .bind(record.leave_type.map(|t| t.as_ref().to_string()))
    .bind(record.check_in)
    .bind(record.check_out)
    .bind(record.worked_minutes)
    .bind(record.overtime_minutes)
    .bind(&payload.note)
    .execute(&mut *tx)
    .await?;

    run_leave_rule(&mut tx, payload.employee_id, payload.date, &record).await?;
    tx.commit().await?;

    info!(
        employee_id = payload.employee_id,
        date = %payload.date,
        status = record.status.as_ref(),
        "Attendance marked"
    );
    let attendance = load(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(attendance))
}

/// List attendance
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(PageQuery, AttendanceFilter),
    responses((status = 200, description = "Paginated attendance", body = AttendanceListResponse)),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<AttendanceFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("employee_id", filter.employee_id)
        .at_least("date", filter.from)
        .at_most("date", filter.to);

    let (data, total) = fetch_page(
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

/// Get attendance record
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(("id", Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance record", body = Attendance),
        (status = 404, description = "Attendance not found", body = ErrorBody)
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn get_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load(pool.get_ref(), path.into_inner()).await?))
}

/// Update attendance record
///
/// Worked and overtime minutes are recomputed. Switching a day to `leave`
/// runs the leave period rule.
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(("id", Path, description = "Attendance ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Updated attendance", body = Attendance),
        (status = 404, description = "Attendance not found", body = ErrorBody)
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let id = path.into_inner();
    let current = load(pool.get_ref(), id).await?;

    let current_status = current
        .status
        .parse::<AttendanceStatus>()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Stored status {} is invalid", current.status)))?;
    let current_leave = current
        .leave_type
        .as_deref()
        .and_then(|t| t.parse::<LeaveType>().ok());

    let record = DayRecord::build(
        payload.status.unwrap_or(current_status),
        payload.leave_type.or(current_leave),
        payload.check_in.or(current.check_in),
        payload.check_out.or(current.check_out),
        config.standard_shift_minutes,
    );

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        UPDATE attendance
        SET status = ?, leave_type = ?, check_in = ?, check_out = ?,
            worked_minutes = ?, overtime_minutes = ?, note = ?
        WHERE id = ?
        "#,
    )
    .bind(record.status.as_ref())
    .bind(record.leave_type.map(|t| t.as_ref().to_string()))
    .bind(record.check_in)
    .bind(record.check_out)
    .bind(record.worked_minutes)
    .bind(record.overtime_minutes)
    .bind(payload.note.as_ref().or(current.note.as_ref()))
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let leave_changed =
        current_status != AttendanceStatus::Leave || current_leave != record.leave_type;
    if leave_changed {
        run_leave_rule(&mut tx, current.employee_id, current.date, &record).await?;
    }
    tx.commit().await?;

    debug!(attendance_id = id, "Attendance updated");
    Ok(HttpResponse::Ok().json(load(pool.get_ref(), id).await?))
}

/// Delete attendance record
///
/// Leave periods created from the day are left untouched.
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id", Path, description = "Attendance ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Attendance not found", body = ErrorBody)
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    if delete_by_id(pool.get_ref(), "attendance", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Attendance"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Opens today's attendance for an employee at the current wall-clock time.
pub async fn check_in_now(pool: &MySqlPool, employee_id: u64) -> AppResult<Attendance> {
    let now = Local::now().naive_local();

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, status, check_in)
        VALUES (?, ?, 'present', ?)
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(now.time())
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Already checked in today".into()),
        other => other,
    })?;

    info!(employee_id, "Checked in");
    load(pool, result.last_insert_id()).await
}

/// Closes the open check-in from today or, for night shifts, yesterday.
pub async fn check_out_now(
    pool: &MySqlPool,
    employee_id: u64,
    standard_minutes: i64,
) -> AppResult<Attendance> {
    let now = Local::now().naive_local();
    let today = now.date();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);

    let open: Option<(u64, Option<NaiveTime>)> = sqlx::query_as(
        r#"
        SELECT id, check_in FROM attendance
        WHERE employee_id = ? AND date IN (?, ?)
          AND check_in IS NOT NULL AND check_out IS NULL
        ORDER BY date DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(yesterday)
    .fetch_optional(pool)
    .await?;

    let Some((id, check_in)) = open else {
        return Err(AppError::bad_request("No open check-in found"));
    };

    let (worked, overtime) = day_minutes(check_in, Some(now.time()), standard_minutes);
    sqlx::query(
        "UPDATE attendance SET check_out = ?, worked_minutes = ?, overtime_minutes = ? WHERE id = ?",
    )
    .bind(now.time())
    .bind(worked)
    .bind(overtime)
    .bind(id)
    .execute(pool)
    .await?;

    info!(employee_id, worked, overtime, "Checked out");
    load(pool, id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn present_day_computes_minutes() {
        let r = DayRecord::build(
            AttendanceStatus::Present,
            Some(LeaveType::Sick),
            Some(t(9, 0)),
            Some(t(18, 30)),
            480,
        );
        assert_eq!(r.leave_type, None);
        assert_eq!((r.worked_minutes, r.overtime_minutes), (570, 90));
    }

    #[test]
    fn leave_day_defaults_to_casual_and_drops_times() {
        let r = DayRecord::build(AttendanceStatus::Leave, None, Some(t(9, 0)), None, 480);
        assert_eq!(r.leave_type, Some(LeaveType::Casual));
        assert_eq!(r.check_in, None);
        assert_eq!((r.worked_minutes, r.overtime_minutes), (0, 0));
    }

    #[test]
    fn night_shift_rolls_over() {
        let r = DayRecord::build(
            AttendanceStatus::Present,
            None,
            Some(t(22, 0)),
            Some(t(7, 0)),
            480,
        );
        assert_eq!((r.worked_minutes, r.overtime_minutes), (540, 60));
    }

    #[test]
    fn absent_day_has_nothing() {
        let r = DayRecord::build(AttendanceStatus::Absent, None, Some(t(9, 0)), Some(t(10, 0)), 480);
        assert_eq!(r.check_in, None);
        assert_eq!(r.worked_minutes, 0);
    }
}
