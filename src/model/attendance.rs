use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
}

pub const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, status, leave_type, check_in, \
    check_out, worked_minutes, overtime_minutes, note, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    #[schema(example = "present")]
    pub status: String,
    pub leave_type: Option<String>,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:30:00")]
    pub check_out: Option<NaiveTime>,
    pub worked_minutes: i32,
    pub overtime_minutes: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
