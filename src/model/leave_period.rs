use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

pub const LEAVE_COLUMNS: &str =
    "id, employee_id, leave_type, from_date, to_date, reason, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeavePeriod {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "sick")]
    pub leave_type: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeavePeriod {
    /// Inclusive number of days in the period.
    pub fn days(&self) -> i64 {
        (self.to_date - self.from_date).num_days() + 1
    }
}
