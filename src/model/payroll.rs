use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Salary advance or ad-hoc deduction; both tables share the shape.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayrollAdjustment {
    pub id: u64,
    pub employee_id: u64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const PAYSLIP_COLUMNS: &str = "id, employee_id, month, basic_salary, overtime_minutes, \
    overtime_pay, unpaid_leave_days, unpaid_leave_deduction, advances, deductions, gross_pay, \
    net_pay, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payslip {
    pub id: u64,
    pub employee_id: u64,
    /// First day of the pay month
    pub month: NaiveDate,
    pub basic_salary: Decimal,
    pub overtime_minutes: i32,
    pub overtime_pay: Decimal,
    pub unpaid_leave_days: i32,
    pub unpaid_leave_deduction: Decimal,
    pub advances: Decimal,
    pub deductions: Decimal,
    pub gross_pay: Decimal,
    pub net_pay: Decimal,
    pub created_at: DateTime<Utc>,
}
