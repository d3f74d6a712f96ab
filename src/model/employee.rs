use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    Terminated,
}

pub const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
    department_id, designation, join_date, status, basic_salary, overtime_rate, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department_id": 10,
        "designation": "Driver",
        "join_date": "2024-01-01",
        "status": "active",
        "basic_salary": "25000.00",
        "overtime_rate": "150.00",
        "created_at": "2024-01-01T00:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_id: Option<u64>,
    pub designation: Option<String>,
    pub join_date: NaiveDate,
    pub status: String,
    pub basic_salary: Decimal,
    /// Paid per overtime hour
    pub overtime_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Row used by the employee self-service login.
#[derive(sqlx::FromRow)]
pub struct EmployeeCredentials {
    pub id: u64,
    pub employee_code: String,
    pub status: String,
    pub password_hash: Option<String>,
}
