use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VehicleStatus {
    Active,
    Maintenance,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExpenseKind {
    Fuel,
    Maintenance,
    Insurance,
    Other,
}

pub const VEHICLE_COLUMNS: &str =
    "id, registration_no, make, model, year, fuel_type, status, driver_id, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Vehicle {
    pub id: u64,
    #[schema(example = "DHA-GA-11-2233")]
    pub registration_no: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub fuel_type: Option<String>,
    #[schema(example = "active")]
    pub status: String,
    /// Employee currently assigned as driver
    pub driver_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct VehicleExpense {
    pub id: u64,
    pub vehicle_id: u64,
    #[schema(example = "fuel")]
    pub kind: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub odometer_km: Option<u32>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}
