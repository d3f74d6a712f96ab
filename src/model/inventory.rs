use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionKind {
    Issue,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitStatus {
    InStore,
    Issued,
    Maintenance,
    Lost,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GeneralItem {
    pub id: u64,
    #[schema(example = "FGI-01")]
    pub item_code: String,
    #[schema(example = "Raincoat")]
    pub name: String,
    #[schema(example = "pcs")]
    pub unit: String,
    pub quantity_on_hand: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GeneralTransaction {
    pub id: u64,
    pub item_id: u64,
    #[schema(example = "issue")]
    pub kind: String,
    pub quantity: i64,
    pub employee_id: Option<u64>,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RestrictedItem {
    pub id: u64,
    #[schema(example = "FRI-01")]
    pub item_code: String,
    #[schema(example = "Handheld radio")]
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SerialUnit {
    pub id: u64,
    pub item_id: u64,
    #[schema(example = "SN-88412")]
    pub serial_no: String,
    #[schema(example = "in_store")]
    pub status: String,
    /// Employee holding the unit while issued
    pub holder_id: Option<u64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SerialMovement {
    pub id: u64,
    pub unit_id: u64,
    #[schema(example = "issue")]
    pub action: String,
    pub employee_id: Option<u64>,
    pub created_at: DateTime<Utc>,
}
