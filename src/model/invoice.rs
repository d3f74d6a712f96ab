use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

pub const INVOICE_COLUMNS: &str =
    "id, invoice_no, client_id, issue_date, due_date, status, total, note, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Invoice {
    pub id: u64,
    #[schema(example = "INV-0001")]
    pub invoice_no: String,
    pub client_id: u64,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    #[schema(example = "draft")]
    pub status: String,
    pub total: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct InvoiceItem {
    pub id: u64,
    pub invoice_id: u64,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}
