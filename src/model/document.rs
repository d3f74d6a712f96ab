use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OwnerType {
    Employee,
    Vehicle,
    Client,
    Invoice,
}

impl OwnerType {
    /// Table holding the owning record.
    pub fn table(self) -> &'static str {
        match self {
            OwnerType::Employee => "employees",
            OwnerType::Vehicle => "vehicles",
            OwnerType::Client => "clients",
            OwnerType::Invoice => "invoices",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Document {
    pub id: u64,
    #[schema(example = "employee")]
    pub owner_type: String,
    pub owner_id: u64,
    #[schema(example = "nid-front.jpg")]
    pub file_name: String,
    #[schema(example = "image/jpeg")]
    pub content_type: String,
    pub size_bytes: u64,
    /// Object key, or `local:<path>` for files kept on the server disk
    pub location: String,
    pub created_at: DateTime<Utc>,
}
