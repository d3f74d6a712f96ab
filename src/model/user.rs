use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Back-office user as exposed over the API (never carries the hash).
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct User {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = 1)]
    pub role_id: u8,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row used by the login flow.
#[derive(sqlx::FromRow)]
pub struct UserCredentials {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub is_active: bool,
}
