use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "change-me")]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EmployeeLoginReqDto {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "user")]
    pub principal: PrincipalKind,
}

/// Who a token was issued to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrincipalKind {
    /// Back-office account from `users`
    User,
    /// Self-service account from `employees`
    Employee,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username or employee code
    pub sub: String,
    pub principal: PrincipalKind,
    /// `users.id` or `employees.id` depending on `principal`
    pub subject_id: u64,
    /// Role id, users only
    pub role: Option<u8>,
    pub exp: usize,
    pub jti: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}
