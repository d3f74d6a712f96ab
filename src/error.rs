//! Unified API error handling.
//!
//! Every handler returns `AppResult<T>`; the `ResponseError` impl below is the
//! single place where failures are logged and turned into the JSON envelope
//! `{"code": "...", "message": "..."}`.

use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::StatusCode,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// MySQL server error numbers we translate into client errors.
const ER_DUP_ENTRY: u16 = 1062;
const ER_ROW_IS_REFERENCED: u16 = 1451;
const ER_NO_REFERENCED_ROW: u16 = 1452;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "NOT_FOUND")]
    pub code: String,
    #[schema(example = "Employee not found")]
    pub message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            // never leak driver or storage details
            Self::Storage(_) => "Object storage is unavailable".to_string(),
            Self::Internal(_) | Self::Database(_) => {
                "Something went wrong, Contact with system admin".to_string()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        map_db_error(err)
    }
}

fn mysql_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}

/// Translates constraint violations reported by MySQL into client errors.
pub fn map_db_error(err: sqlx::Error) -> AppError {
    match mysql_number(&err) {
        Some(ER_DUP_ENTRY) => AppError::Conflict("Record already exists".to_string()),
        Some(ER_ROW_IS_REFERENCED) => {
            AppError::Conflict("Record is referenced by other records".to_string())
        }
        Some(ER_NO_REFERENCED_ROW) => {
            AppError::BadRequest("Referenced record does not exist".to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Short failure text for batch reports. Names the MySQL error number when
/// there is one, never the driver message.
pub fn failure_reason(err: sqlx::Error) -> String {
    let number = mysql_number(&err);
    describe_failure(map_db_error(err), number)
}

fn describe_failure(err: AppError, number: Option<u16>) -> String {
    match (err, number) {
        (AppError::Database(_), Some(n)) => format!("Database error (MySQL {n})"),
        (other, _) => other.to_string(),
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Internal(e) => tracing::error!(error = ?e, "Internal server error"),
            Self::Database(e) => tracing::error!(error = %e, "Database error"),
            Self::Storage(e) => tracing::error!(error = %e, "Object storage error"),
            _ => tracing::warn!(error = %self, "API error"),
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            code: self.code().to_string(),
            message: self.public_message(),
        })
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid JSON body: {err}")).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {err}")).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid path parameter: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::not_found("Vehicle").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::bad_request("nope").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn non_constraint_database_errors_stay_internal() {
        let err = map_db_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn failure_reason_is_short_and_numbered() {
        assert_eq!(
            describe_failure(AppError::Database(sqlx::Error::RowNotFound), Some(1406)),
            "Database error (MySQL 1406)"
        );
        assert_eq!(
            describe_failure(AppError::Conflict("Record already exists".into()), Some(1062)),
            "Conflict: Record already exists"
        );
        assert_eq!(failure_reason(sqlx::Error::PoolTimedOut), "Database error");
    }

    #[actix_web::test]
    async fn envelope_hides_internal_details() {
        let err = AppError::Internal(anyhow::anyhow!("secret connection string"));
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json["message"].as_str().unwrap().contains("secret"));
    }

    #[actix_web::test]
    async fn envelope_carries_client_message() {
        let err = AppError::not_found("Employee");
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Employee not found");
    }
}
