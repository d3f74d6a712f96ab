use crate::error::{AppResult, ErrorBody};
use actix_web::{HttpResponse, web};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct Health {
    #[schema(example = "ok")]
    pub status: &'static str,
}

/// Liveness probe
///
/// Answers once the database accepts a query.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable", body = Health),
        (status = 500, description = "Database unreachable", body = ErrorBody)
    ),
    tag = "Health"
)]
pub async fn health(pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    sqlx::query("SELECT 1").execute(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(Health { status: "ok" }))
}
