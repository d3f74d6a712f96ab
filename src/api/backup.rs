use crate::{
    auth::auth::AuthUser,
    backup::BackupJob,
    error::{AppResult, ErrorBody},
    model::backup::BackupRun,
    utils::{
        db_utils::{Filters, fetch_page},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;

const COLUMNS: &str = "id, started_at, finished_at, status, object_key, row_count, error";

page_response!(BackupRunListResponse, BackupRun);

/// Run a backup now
///
/// Exports every table to object storage and waits for the result.
#[utoipa::path(
    post,
    path = "/api/backups/run",
    responses(
        (status = 201, description = "Backup run recorded; status is succeeded or failed", body = BackupRun),
        (status = 403, description = "Admin only", body = ErrorBody),
        (status = 409, description = "A backup is already running", body = ErrorBody)
    ),
    tag = "Backup",
    security(("bearer_auth" = []))
)]
pub async fn run_backup(auth: AuthUser, job: web::Data<BackupJob>) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let run = job.run().await?;
    Ok(HttpResponse::Created().json(run))
}

/// List backup runs
#[utoipa::path(
    get,
    path = "/api/backups",
    params(PageQuery),
    responses((status = 200, description = "Paginated backup runs, newest first", body = BackupRunListResponse)),
    tag = "Backup",
    security(("bearer_auth" = []))
)]
pub async fn list_backups(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let (data, total) = fetch_page(
        pool.get_ref(),
        "backup_runs",
        COLUMNS,
        &Filters::new(),
        "id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(BackupRunListResponse::new(data, &page, total)))
}
