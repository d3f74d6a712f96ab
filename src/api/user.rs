use crate::{
    api::employee::{MIN_PASSWORD_LEN, SetPassword},
    auth::{auth::AuthUser, password::hash_password},
    error::{AppError, AppResult, ErrorBody},
    model::{role::Role, user::User},
    utils::{
        db_utils::{Filters, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
        username_cache,
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &str = "id, username, role_id, is_active, last_login_at, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateUser {
    #[schema(example = "accounts1")]
    pub username: String,
    #[schema(example = "s3cure-pass")]
    pub password: String,
    /// 1 admin, 2 hr, 3 finance, 4 store, 5 viewer
    #[schema(example = 3)]
    pub role_id: u8,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub role_id: Option<u8>,
    pub search: Option<String>,
}

page_response!(UserListResponse, User);

fn check_password(password: &str) -> AppResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    hash_password(password).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

/// Create back-office user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid username, password or role", body = ErrorBody),
        (status = 409, description = "Username already taken", body = ErrorBody)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let username = payload.username.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("username is required"));
    }
    if Role::from_id(payload.role_id).is_none() {
        return Err(AppError::BadRequest(format!("Unknown role id {}", payload.role_id)));
    }
    if !username_cache::is_available(pool.get_ref(), username).await? {
        return Err(AppError::Conflict("Username already taken".into()));
    }
    let hash = check_password(&payload.password)?;

    let result = sqlx::query("INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hash)
        .bind(payload.role_id)
        .execute(pool.get_ref())
        .await?;
    username_cache::mark_taken(username).await;

    info!(username, role_id = payload.role_id, "User created");
    let user: User = find_by_id(pool.get_ref(), "users", COLUMNS, result.last_insert_id())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Created().json(user))
}

/// List back-office users
#[utoipa::path(
    get,
    path = "/api/users",
    params(PageQuery, UserFilter),
    responses((status = 200, description = "Paginated users", body = UserListResponse)),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<UserFilter>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let mut filters = Filters::new();
    filters
        .eq("role_id", filter.role_id.map(u64::from))
        .search(&["username"], filter.search.as_deref());

    let (data, total) = fetch_page(pool.get_ref(), "users", COLUMNS, &filters, "username", &page).await?;
    Ok(HttpResponse::Ok().json(UserListResponse::new(data, &page, total)))
}

/// Reset a user's password
///
/// Revokes the user's refresh tokens.
#[utoipa::path(
    put,
    path = "/api/users/{id}/password",
    params(("id", Path, description = "User ID")),
    request_body = SetPassword,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Password too short", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn set_user_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<SetPassword>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    let hash = check_password(&body.password)?;

    let affected = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hash)
        .bind(id)
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("User"));
    }

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE principal = 'user' AND subject_id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Delete user
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id", Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Cannot delete own account", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "User",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    if id == auth.subject_id {
        return Err(AppError::bad_request("Cannot delete your own account"));
    }

    let user: User = find_by_id(pool.get_ref(), "users", COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM refresh_tokens WHERE principal = 'user' AND subject_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    username_cache::forget(&user.username).await;
    info!(user_id = id, username = %user.username, "User deleted");
    Ok(HttpResponse::NoContent().finish())
}
