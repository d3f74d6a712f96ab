use crate::{
    auth::{
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, AppResult, ErrorBody},
    model::{employee::EmployeeCredentials, user::UserCredentials},
    models::{EmployeeLoginReqDto, LoginReqDto, PrincipalKind, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Deletes the subject's refresh tokens that can no longer be used.
pub async fn prune_refresh_tokens(
    pool: &MySqlPool,
    principal: PrincipalKind,
    subject_id: u64,
) -> Result<u64, sqlx::Error> {
    let pruned = sqlx::query(
        r#"
        DELETE FROM refresh_tokens
        WHERE principal = ? AND subject_id = ? AND (revoked = TRUE OR expires_at <= NOW())
        "#,
    )
    .bind(principal.as_ref())
    .bind(subject_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(pruned)
}

/// Issues an access/refresh pair and persists the refresh token id.
async fn issue_pair(pool: &MySqlPool, config: &Config, subject: &Subject) -> AppResult<TokenPair> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| AppError::Internal(e.into()))?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::Internal(e.into()))?;

    match prune_refresh_tokens(pool, subject.principal, subject.subject_id).await {
        Ok(0) => {}
        Ok(pruned) => debug!(pruned, "Dead refresh tokens removed"),
        // issuing still succeeds
        Err(e) => warn!(error = %e, "Failed to prune refresh tokens"),
    }

    debug!(jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (principal, subject_id, jti, expires_at)
        VALUES (?, ?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.principal.as_ref())
    .bind(subject.subject_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        principal: subject.principal,
    })
}

async fn load_user(pool: &MySqlPool, username: &str) -> AppResult<Option<UserCredentials>> {
    Ok(sqlx::query_as::<_, UserCredentials>(
        "SELECT id, username, password, role_id, is_active FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

async fn load_employee(pool: &MySqlPool, code: &str) -> AppResult<Option<EmployeeCredentials>> {
    Ok(sqlx::query_as::<_, EmployeeCredentials>(
        "SELECT id, employee_code, status, password_hash FROM employees WHERE employee_code = ?",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?)
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".into())
}

/// Back-office login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Missing username or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::bad_request("Username or password required"));
    }

    let db_user = match load_user(pool.get_ref(), user.username.trim()).await? {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Login refused: user disabled");
            return Err(invalid_credentials());
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid_credentials());
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid_credentials());
    }

    let subject = Subject {
        principal: PrincipalKind::User,
        subject_id: db_user.id,
        name: db_user.username.clone(),
        role: Some(db_user.role_id),
    };
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Employee self-service login
#[utoipa::path(
    post,
    path = "/auth/employee/login",
    request_body = EmployeeLoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_employee_login",
    skip(pool, config, body),
    fields(employee_code = %body.employee_code)
)]
pub async fn employee_login(
    body: web::Json<EmployeeLoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Employee login request received");

    if body.employee_code.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::bad_request("Employee code or password required"));
    }

    let employee = load_employee(pool.get_ref(), body.employee_code.trim())
        .await?
        .filter(|e| e.status == "active")
        .ok_or_else(invalid_credentials)?;

    let Some(hash) = employee.password_hash.as_deref() else {
        info!("Login refused: no portal password set");
        return Err(invalid_credentials());
    };

    if let Err(e) = verify_password(&body.password, hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid_credentials());
    }

    let subject = Subject {
        principal: PrincipalKind::Employee,
        subject_id: employee.id,
        name: employee.employee_code,
        role: None,
    };
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    info!(employee_id = subject.subject_id, "Employee login successful");
    Ok(HttpResponse::Ok().json(pair))
}

/// Reloads the subject so disabled accounts and role changes take effect on refresh.
async fn current_subject(pool: &MySqlPool, subject: Subject) -> AppResult<Subject> {
    match subject.principal {
        PrincipalKind::User => {
            let row: Option<(u8, bool)> =
                sqlx::query_as("SELECT role_id, is_active FROM users WHERE id = ?")
                    .bind(subject.subject_id)
                    .fetch_optional(pool)
                    .await?;
            match row {
                Some((role_id, true)) => Ok(Subject {
                    role: Some(role_id),
                    ..subject
                }),
                _ => Err(AppError::Unauthorized("Account disabled".into())),
            }
        }
        PrincipalKind::Employee => {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM employees WHERE id = ?")
                    .bind(subject.subject_id)
                    .fetch_optional(pool)
                    .await?;
            match status.as_deref() {
                Some("active") => Ok(subject),
                _ => Err(AppError::Unauthorized("Account disabled".into())),
            }
        }
    }
}

/// Rotate a refresh token
///
/// Send the refresh token as the bearer token. The presented token is revoked
/// and a new pair is returned.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = ErrorBody)
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let token = bearer(&req).ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    // single statement so two concurrent refreshes cannot both win
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE jti = ? AND principal = ? AND subject_id = ? AND revoked = FALSE
          AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.principal.as_ref())
    .bind(claims.subject_id)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if revoked != 1 {
        info!(jti = %claims.jti, "Refresh token unknown or already used");
        return Err(AppError::Unauthorized("Refresh token revoked".into()));
    }

    let subject = current_subject(pool.get_ref(), Subject::from(&claims)).await?;
    let pair = issue_pair(pool.get_ref(), &config, &subject).await?;

    debug!(subject_id = subject.subject_id, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(pair))
}

/// Revoke a refresh token
///
/// Always answers 204, whether or not the token was known.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let Some(token) = bearer(&req) else {
        return Ok(HttpResponse::NoContent().finish());
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return Ok(HttpResponse::NoContent().finish()),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}
