use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        client::{CLIENT_COLUMNS, Client, ClientStatus},
        role::Role,
    },
    service::codes::{CLIENT_PREFIX, CLIENT_WIDTH, allocate_code},
    utils::{
        db_utils::{Filters, build_update_sql, delete_by_id, enum_field, execute_update, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["name", "contact_person", "email", "phone", "address", "status"];

#[derive(Deserialize, ToSchema)]
pub struct CreateClient {
    #[schema(example = "Acme Logistics")]
    pub name: String,
    pub contact_person: Option<String>,
    #[schema(format = "email")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: Option<ClientStatus>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClientFilter {
    /// active or inactive
    pub status: Option<String>,
    /// Matches code, name and contact person
    pub search: Option<String>,
}

page_response!(ClientListResponse, Client);

pub async fn load_client(pool: &MySqlPool, id: u64) -> AppResult<Client> {
    find_by_id(pool, "clients", CLIENT_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Client"))
}

/// Create client
///
/// The client code is generated as `FCID-003` style.
#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = CreateClient,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 409, description = "Generated code collided, retry", body = ErrorBody)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn create_client(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClient>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let code = allocate_code(pool.get_ref(), "clients", "client_code", CLIENT_PREFIX, CLIENT_WIDTH).await?;
    let status = payload.status.unwrap_or(ClientStatus::Active);

    let result = sqlx::query(
        r#"
        INSERT INTO clients (client_code, name, contact_person, email, phone, address, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(name)
    .bind(&payload.contact_person)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.address)
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await?;

    info!(client_code = %code, "Client created");
    let client = load_client(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(client))
}

/// List clients
#[utoipa::path(
    get,
    path = "/api/clients",
    params(PageQuery, ClientFilter),
    responses((status = 200, description = "Paginated clients", body = ClientListResponse)),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn list_clients(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<ClientFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("status", filter.status.as_deref())
        .search(&["client_code", "name", "contact_person"], filter.search.as_deref());

    let (data, total) =
        fetch_page(pool.get_ref(), "clients", CLIENT_COLUMNS, &filters, "client_code", &page).await?;
    Ok(HttpResponse::Ok().json(ClientListResponse::new(data, &page, total)))
}

/// Get client
#[utoipa::path(
    get,
    path = "/api/clients/{id}",
    params(("id", Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client", body = Client),
        (status = 404, description = "Client not found", body = ErrorBody)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn get_client(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load_client(pool.get_ref(), path.into_inner()).await?))
}

/// Update client
///
/// The client code is immutable.
#[utoipa::path(
    put,
    path = "/api/clients/{id}",
    params(("id", Path, description = "Client ID")),
    request_body(content = Object, example = json!({"phone": "+8801811000000", "status": "inactive"})),
    responses(
        (status = 200, description = "Updated client", body = Client),
        (status = 400, description = "Unknown field or status", body = ErrorBody),
        (status = 404, description = "Client not found", body = ErrorBody)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn update_client(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let id = path.into_inner();

    enum_field::<ClientStatus>(&body, "status", "client status")?;

    let update = build_update_sql("clients", UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load_client(pool.get_ref(), id).await?))
}

/// Delete client
///
/// Clients that still have invoices cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/clients/{id}",
    params(("id", Path, description = "Client ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Client not found", body = ErrorBody),
        (status = 409, description = "Client has invoices", body = ErrorBody)
    ),
    tag = "Client",
    security(("bearer_auth" = []))
)]
pub async fn delete_client(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    if delete_by_id(pool.get_ref(), "clients", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Client"));
    }
    Ok(HttpResponse::NoContent().finish())
}
