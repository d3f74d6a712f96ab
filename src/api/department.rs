use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{department::Department, role::Role},
    utils::{
        db_utils::{Filters, build_update_sql, delete_by_id, execute_update, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const COLUMNS: &str = "id, name, description, created_at";
const UPDATABLE: &[&str] = &["name", "description"];

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Operations")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DepartmentFilter {
    /// Substring of the department name
    pub search: Option<String>,
}

page_response!(DepartmentListResponse, Department);

async fn load(pool: &MySqlPool, id: u64) -> AppResult<Department> {
    find_by_id(pool, "departments", COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Department"))
}

/// Create department
#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Name already used", body = ErrorBody)
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let result = sqlx::query("INSERT INTO departments (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(&payload.description)
        .execute(pool.get_ref())
        .await?;

    let department = load(pool.get_ref(), result.last_insert_id()).await?;
    info!(department_id = department.id, "Department created");
    Ok(HttpResponse::Created().json(department))
}

/// List departments
#[utoipa::path(
    get,
    path = "/api/departments",
    params(PageQuery, DepartmentFilter),
    responses((status = 200, description = "Paginated departments", body = DepartmentListResponse)),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn list_departments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<DepartmentFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters.search(&["name"], filter.search.as_deref());

    let (data, total) =
        fetch_page(pool.get_ref(), "departments", COLUMNS, &filters, "name", &page).await?;
    Ok(HttpResponse::Ok().json(DepartmentListResponse::new(data, &page, total)))
}

/// Get department
#[utoipa::path(
    get,
    path = "/api/departments/{id}",
    params(("id", Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department", body = Department),
        (status = 404, description = "Department not found", body = ErrorBody)
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn get_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load(pool.get_ref(), path.into_inner()).await?))
}

/// Update department
#[utoipa::path(
    put,
    path = "/api/departments/{id}",
    params(("id", Path, description = "Department ID")),
    request_body(content = Object, example = json!({"description": "Fleet and dispatch"})),
    responses(
        (status = 200, description = "Updated department", body = Department),
        (status = 404, description = "Department not found", body = ErrorBody)
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;
    let id = path.into_inner();

    let update = build_update_sql("departments", UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load(pool.get_ref(), id).await?))
}

/// Delete department
///
/// Employees of the department keep their record with no department.
#[utoipa::path(
    delete,
    path = "/api/departments/{id}",
    params(("id", Path, description = "Department ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Department not found", body = ErrorBody)
    ),
    tag = "Department",
    security(("bearer_auth" = []))
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Hr])?;

    if delete_by_id(pool.get_ref(), "departments", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Department"));
    }
    Ok(HttpResponse::NoContent().finish())
}
