use crate::{
    api::employee::ensure_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        inventory::{RestrictedItem, SerialMovement, SerialUnit, TransactionKind, UnitStatus},
        role::Role,
    },
    service::codes::{ITEM_WIDTH, RESTRICTED_ITEM_PREFIX, allocate_code},
    utils::{
        db_utils::{
            Filters, build_update_sql, delete_by_id, execute_update, fetch_filtered, fetch_page,
            find_by_id,
        },
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const ITEM_COLUMNS: &str = "id, item_code, name, category, description, created_at";
const ITEM_UPDATABLE: &[&str] = &["name", "category", "description"];
const UNIT_COLUMNS: &str = "id, item_id, serial_no, status, holder_id, note, created_at";
const UNIT_UPDATABLE: &[&str] = &["serial_no", "status", "note"];
const MOVEMENT_COLUMNS: &str = "id, unit_id, action, employee_id, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateRestrictedItem {
    #[schema(example = "Handheld radio")]
    pub name: String,
    #[schema(example = "Communication")]
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RestrictedFilter {
    pub category: Option<String>,
    /// Matches code and name
    pub search: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUnit {
    #[schema(example = "SN-88412")]
    pub serial_no: String,
    pub note: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnitFilter {
    /// in_store, issued, maintenance or lost
    pub status: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct IssueUnit {
    pub employee_id: u64,
}

/// Restricted item with the number of units in each status.
#[derive(Serialize, ToSchema)]
pub struct RestrictedItemView {
    #[serde(flatten)]
    pub item: RestrictedItem,
    #[schema(value_type = Object, example = json!({"in_store": 4, "issued": 2}))]
    pub unit_counts: BTreeMap<String, i64>,
    pub total_units: i64,
}

#[derive(Serialize, ToSchema)]
pub struct SerialUnitDetail {
    pub unit: SerialUnit,
    pub movements: Vec<SerialMovement>,
}

page_response!(RestrictedItemListResponse, RestrictedItemView);
page_response!(SerialUnitListResponse, SerialUnit);

/// Status a unit moves to when issued or returned.
pub fn next_status(current: UnitStatus, action: TransactionKind) -> AppResult<UnitStatus> {
    match (action, current) {
        (TransactionKind::Issue, UnitStatus::InStore) => Ok(UnitStatus::Issued),
        (TransactionKind::Return, UnitStatus::Issued) => Ok(UnitStatus::InStore),
        (TransactionKind::Issue, other) => Err(AppError::BadRequest(format!(
            "Only units in store can be issued, unit is {}",
            other.as_ref()
        ))),
        (TransactionKind::Return, other) => Err(AppError::BadRequest(format!(
            "Only issued units can be returned, unit is {}",
            other.as_ref()
        ))),
    }
}

/// Counts per status, with every known status present.
pub fn status_counts(rows: Vec<(String, i64)>) -> (BTreeMap<String, i64>, i64) {
    let mut counts: BTreeMap<String, i64> = [
        UnitStatus::InStore,
        UnitStatus::Issued,
        UnitStatus::Maintenance,
        UnitStatus::Lost,
    ]
    .iter()
    .map(|s| (s.as_ref().to_string(), 0))
    .collect();
    for (status, n) in rows {
        *counts.entry(status).or_insert(0) += n;
    }
    let total = counts.values().sum();
    (counts, total)
}

async fn view(pool: &MySqlPool, item: RestrictedItem) -> AppResult<RestrictedItemView> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM serial_units WHERE item_id = ? GROUP BY status")
            .bind(item.id)
            .fetch_all(pool)
            .await?;
    let (unit_counts, total_units) = status_counts(rows);
    Ok(RestrictedItemView {
        item,
        unit_counts,
        total_units,
    })
}

async fn load_item(pool: &MySqlPool, id: u64) -> AppResult<RestrictedItem> {
    find_by_id(pool, "restricted_inventory_items", ITEM_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Item"))
}

async fn load_unit(pool: &MySqlPool, id: u64) -> AppResult<SerialUnit> {
    find_by_id(pool, "serial_units", UNIT_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Serial unit"))
}

fn parse_status(raw: &str) -> AppResult<UnitStatus> {
    UnitStatus::from_str(raw).map_err(|_| AppError::BadRequest(format!("Unknown unit status {raw}")))
}

/// Create restricted item
///
/// The item code is generated as `FRI-01` style.
#[utoipa::path(
    post,
    path = "/api/inventory/restricted",
    request_body = CreateRestrictedItem,
    responses((status = 201, description = "Item created", body = RestrictedItemView)),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRestrictedItem>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }

    let code = allocate_code(
        pool.get_ref(),
        "restricted_inventory_items",
        "item_code",
        RESTRICTED_ITEM_PREFIX,
        ITEM_WIDTH,
    )
    .await?;

    let result = sqlx::query(
        "INSERT INTO restricted_inventory_items (item_code, name, category, description) VALUES (?, ?, ?, ?)",
    )
    .bind(&code)
    .bind(name)
    .bind(&payload.category)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await?;

    info!(item_code = %code, "Restricted item created");
    let item = load_item(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(view(pool.get_ref(), item).await?))
}

/// List restricted items
#[utoipa::path(
    get,
    path = "/api/inventory/restricted",
    params(PageQuery, RestrictedFilter),
    responses((status = 200, description = "Paginated items with unit counts", body = RestrictedItemListResponse)),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_items(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<RestrictedFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("category", filter.category.as_deref())
        .search(&["item_code", "name"], filter.search.as_deref());

    let (items, total): (Vec<RestrictedItem>, i64) = fetch_page(
        pool.get_ref(),
        "restricted_inventory_items",
        ITEM_COLUMNS,
        &filters,
        "item_code",
        &page,
    )
    .await?;

    let mut data = Vec::with_capacity(items.len());
    for item in items {
        data.push(view(pool.get_ref(), item).await?);
    }
    Ok(HttpResponse::Ok().json(RestrictedItemListResponse::new(data, &page, total)))
}

/// Get restricted item
#[utoipa::path(
    get,
    path = "/api/inventory/restricted/{id}",
    params(("id", Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item with unit counts", body = RestrictedItemView),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn get_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let item = load_item(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view(pool.get_ref(), item).await?))
}

/// Update restricted item
#[utoipa::path(
    put,
    path = "/api/inventory/restricted/{id}",
    params(("id", Path, description = "Item ID")),
    request_body(content = Object, example = json!({"category": "Safety"})),
    responses(
        (status = 200, description = "Updated item", body = RestrictedItemView),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn update_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let id = path.into_inner();

    let update = build_update_sql("restricted_inventory_items", ITEM_UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    let item = load_item(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(view(pool.get_ref(), item).await?))
}

/// Delete restricted item
#[utoipa::path(
    delete,
    path = "/api/inventory/restricted/{id}",
    params(("id", Path, description = "Item ID")),
    responses(
        (status = 204, description = "Deleted with its units"),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn delete_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    if delete_by_id(pool.get_ref(), "restricted_inventory_items", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Item"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Register a serial unit
#[utoipa::path(
    post,
    path = "/api/inventory/restricted/{id}/units",
    params(("id", Path, description = "Item ID")),
    request_body = CreateUnit,
    responses(
        (status = 201, description = "Unit registered in store", body = SerialUnit),
        (status = 404, description = "Item not found", body = ErrorBody),
        (status = 409, description = "Serial number already registered", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateUnit>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let item_id = path.into_inner();

    let serial_no = payload.serial_no.trim();
    if serial_no.is_empty() {
        return Err(AppError::bad_request("serial_no is required"));
    }
    load_item(pool.get_ref(), item_id).await?;

    let result = sqlx::query(
        "INSERT INTO serial_units (item_id, serial_no, status, note) VALUES (?, ?, ?, ?)",
    )
    .bind(item_id)
    .bind(serial_no)
    .bind(UnitStatus::InStore.as_ref())
    .bind(&payload.note)
    .execute(pool.get_ref())
    .await?;

    info!(item_id, serial_no, "Serial unit registered");
    Ok(HttpResponse::Created().json(load_unit(pool.get_ref(), result.last_insert_id()).await?))
}

/// List serial units of an item
#[utoipa::path(
    get,
    path = "/api/inventory/restricted/{id}/units",
    params(("id", Path, description = "Item ID"), PageQuery, UnitFilter),
    responses(
        (status = 200, description = "Paginated units", body = SerialUnitListResponse),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_units(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    page: web::Query<PageQuery>,
    filter: web::Query<UnitFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let item_id = path.into_inner();
    load_item(pool.get_ref(), item_id).await?;

    let mut filters = Filters::new();
    filters
        .eq("item_id", Some(item_id))
        .eq("status", filter.status.as_deref());

    let (data, total) = fetch_page(
        pool.get_ref(),
        "serial_units",
        UNIT_COLUMNS,
        &filters,
        "serial_no",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(SerialUnitListResponse::new(data, &page, total)))
}

/// Get serial unit with its movement history
#[utoipa::path(
    get,
    path = "/api/inventory/serial-units/{unit_id}",
    params(("unit_id", Path, description = "Serial unit ID")),
    responses(
        (status = 200, description = "Unit and movements", body = SerialUnitDetail),
        (status = 404, description = "Serial unit not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn get_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let unit = load_unit(pool.get_ref(), path.into_inner()).await?;

    let mut filters = Filters::new();
    filters.eq("unit_id", Some(unit.id));
    let movements = fetch_filtered(
        pool.get_ref(),
        "serial_unit_movements",
        MOVEMENT_COLUMNS,
        &filters,
        "created_at DESC, id DESC",
    )
    .await?;

    Ok(HttpResponse::Ok().json(SerialUnitDetail { unit, movements }))
}

/// Update serial unit
///
/// Status can be moved between in_store, maintenance and lost. Issuing and
/// returning go through their own endpoints.
#[utoipa::path(
    put,
    path = "/api/inventory/serial-units/{unit_id}",
    params(("unit_id", Path, description = "Serial unit ID")),
    request_body(content = Object, example = json!({"status": "maintenance", "note": "cracked antenna"})),
    responses(
        (status = 200, description = "Updated unit", body = SerialUnit),
        (status = 400, description = "Status change not allowed", body = ErrorBody),
        (status = 404, description = "Serial unit not found", body = ErrorBody),
        (status = 409, description = "Serial number already registered", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn update_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let id = path.into_inner();

    if let Some(status) = body.get("status") {
        let raw = status
            .as_str()
            .ok_or_else(|| AppError::bad_request("status must be a string"))?;
        if parse_status(raw)? == UnitStatus::Issued {
            return Err(AppError::bad_request("Use the issue endpoint to issue a unit"));
        }
        let unit = load_unit(pool.get_ref(), id).await?;
        if unit.status == UnitStatus::Issued.as_ref() {
            return Err(AppError::bad_request("Return the unit before changing its status"));
        }
    }

    let update = build_update_sql("serial_units", UNIT_UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load_unit(pool.get_ref(), id).await?))
}

/// Delete serial unit
#[utoipa::path(
    delete,
    path = "/api/inventory/serial-units/{unit_id}",
    params(("unit_id", Path, description = "Serial unit ID")),
    responses(
        (status = 204, description = "Deleted with its movements"),
        (status = 404, description = "Serial unit not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn delete_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    if delete_by_id(pool.get_ref(), "serial_units", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Serial unit"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Moves a unit and appends the movement in one transaction.
async fn move_unit(
    pool: &MySqlPool,
    unit_id: u64,
    action: TransactionKind,
    holder: Option<u64>,
) -> AppResult<SerialUnit> {
    let mut tx = pool.begin().await?;

    let current: Option<(String, Option<u64>)> =
        sqlx::query_as("SELECT status, holder_id FROM serial_units WHERE id = ? FOR UPDATE")
            .bind(unit_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (status, previous_holder) = current.ok_or_else(|| AppError::not_found("Serial unit"))?;

    let next = next_status(parse_status(&status)?, action)?;

    sqlx::query("UPDATE serial_units SET status = ?, holder_id = ? WHERE id = ?")
        .bind(next.as_ref())
        .bind(holder)
        .bind(unit_id)
        .execute(&mut *tx)
        .await?;

    let employee_id = holder.or(previous_holder);
    sqlx::query("INSERT INTO serial_unit_movements (unit_id, action, employee_id) VALUES (?, ?, ?)")
        .bind(unit_id)
        .bind(action.as_ref())
        .bind(employee_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(unit_id, action = action.as_ref(), employee_id = ?employee_id, "Serial unit moved");
    load_unit(pool, unit_id).await
}

/// Issue a serial unit to an employee
#[utoipa::path(
    post,
    path = "/api/inventory/serial-units/{unit_id}/issue",
    params(("unit_id", Path, description = "Serial unit ID")),
    request_body = IssueUnit,
    responses(
        (status = 200, description = "Unit issued", body = SerialUnit),
        (status = 400, description = "Unit is not in store", body = ErrorBody),
        (status = 404, description = "Unit or employee not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn issue_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<IssueUnit>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    ensure_employee(pool.get_ref(), payload.employee_id).await?;

    let unit = move_unit(
        pool.get_ref(),
        path.into_inner(),
        TransactionKind::Issue,
        Some(payload.employee_id),
    )
    .await?;
    Ok(HttpResponse::Ok().json(unit))
}

/// Return an issued serial unit to store
#[utoipa::path(
    post,
    path = "/api/inventory/serial-units/{unit_id}/return",
    params(("unit_id", Path, description = "Serial unit ID")),
    responses(
        (status = 200, description = "Unit back in store", body = SerialUnit),
        (status = 400, description = "Unit is not issued", body = ErrorBody),
        (status = 404, description = "Serial unit not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn return_unit(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let unit = move_unit(pool.get_ref(), path.into_inner(), TransactionKind::Return, None).await?;
    Ok(HttpResponse::Ok().json(unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_only_from_store() {
        assert_eq!(
            next_status(UnitStatus::InStore, TransactionKind::Issue).unwrap(),
            UnitStatus::Issued
        );
        assert!(next_status(UnitStatus::Issued, TransactionKind::Issue).is_err());
        assert!(next_status(UnitStatus::Maintenance, TransactionKind::Issue).is_err());
    }

    #[test]
    fn return_only_when_issued() {
        assert_eq!(
            next_status(UnitStatus::Issued, TransactionKind::Return).unwrap(),
            UnitStatus::InStore
        );
        assert!(next_status(UnitStatus::InStore, TransactionKind::Return).is_err());
        assert!(next_status(UnitStatus::Lost, TransactionKind::Return).is_err());
    }

    #[test]
    fn counts_include_empty_statuses() {
        let (counts, total) =
            status_counts(vec![("in_store".into(), 4), ("issued".into(), 2)]);
        assert_eq!(counts["in_store"], 4);
        assert_eq!(counts["lost"], 0);
        assert_eq!(counts.len(), 4);
        assert_eq!(total, 6);
    }
}
