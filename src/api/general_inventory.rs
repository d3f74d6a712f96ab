use crate::{
    api::employee::ensure_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        inventory::{GeneralItem, GeneralTransaction, TransactionKind},
        role::Role,
    },
    service::{
        codes::{GENERAL_ITEM_PREFIX, ITEM_WIDTH, allocate_code},
        stock::StockLevel,
    },
    utils::{
        db_utils::{Filters, build_update_sql, delete_by_id, execute_update, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const ITEM_COLUMNS: &str = "id, item_code, name, unit, quantity_on_hand, description, created_at";
const ITEM_UPDATABLE: &[&str] = &["name", "unit", "quantity_on_hand", "description"];
const TX_COLUMNS: &str = "id, item_id, kind, quantity, employee_id, date, note, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateGeneralItem {
    #[schema(example = "Raincoat")]
    pub name: String,
    #[schema(example = "pcs")]
    pub unit: Option<String>,
    #[schema(example = 40)]
    pub quantity_on_hand: i64,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemFilter {
    /// Matches code and name
    pub search: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTransaction {
    pub kind: TransactionKind,
    #[schema(example = 2)]
    pub quantity: i64,
    pub employee_id: Option<u64>,
    #[schema(example = "2026-03-04", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub note: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    /// issue or return
    pub kind: Option<String>,
    pub employee_id: Option<u64>,
}

/// Item with quantities derived from its transaction history.
#[derive(Serialize, ToSchema)]
pub struct GeneralItemView {
    #[serde(flatten)]
    pub item: GeneralItem,
    /// On hand minus issued plus returned
    pub available: i64,
    /// Issued and not yet returned
    pub outstanding: i64,
}

page_response!(GeneralItemListResponse, GeneralItemView);
page_response!(TransactionListResponse, GeneralTransaction);

async fn stock_level(pool: &MySqlPool, item_id: u64) -> Result<StockLevel, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT kind, quantity FROM general_inventory_transactions WHERE item_id = ?")
            .bind(item_id)
            .fetch_all(pool)
            .await?;
    Ok(StockLevel::from_rows(&rows))
}

async fn view(pool: &MySqlPool, item: GeneralItem) -> AppResult<GeneralItemView> {
    let level = stock_level(pool, item.id).await?;
    Ok(GeneralItemView {
        available: level.available(item.quantity_on_hand),
        outstanding: level.outstanding(),
        item,
    })
}

async fn load_item(pool: &MySqlPool, id: u64) -> AppResult<GeneralItem> {
    find_by_id(pool, "general_inventory_items", ITEM_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Item"))
}

/// Create general inventory item
///
/// The item code is generated as `FGI-01` style.
#[utoipa::path(
    post,
    path = "/api/inventory/general",
    request_body = CreateGeneralItem,
    responses(
        (status = 201, description = "Item created", body = GeneralItemView),
        (status = 400, description = "Negative quantity", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateGeneralItem>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name is required"));
    }
    if payload.quantity_on_hand < 0 {
        return Err(AppError::bad_request("quantity_on_hand must not be negative"));
    }

    let code = allocate_code(
        pool.get_ref(),
        "general_inventory_items",
        "item_code",
        GENERAL_ITEM_PREFIX,
        ITEM_WIDTH,
    )
    .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO general_inventory_items (item_code, name, unit, quantity_on_hand, description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(name)
    .bind(payload.unit.as_deref().unwrap_or("pcs"))
    .bind(payload.quantity_on_hand)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await?;

    info!(item_code = %code, "General item created");
    let item = load_item(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(view(pool.get_ref(), item).await?))
}

/// List general inventory items
#[utoipa::path(
    get,
    path = "/api/inventory/general",
    params(PageQuery, ItemFilter),
    responses((status = 200, description = "Paginated items with availability", body = GeneralItemListResponse)),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_items(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<ItemFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters.search(&["item_code", "name"], filter.search.as_deref());

    let (items, total): (Vec<GeneralItem>, i64) = fetch_page(
        pool.get_ref(),
        "general_inventory_items",
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
    Ok(HttpResponse::Ok().json(GeneralItemListResponse::new(data, &page, total)))
}

/// Get general inventory item
#[utoipa::path(
    get,
    path = "/api/inventory/general/{id}",
    params(("id", Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item with availability", body = GeneralItemView),
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

/// Update general inventory item
#[utoipa::path(
    put,
    path = "/api/inventory/general/{id}",
    params(("id", Path, description = "Item ID")),
    request_body(content = Object, example = json!({"quantity_on_hand": 60})),
    responses(
        (status = 200, description = "Updated item", body = GeneralItemView),
        (status = 400, description = "Unknown field or negative quantity", body = ErrorBody),
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

    if body
        .get("quantity_on_hand")
        .is_some_and(|q| q.as_i64().is_none_or(|q| q < 0))
    {
        return Err(AppError::bad_request("quantity_on_hand must be a non-negative integer"));
    }

    let update = build_update_sql("general_inventory_items", ITEM_UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    let item = load_item(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(view(pool.get_ref(), item).await?))
}

/// Delete general inventory item
#[utoipa::path(
    delete,
    path = "/api/inventory/general/{id}",
    params(("id", Path, description = "Item ID")),
    responses(
        (status = 204, description = "Deleted with its transactions"),
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

    if delete_by_id(pool.get_ref(), "general_inventory_items", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Item"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Issue or return stock
///
/// Issuing more than is available, or returning more than is outstanding,
/// is rejected. The check reads the history outside any lock.
#[utoipa::path(
    post,
    path = "/api/inventory/general/{id}/transactions",
    params(("id", Path, description = "Item ID")),
    request_body = CreateTransaction,
    responses(
        (status = 201, description = "Transaction recorded", body = GeneralTransaction),
        (status = 400, description = "Quantity not available", body = ErrorBody),
        (status = 404, description = "Item or employee not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn create_transaction(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateTransaction>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let item_id = path.into_inner();

    let item = load_item(pool.get_ref(), item_id).await?;
    if let Some(employee_id) = payload.employee_id {
        ensure_employee(pool.get_ref(), employee_id).await?;
    }

    let level = stock_level(pool.get_ref(), item_id).await?;
    if let Err(e) = level.check(item.quantity_on_hand, payload.kind, payload.quantity) {
        warn!(item_id, kind = payload.kind.as_ref(), quantity = payload.quantity, "Stock movement rejected");
        return Err(e);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO general_inventory_transactions (item_id, kind, quantity, employee_id, date, note)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item_id)
    .bind(payload.kind.as_ref())
    .bind(payload.quantity)
    .bind(payload.employee_id)
    .bind(payload.date)
    .bind(&payload.note)
    .execute(pool.get_ref())
    .await?;

    info!(
        item_id,
        kind = payload.kind.as_ref(),
        quantity = payload.quantity,
        "Stock movement recorded"
    );
    let tx: GeneralTransaction = find_by_id(
        pool.get_ref(),
        "general_inventory_transactions",
        TX_COLUMNS,
        result.last_insert_id(),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Transaction"))?;
    Ok(HttpResponse::Created().json(tx))
}

/// List stock movements of an item
#[utoipa::path(
    get,
    path = "/api/inventory/general/{id}/transactions",
    params(("id", Path, description = "Item ID"), PageQuery, TransactionFilter),
    responses(
        (status = 200, description = "Paginated transactions", body = TransactionListResponse),
        (status = 404, description = "Item not found", body = ErrorBody)
    ),
    tag = "Inventory",
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    page: web::Query<PageQuery>,
    filter: web::Query<TransactionFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let item_id = path.into_inner();
    load_item(pool.get_ref(), item_id).await?;

    let mut filters = Filters::new();
    filters
        .eq("item_id", Some(item_id))
        .eq("kind", filter.kind.as_deref())
        .eq("employee_id", filter.employee_id);

    let (data, total) = fetch_page(
        pool.get_ref(),
        "general_inventory_transactions",
        TX_COLUMNS,
        &filters,
        "date DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(TransactionListResponse::new(data, &page, total)))
}
