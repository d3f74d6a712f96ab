use crate::{
    api::employee::ensure_employee,
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        role::Role,
        vehicle::{ExpenseKind, VEHICLE_COLUMNS, Vehicle, VehicleExpense, VehicleStatus},
    },
    utils::{
        db_utils::{
            Filters, bind_value_as, build_update_sql, enum_field, execute_update, fetch_page, find_by_id, row_exists,
        },
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &[
    "registration_no",
    "make",
    "model",
    "year",
    "fuel_type",
    "status",
    "driver_id",
];

const EXPENSE_COLUMNS: &str = "id, vehicle_id, kind, amount, date, odometer_km, note, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateVehicle {
    #[schema(example = "DHA-GA-11-2233")]
    pub registration_no: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    #[schema(example = "diesel")]
    pub fuel_type: Option<String>,
    pub status: Option<VehicleStatus>,
    pub driver_id: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VehicleFilter {
    /// active, maintenance or retired
    pub status: Option<String>,
    pub driver_id: Option<u64>,
    /// Matches registration, make and model
    pub search: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateExpense {
    pub kind: ExpenseKind,
    #[schema(example = "3500.00", value_type = String)]
    pub amount: Decimal,
    #[schema(example = "2026-03-02", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub odometer_km: Option<u32>,
    pub note: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseFilter {
    /// fuel, maintenance, insurance or other
    pub kind: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct ExpenseSummary {
    pub vehicle_id: u64,
    /// Amount spent per expense kind
    #[schema(value_type = Object, example = json!({"fuel": "12500.00", "maintenance": "4000.00"}))]
    pub by_kind: BTreeMap<String, Decimal>,
    #[schema(value_type = String, example = "16500.00")]
    pub total: Decimal,
}

page_response!(VehicleListResponse, Vehicle);
page_response!(ExpenseListResponse, VehicleExpense);

async fn load(pool: &MySqlPool, id: u64) -> AppResult<Vehicle> {
    find_by_id(pool, "vehicles", VEHICLE_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Vehicle"))
}

async fn ensure_vehicle(pool: &MySqlPool, id: u64) -> AppResult<()> {
    if row_exists(pool, "vehicles", id).await? {
        Ok(())
    } else {
        Err(AppError::not_found("Vehicle"))
    }
}

/// Create vehicle
#[utoipa::path(
    post,
    path = "/api/vehicles",
    request_body = CreateVehicle,
    responses(
        (status = 201, description = "Vehicle created", body = Vehicle),
        (status = 404, description = "Driver not found", body = ErrorBody),
        (status = 409, description = "Registration number already used", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn create_vehicle(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateVehicle>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    let registration_no = payload.registration_no.trim();
    if registration_no.is_empty() {
        return Err(AppError::bad_request("registration_no is required"));
    }
    if let Some(driver_id) = payload.driver_id {
        ensure_employee(pool.get_ref(), driver_id).await?;
    }
    let status = payload.status.unwrap_or(VehicleStatus::Active);

    let result = sqlx::query(
        r#"
        INSERT INTO vehicles (registration_no, make, model, year, fuel_type, status, driver_id)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(registration_no)
    .bind(&payload.make)
    .bind(&payload.model)
    .bind(payload.year)
    .bind(&payload.fuel_type)
    .bind(status.as_ref())
    .bind(payload.driver_id)
    .execute(pool.get_ref())
    .await?;

    let vehicle = load(pool.get_ref(), result.last_insert_id()).await?;
    info!(vehicle_id = vehicle.id, registration_no, "Vehicle created");
    Ok(HttpResponse::Created().json(vehicle))
}

/// List vehicles
#[utoipa::path(
    get,
    path = "/api/vehicles",
    params(PageQuery, VehicleFilter),
    responses((status = 200, description = "Paginated vehicles", body = VehicleListResponse)),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn list_vehicles(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<VehicleFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("status", filter.status.as_deref())
        .eq("driver_id", filter.driver_id)
        .search(&["registration_no", "make", "model"], filter.search.as_deref());

    let (data, total) = fetch_page(
        pool.get_ref(),
        "vehicles",
        VEHICLE_COLUMNS,
        &filters,
        "registration_no",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(VehicleListResponse::new(data, &page, total)))
}

/// Get vehicle
#[utoipa::path(
    get,
    path = "/api/vehicles/{id}",
    params(("id", Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle", body = Vehicle),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn get_vehicle(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load(pool.get_ref(), path.into_inner()).await?))
}

/// Update vehicle
#[utoipa::path(
    put,
    path = "/api/vehicles/{id}",
    params(("id", Path, description = "Vehicle ID")),
    request_body(content = Object, example = json!({"status": "maintenance", "driver_id": null})),
    responses(
        (status = 200, description = "Updated vehicle", body = Vehicle),
        (status = 400, description = "Unknown field or status", body = ErrorBody),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn update_vehicle(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;
    let id = path.into_inner();

    enum_field::<VehicleStatus>(&body, "status", "vehicle status")?;

    let update = build_update_sql("vehicles", UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load(pool.get_ref(), id).await?))
}

/// Delete vehicle
///
/// Expenses of the vehicle are deleted with it.
#[utoipa::path(
    delete,
    path = "/api/vehicles/{id}",
    params(("id", Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn delete_vehicle(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store])?;

    let affected = sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("Vehicle"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Record a vehicle expense
#[utoipa::path(
    post,
    path = "/api/vehicles/{id}/expenses",
    params(("id", Path, description = "Vehicle ID")),
    request_body = CreateExpense,
    responses(
        (status = 201, description = "Expense recorded", body = VehicleExpense),
        (status = 400, description = "Amount must be positive", body = ErrorBody),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn create_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateExpense>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store, Role::Finance])?;
    let vehicle_id = path.into_inner();

    if payload.amount <= Decimal::ZERO {
        return Err(AppError::bad_request("amount must be greater than zero"));
    }
    ensure_vehicle(pool.get_ref(), vehicle_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO vehicle_expenses (vehicle_id, kind, amount, date, odometer_km, note)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(vehicle_id)
    .bind(payload.kind.as_ref())
    .bind(payload.amount)
    .bind(payload.date)
    .bind(payload.odometer_km)
    .bind(&payload.note)
    .execute(pool.get_ref())
    .await?;

    let expense: VehicleExpense = find_by_id(
        pool.get_ref(),
        "vehicle_expenses",
        EXPENSE_COLUMNS,
        result.last_insert_id(),
    )
    .await?
    .ok_or_else(|| AppError::not_found("Expense"))?;
    Ok(HttpResponse::Created().json(expense))
}

fn expense_filters(vehicle_id: u64, filter: &ExpenseFilter) -> Filters {
    let mut filters = Filters::new();
    filters
        .eq("vehicle_id", Some(vehicle_id))
        .eq("kind", filter.kind.as_deref())
        .at_least("date", filter.from)
        .at_most("date", filter.to);
    filters
}

/// List vehicle expenses
#[utoipa::path(
    get,
    path = "/api/vehicles/{id}/expenses",
    params(("id", Path, description = "Vehicle ID"), PageQuery, ExpenseFilter),
    responses(
        (status = 200, description = "Paginated expenses", body = ExpenseListResponse),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn list_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    page: web::Query<PageQuery>,
    filter: web::Query<ExpenseFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let vehicle_id = path.into_inner();
    ensure_vehicle(pool.get_ref(), vehicle_id).await?;

    let (data, total) = fetch_page(
        pool.get_ref(),
        "vehicle_expenses",
        EXPENSE_COLUMNS,
        &expense_filters(vehicle_id, &filter),
        "date DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ExpenseListResponse::new(data, &page, total)))
}

/// Delete a vehicle expense
#[utoipa::path(
    delete,
    path = "/api/vehicles/{id}/expenses/{expense_id}",
    params(
        ("id", Path, description = "Vehicle ID"),
        ("expense_id", Path, description = "Expense ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Expense not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn delete_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Store, Role::Finance])?;
    let (vehicle_id, expense_id) = path.into_inner();

    let affected = sqlx::query("DELETE FROM vehicle_expenses WHERE id = ? AND vehicle_id = ?")
        .bind(expense_id)
        .bind(vehicle_id)
        .execute(pool.get_ref())
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::not_found("Expense"));
    }
    Ok(HttpResponse::NoContent().finish())
}

pub fn summarize_expenses(rows: Vec<(String, Decimal)>) -> (BTreeMap<String, Decimal>, Decimal) {
    let mut by_kind = BTreeMap::new();
    for (kind, amount) in rows {
        *by_kind.entry(kind).or_insert(Decimal::ZERO) += amount;
    }
    let total = by_kind.values().copied().sum();
    (by_kind, total)
}

/// Expense totals per kind
#[utoipa::path(
    get,
    path = "/api/vehicles/{id}/expenses/summary",
    params(("id", Path, description = "Vehicle ID"), ExpenseFilter),
    responses(
        (status = 200, description = "Totals per expense kind", body = ExpenseSummary),
        (status = 404, description = "Vehicle not found", body = ErrorBody)
    ),
    tag = "Vehicle",
    security(("bearer_auth" = []))
)]
pub async fn expense_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    filter: web::Query<ExpenseFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let vehicle_id = path.into_inner();
    ensure_vehicle(pool.get_ref(), vehicle_id).await?;

    let filters = expense_filters(vehicle_id, &filter);
    let sql = format!(
        "SELECT kind, SUM(amount) FROM vehicle_expenses {} GROUP BY kind",
        filters.where_clause()
    );
    let mut query = sqlx::query_as::<_, (String, Decimal)>(&sql);
    for value in filters.values() {
        query = bind_value_as(query, value.clone());
    }
    let rows = query.fetch_all(pool.get_ref()).await?;

    let (by_kind, total) = summarize_expenses(rows);
    Ok(HttpResponse::Ok().json(ExpenseSummary {
        vehicle_id,
        by_kind,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_totals_every_kind() {
        let (by_kind, total) = summarize_expenses(vec![
            ("fuel".into(), Decimal::new(120_050, 2)),
            ("maintenance".into(), Decimal::from(4_000)),
            ("fuel".into(), Decimal::from(300)),
        ]);
        assert_eq!(by_kind["fuel"], Decimal::new(150_050, 2));
        assert_eq!(total, Decimal::new(550_050, 2));
    }

    #[test]
    fn expense_filters_always_scope_to_vehicle() {
        let filter = ExpenseFilter {
            kind: None,
            from: None,
            to: None,
        };
        let filters = expense_filters(7, &filter);
        assert_eq!(filters.where_clause(), "WHERE vehicle_id = ?");
    }
}
