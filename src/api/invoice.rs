use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        invoice::{INVOICE_COLUMNS, Invoice, InvoiceItem, InvoiceStatus},
        role::Role,
    },
    service::codes::{INVOICE_PREFIX, INVOICE_WIDTH, current_max, next_code},
    utils::{
        db_utils::{Filters, build_update_sql, delete_by_id, enum_field, execute_update, fetch_page, find_by_id},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const UPDATABLE: &[&str] = &["client_id", "issue_date", "due_date", "status", "note"];
const ITEM_COLUMNS: &str = "id, invoice_id, description, quantity, unit_price, amount";

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewInvoiceItem {
    #[schema(example = "Container haulage Chattogram to Dhaka")]
    pub description: String,
    #[schema(example = "2", value_type = String)]
    pub quantity: Decimal,
    #[schema(example = "18500.00", value_type = String)]
    pub unit_price: Decimal,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateInvoice {
    pub client_id: u64,
    #[schema(example = "2026-03-01", format = "date", value_type = String)]
    pub issue_date: NaiveDate,
    #[schema(example = "2026-03-31", format = "date", value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub client_id: Option<u64>,
    /// draft, sent, paid or cancelled
    pub status: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

page_response!(InvoiceListResponse, Invoice);

/// Largest value a `DECIMAL(14,2)` column holds.
fn money_limit() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Line amount rounded to cents; `None` when the product overflows.
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity
        .checked_mul(unit_price)
        .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Validates the lines and returns each line amount plus the invoice total.
pub fn price_items(items: &[NewInvoiceItem]) -> AppResult<(Vec<Decimal>, Decimal)> {
    if items.is_empty() {
        return Err(AppError::bad_request("An invoice needs at least one item"));
    }

    let mut amounts = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(AppError::BadRequest(format!("items[{i}].description is required")));
        }
        if item.quantity <= Decimal::ZERO {
            return Err(AppError::BadRequest(format!("items[{i}].quantity must be positive")));
        }
        if item.unit_price.is_sign_negative() {
            return Err(AppError::BadRequest(format!("items[{i}].unit_price must not be negative")));
        }
        if item.quantity > money_limit() || item.unit_price > money_limit() {
            return Err(AppError::BadRequest(format!("items[{i}] exceeds the supported amount")));
        }
        let amount = line_amount(item.quantity, item.unit_price)
            .filter(|a| *a <= money_limit())
            .ok_or_else(|| AppError::BadRequest(format!("items[{i}] amount is too large")))?;
        amounts.push(amount);
    }

    let total = amounts
        .iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(*a))
        .filter(|t| *t <= money_limit())
        .ok_or_else(|| AppError::bad_request("Invoice total is too large"))?;
    Ok((amounts, total))
}

async fn load_detail(pool: &MySqlPool, id: u64) -> AppResult<InvoiceDetail> {
    let invoice: Invoice = find_by_id(pool, "invoices", INVOICE_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice"))?;

    let sql = format!("SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ? ORDER BY id");
    let items = sqlx::query_as::<_, InvoiceItem>(&sql)
        .bind(id)
        .fetch_all(pool)
        .await?;

    Ok(InvoiceDetail { invoice, items })
}

/// Create invoice
///
/// The total is computed from the items; any client supplied total is ignored.
/// The invoice number is generated as `INV-0001` style.
#[utoipa::path(
    post,
    path = "/api/invoices",
    request_body = CreateInvoice,
    responses(
        (status = 201, description = "Invoice created with its items", body = InvoiceDetail),
        (status = 400, description = "Invalid items or unknown client", body = ErrorBody),
        (status = 409, description = "Generated number collided, retry", body = ErrorBody)
    ),
    tag = "Invoice",
    security(("bearer_auth" = []))
)]
pub async fn create_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateInvoice>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    if payload.due_date.is_some_and(|due| due < payload.issue_date) {
        return Err(AppError::bad_request("due_date must not be before issue_date"));
    }
    let (amounts, total) = price_items(&payload.items)?;

    let mut tx = pool.begin().await?;

    let current = current_max(&mut *tx, "invoices", "invoice_no", INVOICE_PREFIX).await?;
    let invoice_no = next_code(INVOICE_PREFIX, INVOICE_WIDTH, current);

    let invoice_id = sqlx::query(
        r#"
        INSERT INTO invoices (invoice_no, client_id, issue_date, due_date, status, total, note)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&invoice_no)
    .bind(payload.client_id)
    .bind(payload.issue_date)
    .bind(payload.due_date)
    .bind(InvoiceStatus::Draft.as_ref())
    .bind(total)
    .bind(&payload.note)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for (item, amount) in payload.items.iter().zip(&amounts) {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, amount)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(invoice_id)
        .bind(item.description.trim())
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(invoice_no = %invoice_no, client_id = payload.client_id, total = %total, "Invoice created");
    Ok(HttpResponse::Created().json(load_detail(pool.get_ref(), invoice_id).await?))
}

/// List invoices
#[utoipa::path(
    get,
    path = "/api/invoices",
    params(PageQuery, InvoiceFilter),
    responses((status = 200, description = "Paginated invoices", body = InvoiceListResponse)),
    tag = "Invoice",
    security(("bearer_auth" = []))
)]
pub async fn list_invoices(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<InvoiceFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("client_id", filter.client_id)
        .eq("status", filter.status.as_deref())
        .at_least("issue_date", filter.from)
        .at_most("issue_date", filter.to);

    let (data, total) = fetch_page(
        pool.get_ref(),
        "invoices",
        INVOICE_COLUMNS,
        &filters,
        "issue_date DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(InvoiceListResponse::new(data, &page, total)))
}

/// Get invoice with its items
#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    params(("id", Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice and items", body = InvoiceDetail),
        (status = 404, description = "Invoice not found", body = ErrorBody)
    ),
    tag = "Invoice",
    security(("bearer_auth" = []))
)]
pub async fn get_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load_detail(pool.get_ref(), path.into_inner()).await?))
}

/// Update invoice header or status
///
/// Items and total are fixed once created.
#[utoipa::path(
    put,
    path = "/api/invoices/{id}",
    params(("id", Path, description = "Invoice ID")),
    request_body(content = Object, example = json!({"status": "sent"})),
    responses(
        (status = 200, description = "Updated invoice", body = InvoiceDetail),
        (status = 400, description = "Unknown field or status", body = ErrorBody),
        (status = 404, description = "Invoice not found", body = ErrorBody)
    ),
    tag = "Invoice",
    security(("bearer_auth" = []))
)]
pub async fn update_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let id = path.into_inner();

    enum_field::<InvoiceStatus>(&body, "status", "invoice status")?;

    let update = build_update_sql("invoices", UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load_detail(pool.get_ref(), id).await?))
}

/// Delete invoice
///
/// Items are deleted with it.
#[utoipa::path(
    delete,
    path = "/api/invoices/{id}",
    params(("id", Path, description = "Invoice ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Invoice not found", body = ErrorBody)
    ),
    tag = "Invoice",
    security(("bearer_auth" = []))
)]
pub async fn delete_invoice(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    if delete_by_id(pool.get_ref(), "invoices", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Invoice"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(quantity: Decimal, unit_price: Decimal) -> NewInvoiceItem {
        NewInvoiceItem {
            description: "Haulage".into(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn total_is_sum_of_lines() {
        let items = [
            item(Decimal::from(2), Decimal::new(18_500_00, 2)),
            item(Decimal::new(15, 1), Decimal::new(333, 2)),
        ];
        let (amounts, total) = price_items(&items).unwrap();
        assert_eq!(amounts[0], Decimal::from(37_000));
        // 1.5 x 3.33 = 4.995
        assert_eq!(amounts[1], Decimal::new(500, 2));
        assert_eq!(total, Decimal::new(3_700_500, 2));
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(price_items(&[]).is_err());
        assert!(price_items(&[item(Decimal::ZERO, Decimal::ONE)]).is_err());
        assert!(price_items(&[item(Decimal::ONE, Decimal::NEGATIVE_ONE)]).is_err());
    }

    #[test]
    fn oversized_amounts_are_bad_requests() {
        let huge = Decimal::from_str("99999999999999999999").unwrap();
        assert!(line_amount(huge, huge).is_none());
        assert!(matches!(
            price_items(&[item(huge, huge)]),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            price_items(&[item(Decimal::MAX, Decimal::MAX)]),
            Err(AppError::BadRequest(_))
        ));

        // each line fits the column, their product does not
        let big = Decimal::from(10_000_000);
        assert!(matches!(
            price_items(&[item(big, big)]),
            Err(AppError::BadRequest(_))
        ));

        // lines fit, the sum does not
        let line = item(Decimal::ONE, Decimal::new(60_000_000_000_000, 2));
        assert!(matches!(
            price_items(&[line, item(Decimal::ONE, Decimal::new(60_000_000_000_000, 2))]),
            Err(AppError::BadRequest(_))
        ));
    }
}
