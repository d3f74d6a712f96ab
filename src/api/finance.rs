use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        finance::{AccountKind, FinanceAccount, JournalEntry, JournalLine, Side},
        role::Role,
    },
    utils::{
        db_utils::{
            Filters, build_update_sql, delete_by_id, enum_field, execute_update, fetch_page, find_by_id,
            row_exists,
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
use std::str::FromStr;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const ACCOUNT_COLUMNS: &str = "id, code, name, kind, description, created_at";
const ACCOUNT_UPDATABLE: &[&str] = &["code", "name", "kind", "description"];
const ENTRY_COLUMNS: &str = "id, entry_date, reference, description, created_at";
const LINE_COLUMNS: &str = "id, entry_id, account_id, side, amount, memo";

#[derive(Deserialize, ToSchema)]
pub struct CreateAccount {
    #[schema(example = "1000")]
    pub code: String,
    #[schema(example = "Cash in hand")]
    pub name: String,
    pub kind: AccountKind,
    pub description: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountFilter {
    /// asset, liability, equity, income or expense
    pub kind: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewJournalLine {
    pub account_id: u64,
    pub side: Side,
    #[schema(example = "1500.00", value_type = String)]
    pub amount: Decimal,
    pub memo: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateJournalEntry {
    #[schema(example = "2026-03-10", format = "date", value_type = String)]
    pub entry_date: NaiveDate,
    #[schema(example = "INV-0007")]
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<NewJournalLine>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JournalFilter {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// Substring of the reference or description
    pub search: Option<String>,
}

/// Debit and credit sums over a set of lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Totals {
    #[schema(value_type = String)]
    pub total_debit: Decimal,
    #[schema(value_type = String)]
    pub total_credit: Decimal,
    pub balanced: bool,
}

impl Totals {
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Side, Decimal)>,
    {
        let (total_debit, total_credit) =
            lines
                .into_iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(dr, cr), (side, amount)| match side {
                    Side::Debit => (dr + amount, cr),
                    Side::Credit => (dr, cr + amount),
                });
        Self {
            total_debit,
            total_credit,
            balanced: total_debit == total_credit,
        }
    }

    /// Debit minus credit.
    pub fn net(&self) -> Decimal {
        self.total_debit - self.total_credit
    }
}

#[derive(Serialize, ToSchema)]
pub struct JournalEntryDetail {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Serialize, ToSchema)]
pub struct AccountBalance {
    pub account_id: u64,
    #[schema(value_type = String)]
    pub total_debit: Decimal,
    #[schema(value_type = String)]
    pub total_credit: Decimal,
    /// Debit minus credit
    #[schema(value_type = String)]
    pub balance: Decimal,
}

page_response!(AccountListResponse, FinanceAccount);
page_response!(JournalListResponse, JournalEntry);

async fn load_account(pool: &MySqlPool, id: u64) -> AppResult<FinanceAccount> {
    find_by_id(pool, "finance_accounts", ACCOUNT_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Account"))
}

fn line_totals(lines: &[JournalLine]) -> Totals {
    Totals::from_lines(
        lines
            .iter()
            .filter_map(|l| Side::from_str(&l.side).ok().map(|side| (side, l.amount))),
    )
}

async fn load_entry(pool: &MySqlPool, id: u64) -> AppResult<JournalEntryDetail> {
    let entry: JournalEntry = find_by_id(pool, "journal_entries", ENTRY_COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Journal entry"))?;

    let sql = format!("SELECT {LINE_COLUMNS} FROM journal_lines WHERE entry_id = ? ORDER BY id");
    let lines = sqlx::query_as::<_, JournalLine>(&sql)
        .bind(id)
        .fetch_all(pool)
        .await?;

    let totals = line_totals(&lines);
    Ok(JournalEntryDetail {
        entry,
        lines,
        totals,
    })
}

/// Create finance account
#[utoipa::path(
    post,
    path = "/api/finance/accounts",
    request_body = CreateAccount,
    responses(
        (status = 201, description = "Account created", body = FinanceAccount),
        (status = 409, description = "Code already used", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn create_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAccount>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    let code = payload.code.trim();
    let name = payload.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(AppError::bad_request("code and name are required"));
    }

    let result = sqlx::query(
        "INSERT INTO finance_accounts (code, name, kind, description) VALUES (?, ?, ?, ?)",
    )
    .bind(code)
    .bind(name)
    .bind(payload.kind.as_ref())
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await?;

    info!(code, kind = payload.kind.as_ref(), "Finance account created");
    let account = load_account(pool.get_ref(), result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(account))
}

/// List finance accounts
#[utoipa::path(
    get,
    path = "/api/finance/accounts",
    params(PageQuery, AccountFilter),
    responses((status = 200, description = "Paginated accounts", body = AccountListResponse)),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn list_accounts(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<AccountFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("kind", filter.kind.as_deref())
        .search(&["code", "name"], filter.search.as_deref());

    let (data, total) = fetch_page(
        pool.get_ref(),
        "finance_accounts",
        ACCOUNT_COLUMNS,
        &filters,
        "code",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(AccountListResponse::new(data, &page, total)))
}

/// Get finance account
#[utoipa::path(
    get,
    path = "/api/finance/accounts/{id}",
    params(("id", Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account", body = FinanceAccount),
        (status = 404, description = "Account not found", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn get_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load_account(pool.get_ref(), path.into_inner()).await?))
}

/// Update finance account
#[utoipa::path(
    put,
    path = "/api/finance/accounts/{id}",
    params(("id", Path, description = "Account ID")),
    request_body(content = Object, example = json!({"name": "Cash at bank"})),
    responses(
        (status = 200, description = "Updated account", body = FinanceAccount),
        (status = 400, description = "Unknown field or kind", body = ErrorBody),
        (status = 404, description = "Account not found", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn update_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    let id = path.into_inner();

    enum_field::<AccountKind>(&body, "kind", "account kind")?;

    let update = build_update_sql("finance_accounts", ACCOUNT_UPDATABLE, &body, id)?;
    execute_update(pool.get_ref(), update).await?;

    Ok(HttpResponse::Ok().json(load_account(pool.get_ref(), id).await?))
}

/// Delete finance account
///
/// Accounts referenced by journal lines cannot be deleted.
#[utoipa::path(
    delete,
    path = "/api/finance/accounts/{id}",
    params(("id", Path, description = "Account ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Account not found", body = ErrorBody),
        (status = 409, description = "Account has journal lines", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn delete_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    if delete_by_id(pool.get_ref(), "finance_accounts", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Account"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Account balance
#[utoipa::path(
    get,
    path = "/api/finance/accounts/{id}/balance",
    params(("id", Path, description = "Account ID")),
    responses(
        (status = 200, description = "Debit, credit and balance", body = AccountBalance),
        (status = 404, description = "Account not found", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn account_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let account_id = path.into_inner();

    if !row_exists(pool.get_ref(), "finance_accounts", account_id).await? {
        return Err(AppError::not_found("Account"));
    }

    let rows: Vec<(String, Decimal)> = sqlx::query_as(
        "SELECT side, COALESCE(SUM(amount), 0) FROM journal_lines WHERE account_id = ? GROUP BY side",
    )
    .bind(account_id)
    .fetch_all(pool.get_ref())
    .await?;

    let totals = Totals::from_lines(
        rows.into_iter()
            .filter_map(|(side, amount)| Side::from_str(&side).ok().map(|s| (s, amount))),
    );
    Ok(HttpResponse::Ok().json(AccountBalance {
        account_id,
        total_debit: totals.total_debit,
        total_credit: totals.total_credit,
        balance: totals.net(),
    }))
}

fn check_lines(lines: &[NewJournalLine]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::bad_request("A journal entry needs at least one line"));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(format!("lines[{i}].amount must be positive")));
        }
    }
    Ok(())
}

/// Create journal entry
///
/// Header and lines are written in one transaction. Debits and credits are
/// not required to balance; the response reports whether they do.
#[utoipa::path(
    post,
    path = "/api/finance/journal-entries",
    request_body = CreateJournalEntry,
    responses(
        (status = 201, description = "Entry created", body = JournalEntryDetail),
        (status = 400, description = "No lines, bad amount or unknown account", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn create_journal_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateJournalEntry>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;
    check_lines(&payload.lines)?;

    let mut tx = pool.begin().await?;

    let entry_id = sqlx::query(
        "INSERT INTO journal_entries (entry_date, reference, description) VALUES (?, ?, ?)",
    )
    .bind(payload.entry_date)
    .bind(&payload.reference)
    .bind(&payload.description)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    for line in &payload.lines {
        sqlx::query(
            "INSERT INTO journal_lines (entry_id, account_id, side, amount, memo) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry_id)
        .bind(line.account_id)
        .bind(line.side.as_ref())
        .bind(line.amount)
        .bind(&line.memo)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let detail = load_entry(pool.get_ref(), entry_id).await?;
    info!(
        entry_id,
        lines = detail.lines.len(),
        balanced = detail.totals.balanced,
        "Journal entry created"
    );
    Ok(HttpResponse::Created().json(detail))
}

/// List journal entries
#[utoipa::path(
    get,
    path = "/api/finance/journal-entries",
    params(PageQuery, JournalFilter),
    responses((status = 200, description = "Paginated entries", body = JournalListResponse)),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn list_journal_entries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<JournalFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .at_least("entry_date", filter.from)
        .at_most("entry_date", filter.to)
        .search(&["reference", "description"], filter.search.as_deref());

    let (data, total) = fetch_page(
        pool.get_ref(),
        "journal_entries",
        ENTRY_COLUMNS,
        &filters,
        "entry_date DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(JournalListResponse::new(data, &page, total)))
}

/// Get journal entry with lines and totals
#[utoipa::path(
    get,
    path = "/api/finance/journal-entries/{id}",
    params(("id", Path, description = "Journal entry ID")),
    responses(
        (status = 200, description = "Entry, lines and totals", body = JournalEntryDetail),
        (status = 404, description = "Journal entry not found", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn get_journal_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    Ok(HttpResponse::Ok().json(load_entry(pool.get_ref(), path.into_inner()).await?))
}

/// Delete journal entry
#[utoipa::path(
    delete,
    path = "/api/finance/journal-entries/{id}",
    params(("id", Path, description = "Journal entry ID")),
    responses(
        (status = 204, description = "Deleted with its lines"),
        (status = 404, description = "Journal entry not found", body = ErrorBody)
    ),
    tag = "Finance",
    security(("bearer_auth" = []))
)]
pub async fn delete_journal_entry(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(&[Role::Finance])?;

    if delete_by_id(pool.get_ref(), "journal_entries", path.into_inner()).await? == 0 {
        return Err(AppError::not_found("Journal entry"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_flag_balance() {
        let totals = Totals::from_lines([
            (Side::Debit, Decimal::from(1_500)),
            (Side::Credit, Decimal::from(1_000)),
            (Side::Credit, Decimal::from(500)),
        ]);
        assert_eq!(totals.total_debit, Decimal::from(1_500));
        assert!(totals.balanced);
        assert_eq!(totals.net(), Decimal::ZERO);
    }

    #[test]
    fn unbalanced_entries_are_reported_not_rejected() {
        let totals = Totals::from_lines([(Side::Debit, Decimal::from(200))]);
        assert!(!totals.balanced);
        assert_eq!(totals.net(), Decimal::from(200));
    }

    #[test]
    fn lines_need_positive_amounts() {
        let line = |amount| NewJournalLine {
            account_id: 1,
            side: Side::Debit,
            amount,
            memo: None,
        };
        assert!(check_lines(&[]).is_err());
        assert!(check_lines(&[line(Decimal::ZERO)]).is_err());
        assert!(check_lines(&[line(Decimal::ONE)]).is_ok());
    }
}
