//! Human-readable record codes such as `FCID-003` or `FGI-01`.
//!
//! The next code is derived from the highest existing sequence for the
//! prefix. Two concurrent inserts can compute the same code; the unique key on
//! the code column turns the loser into a 409.

use sqlx::{Executor, MySql, MySqlPool};

pub const EMPLOYEE_PREFIX: &str = "EMP-";
pub const CLIENT_PREFIX: &str = "FCID-";
pub const GENERAL_ITEM_PREFIX: &str = "FGI-";
pub const RESTRICTED_ITEM_PREFIX: &str = "FRI-";
pub const INVOICE_PREFIX: &str = "INV-";

pub const EMPLOYEE_WIDTH: usize = 3;
pub const CLIENT_WIDTH: usize = 3;
pub const ITEM_WIDTH: usize = 2;
pub const INVOICE_WIDTH: usize = 4;

pub fn format_code(prefix: &str, width: usize, sequence: u64) -> String {
    format!("{prefix}{sequence:0width$}")
}

pub fn next_code(prefix: &str, width: usize, current_max: Option<u64>) -> String {
    format_code(prefix, width, current_max.unwrap_or(0) + 1)
}

/// Highest sequence currently used for `prefix` in `table.column`.
pub async fn current_max<'e, E>(
    executor: E,
    table: &str,
    column: &str,
    prefix: &str,
) -> Result<Option<u64>, sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let sql = format!(
        "SELECT MAX(CAST(SUBSTRING({column}, ?) AS UNSIGNED)) FROM {table} WHERE {column} LIKE ?"
    );
    sqlx::query_scalar(&sql)
        .bind((prefix.len() + 1) as i64)
        .bind(format!("{prefix}%"))
        .fetch_one(executor)
        .await
}

/// Allocates the next code for `table.column`.
pub async fn allocate_code(
    pool: &MySqlPool,
    table: &str,
    column: &str,
    prefix: &str,
    width: usize,
) -> Result<String, sqlx::Error> {
    let current = current_max(pool, table, column, prefix).await?;
    Ok(next_code(prefix, width, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_width() {
        assert_eq!(next_code(CLIENT_PREFIX, 3, Some(2)), "FCID-003");
        assert_eq!(next_code(GENERAL_ITEM_PREFIX, 2, None), "FGI-01");
    }

    #[test]
    fn grows_past_width() {
        assert_eq!(next_code(GENERAL_ITEM_PREFIX, 2, Some(99)), "FGI-100");
    }
}
