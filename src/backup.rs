//! Periodic JSON export of the whole database to object storage, and the
//! matching restore used by the `erp-import` binary.
//!
//! An export is one JSON document `{generated_at, tables: {name: [rows]}}`.
//! Rows are produced by MySQL itself through `JSON_OBJECT`, so column types
//! come out the way the server renders them.

use crate::error::{AppError, AppResult};
use crate::model::backup::BackupRun;
use crate::storage::Storage;
use crate::utils::db_utils::{bind_value, json_to_sql_value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// Exported tables, parents before children.
pub const TABLES: &[&str] = &[
    "departments",
    "employees",
    "users",
    "attendance",
    "leave_periods",
    "salary_advances",
    "salary_deductions",
    "payslips",
    "vehicles",
    "vehicle_expenses",
    "clients",
    "invoices",
    "invoice_items",
    "finance_accounts",
    "journal_entries",
    "journal_lines",
    "general_inventory_items",
    "general_inventory_transactions",
    "restricted_inventory_items",
    "serial_units",
    "serial_unit_movements",
    "documents",
];

const RUN_COLUMNS: &str = "id, started_at, finished_at, status, object_key, row_count, error";

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub generated_at: DateTime<Utc>,
    pub tables: BTreeMap<String, Vec<Value>>,
}

impl BackupFile {
    pub fn row_count(&self) -> u64 {
        self.tables.values().map(|rows| rows.len() as u64).sum()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TableReport {
    pub inserted: u64,
    pub failed: u64,
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `SELECT CAST(JSON_OBJECT('a', `a`, ...) AS CHAR) FROM `table``
pub fn export_sql(table: &str, columns: &[String]) -> String {
    let pairs = columns
        .iter()
        .map(|c| format!("'{c}', `{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT CAST(JSON_OBJECT({pairs}) AS CHAR) FROM `{table}` ORDER BY id")
}

/// Insert statement for one backed-up row, columns in key order.
pub fn insert_sql(table: &str, row: &Map<String, Value>) -> AppResult<String> {
    if !TABLES.contains(&table) {
        return Err(AppError::BadRequest(format!("Unknown table {table}")));
    }
    if row.is_empty() {
        return Err(AppError::bad_request("Empty row"));
    }
    if let Some(bad) = row.keys().find(|k| !is_identifier(k)) {
        return Err(AppError::BadRequest(format!("Invalid column name {bad}")));
    }

    let columns = row.keys().map(|k| format!("`{k}`")).collect::<Vec<_>>().join(", ");
    let marks = vec!["?"; row.len()].join(", ");
    Ok(format!("INSERT INTO `{table}` ({columns}) VALUES ({marks})"))
}

pub fn object_key(prefix: &str, at: DateTime<Utc>) -> String {
    let prefix = prefix.trim_matches('/');
    let name = format!("erp-{}.json", at.format("%Y%m%dT%H%M%SZ"));
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

async fn table_columns(pool: &MySqlPool, table: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COLUMN_NAME FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
}

/// Reads every exported table into memory.
pub async fn export(pool: &MySqlPool) -> anyhow::Result<BackupFile> {
    let mut tables = BTreeMap::new();
    for table in TABLES {
        let columns = table_columns(pool, table).await?;
        if columns.is_empty() {
            warn!(table, "Table missing from schema, skipped");
            continue;
        }

        let rows: Vec<String> = sqlx::query_scalar(&export_sql(table, &columns))
            .fetch_all(pool)
            .await?;
        let rows = rows
            .iter()
            .map(|raw| serde_json::from_str(raw))
            .collect::<Result<Vec<Value>, _>>()?;

        tables.insert(table.to_string(), rows);
    }

    Ok(BackupFile {
        generated_at: Utc::now(),
        tables,
    })
}

/// Tables to restore, in dependency order. An empty selection means all.
pub fn restore_order(only: &[String]) -> AppResult<Vec<&'static str>> {
    if let Some(unknown) = only.iter().find(|t| !TABLES.contains(&t.as_str())) {
        return Err(AppError::BadRequest(format!("Unknown table {unknown}")));
    }
    Ok(TABLES
        .iter()
        .copied()
        .filter(|t| only.is_empty() || only.iter().any(|o| o == t))
        .collect())
}

/// Inserts backed-up rows one by one; a failing row is counted and skipped.
pub async fn restore_table(pool: &MySqlPool, table: &str, rows: &[Value]) -> TableReport {
    let mut report = TableReport::default();
    for (i, row) in rows.iter().enumerate() {
        match restore_row(pool, table, row).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                warn!(table, row = i, error = %e, "Row not restored");
                report.failed += 1;
            }
        }
    }
    report
}

async fn restore_row(pool: &MySqlPool, table: &str, row: &Value) -> AppResult<()> {
    let object = row
        .as_object()
        .ok_or_else(|| AppError::bad_request("Row is not a JSON object"))?;
    let sql = insert_sql(table, object)?;

    let mut query = sqlx::query(&sql);
    for value in object.values() {
        query = bind_value(query, json_to_sql_value(value)?);
    }
    query.execute(pool).await?;
    Ok(())
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct BackupJob {
    pool: MySqlPool,
    storage: Storage,
    prefix: String,
    running: Arc<AtomicBool>,
}

impl BackupJob {
    pub fn new(pool: MySqlPool, storage: Storage, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            storage,
            prefix: prefix.into(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_start(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(self.running.clone()))
    }

    /// Exports, uploads and records one run. Conflict while another run is active.
    pub async fn run(&self) -> AppResult<BackupRun> {
        let _guard = self
            .try_start()
            .ok_or_else(|| AppError::Conflict("A backup is already running".into()))?;

        let run_id = sqlx::query("INSERT INTO backup_runs (status) VALUES ('running')")
            .execute(&self.pool)
            .await?
            .last_insert_id();
        info!(run_id, "Backup started");

        let outcome = self.export_and_upload().await;
        match &outcome {
            Ok((key, rows)) => {
                sqlx::query(
                    r#"
                    UPDATE backup_runs
                    SET status = 'succeeded', finished_at = NOW(), object_key = ?, row_count = ?
                    WHERE id = ?
                    "#,
                )
                .bind(key)
                .bind(rows)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
                info!(run_id, object_key = %key, rows, "Backup finished");
            }
            Err(e) => {
                let message: String = e.to_string().chars().take(1000).collect();
                sqlx::query(
                    "UPDATE backup_runs SET status = 'failed', finished_at = NOW(), error = ? WHERE id = ?",
                )
                .bind(&message)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
                error!(run_id, error = %e, "Backup failed");
            }
        }

        let sql = format!("SELECT {RUN_COLUMNS} FROM backup_runs WHERE id = ?");
        Ok(sqlx::query_as::<_, BackupRun>(&sql)
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn export_and_upload(&self) -> anyhow::Result<(String, u64)> {
        let file = export(&self.pool).await?;
        let rows = file.row_count();
        let key = object_key(&self.prefix, file.generated_at);
        let body = serde_json::to_vec(&file)?;
        let location = self.storage.put(&key, body, "application/json").await?;
        Ok((location, rows))
    }

    /// Runs an export every `every` on the actix runtime. A tick that finds a
    /// run still active is skipped.
    pub fn spawn_scheduler(self, every: Duration) {
        actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(every);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if self.is_running() {
                    warn!("Previous backup still running, tick skipped");
                    continue;
                }
                if let Err(e) = self.run().await {
                    error!(error = %e, "Scheduled backup did not run");
                }
            }
        });
        info!(every_secs = every.as_secs(), "Backup scheduler started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn export_sql_builds_json_object() {
        let sql = export_sql("clients", &["id".into(), "name".into()]);
        assert_eq!(
            sql,
            "SELECT CAST(JSON_OBJECT('id', `id`, 'name', `name`) AS CHAR) FROM `clients` ORDER BY id"
        );
    }

    #[test]
    fn insert_sql_validates_names() {
        let row = json!({"id": 1, "name": "Acme"});
        let sql = insert_sql("clients", row.as_object().unwrap()).unwrap();
        assert_eq!(sql, "INSERT INTO `clients` (`id`, `name`) VALUES (?, ?)");

        let bad = json!({"id); DROP TABLE users; --": 1});
        assert!(insert_sql("clients", bad.as_object().unwrap()).is_err());
        assert!(insert_sql("refresh_tokens", row.as_object().unwrap()).is_err());
    }

    #[test]
    fn parents_come_before_children() {
        let pos = |t: &str| TABLES.iter().position(|x| *x == t).unwrap();
        assert!(pos("employees") < pos("attendance"));
        assert!(pos("clients") < pos("invoices"));
        assert!(pos("invoices") < pos("invoice_items"));
        assert!(pos("finance_accounts") < pos("journal_lines"));
        assert!(pos("serial_units") < pos("serial_unit_movements"));
    }

    #[test]
    fn restore_order_keeps_dependency_order() {
        let all = restore_order(&[]).unwrap();
        assert_eq!(all.len(), TABLES.len());

        let picked = restore_order(&["invoice_items".into(), "clients".into()]).unwrap();
        assert_eq!(picked, vec!["clients", "invoice_items"]);

        assert!(restore_order(&["refresh_tokens".into()]).is_err());
    }

    #[test]
    fn object_keys_are_timestamped() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
        assert_eq!(object_key("backups/", at), "backups/erp-20260301T060000Z.json");
        assert_eq!(object_key("", at), "erp-20260301T060000Z.json");
    }

    #[test]
    fn guard_resets_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        drop(RunningGuard(flag.clone()));
        assert!(!flag.load(Ordering::Acquire));
    }
}
