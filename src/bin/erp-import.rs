//! Restores a JSON export produced by the backup job into an empty database.

use anyhow::Context;
use clap::Parser;
use erp_backend::{
    backup::{BackupFile, restore_order, restore_table},
    config::Config,
    db::{init_db, run_migrations},
    storage::Storage,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erp-import")]
#[command(about = "Load an ERP backup export into the configured database")]
struct Cli {
    /// Export file on local disk
    #[arg(long, conflicts_with = "key", required_unless_present = "key")]
    file: Option<PathBuf>,
    /// Object key of an export, as recorded in backup_runs.object_key
    #[arg(long)]
    key: Option<String>,
    /// Comma separated subset of tables
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,
    /// Apply pending migrations before loading
    #[arg(long, default_value_t = false)]
    migrate: bool,
}

async fn read_export(cli: &Cli, config: &Config) -> anyhow::Result<Vec<u8>> {
    match (&cli.file, &cli.key) {
        (Some(path), _) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        (None, Some(key)) => {
            let storage = Storage::from_config(config)?;
            Ok(storage.get(key).await?)
        }
        (None, None) => anyhow::bail!("Either --file or --key is required"),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let tables = restore_order(&cli.tables)?;

    let raw = read_export(&cli, &config).await?;
    let export: BackupFile = serde_json::from_slice(&raw).context("Export is not valid JSON")?;
    info!(generated_at = %export.generated_at, rows = export.row_count(), "Export loaded");

    let pool = init_db(&config).await?;
    if cli.migrate {
        run_migrations(&pool).await?;
    }

    let mut failed = 0;
    for table in tables {
        let Some(rows) = export.tables.get(table) else {
            info!(table, "Not in export, skipped");
            continue;
        };
        let report = restore_table(&pool, table, rows).await;
        println!("{table}: inserted {}, failed {}", report.inserted, report.failed);
        failed += report.failed;
    }

    if failed > 0 {
        anyhow::bail!("{failed} rows could not be restored");
    }
    Ok(())
}
