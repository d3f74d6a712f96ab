use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use erp_backend::{
    backup::BackupJob,
    config::Config,
    db::{init_db, run_migrations},
    docs::ApiDoc,
    routes,
    storage::Storage,
    utils::username_cache,
};
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "erp.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false),
        )
        .with(config.log_stdout.then(|| fmt::layer().with_target(false)))
        .init();

    info!(addr = %config.server_addr, "Server starting");

    let pool = init_db(&config).await?;
    if config.run_migrations {
        run_migrations(&pool).await?;
        info!("Migrations applied");
    }

    let storage = Storage::from_config(&config).context("Failed to configure object storage")?;
    info!(backend = storage.backend_name(), "Object storage ready");

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = username_cache::warmup(&pool_for_warmup, 500).await {
            error!(error = ?e, "Failed to warm up username cache");
        }
    });

    let backup_job = BackupJob::new(pool.clone(), storage.clone(), config.backup_prefix.clone());
    match config.backup_interval() {
        Some(every) => backup_job.clone().spawn_scheduler(every),
        None => info!("Periodic backup disabled"),
    }

    let server_addr = config.server_addr.clone();
    let openapi = ApiDoc::openapi();

    HttpServer::new(move || {
        let config_data = config.clone();
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(storage.clone()))
            .app_data(Data::new(backup_job.clone()))
            .configure(move |cfg| routes::configure(cfg, config_data))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
