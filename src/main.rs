use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use std::{io::ErrorKind, sync::Arc};
use student_service::{
    config::AppConfig,
    routes::routes,
    services::student_service::StudentService,
    stores::{
        StudentRepository,
        mysql::MySqlStudentRepository,
        redis_cache::RedisSnapshotCache,
        s3::{S3PhotoStore, S3Settings},
    },
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting student-service with config: {:?}", cfg);

    // --- Initialize MySQL connection ---
    let connect_options = MySqlConnectOptions::new()
        .host(&cfg.db_host)
        .port(cfg.db_port)
        .username(&cfg.db_user)
        .password(&cfg.db_pass)
        .database(&cfg.db_name)
        .charset("utf8mb4");
    let db = Arc::new(
        MySqlPoolOptions::new()
            .max_connections(10)
            .connect_with(connect_options)
            .await
            .with_context(|| {
                format!(
                    "connecting to database {} at {}:{}",
                    cfg.db_name, cfg.db_host, cfg.db_port
                )
            })?,
    );
    tracing::info!("Connected to database {}", cfg.db_name);

    let repo = MySqlStudentRepository::new(db.clone());
    repo.ensure_schema()
        .await
        .context("creating students table")?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize cache + object store ---
    let cache = RedisSnapshotCache::connect(&cfg.redis_addr, cfg.redis_tls)
        .await
        .with_context(|| format!("connecting to cache at {}", cfg.redis_addr))?;
    tracing::info!(tls = cfg.redis_tls, "Connected to cache at {}", cfg.redis_addr);

    let photos = S3PhotoStore::connect(S3Settings {
        region: cfg.aws_region.clone(),
        access_key: cfg.aws_access_key.clone(),
        secret_key: cfg.aws_secret_key.clone(),
        bucket: cfg.aws_bucket_name.clone(),
        domain: cfg.object_store_domain.clone(),
    })
    .await;
    tracing::info!(
        "Photo uploads go to bucket {} in {}",
        cfg.aws_bucket_name,
        cfg.aws_region
    );

    // --- Initialize core service ---
    let service = StudentService::new(
        Arc::new(repo),
        Arc::new(cache),
        Arc::new(photos),
        cfg.store_timeout,
    );

    // --- Build router ---
    let app = routes::app(service, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
