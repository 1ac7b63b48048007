use std::sync::Arc;

use anyhow::Context;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use talhub::{
    auth::jwt::JwtService, config::AppConfig, db, routes, s3::build_client, state::AppState,
    storage::S3Storage,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        "loaded talhub configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool).await?;

    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let jwt = JwtService::from_config(&config)?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, storage, jwt);
    let app = routes::create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "talhub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn run_migrations(pool: &db::PgPool) -> anyhow::Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = pool.get().context("failed to acquire connection")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
