mod app;
mod config;
mod error;
mod mailer;
mod routes;
mod storage;
#[cfg(test)]
mod testing;

use app::AppState;
use config::AppConfig;
use mailer::Mailer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "awarenow_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("data directory: {}", config.data_dir.display());

    // Initialize database
    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    routes::auth::bootstrap_platform_admin(&db, &config)?;

    let mailer = Mailer::from_config(&config)?;
    let port = config.port;
    let base_url = config.base_url.clone();

    let app = app::router(AppState { db, config, mailer });

    tracing::info!("starting server at {base_url}");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
