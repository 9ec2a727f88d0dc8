use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use overtone_core::config::OvertoneConfig;
use overtone_core::crypto::{AesGcmProtector, SecretProtector};
use overtone_core::db::sqlite::SqliteRepository;
use overtone_core::db::DatabasePool;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

/// Run the `serve` command: start the API server.
pub async fn run(config_path: &str, port: u16) -> anyhow::Result<()> {
    let config = OvertoneConfig::load(Path::new(config_path))?;
    config.validate()?;

    let db_path = config
        .overtone
        .database
        .path
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("SQLite path not configured"))?;
    let connect_str = format!("sqlite:{}?mode=rwc", db_path);
    let pool = DatabasePool::new_sqlite(&connect_str).await?;
    let repo = match pool {
        DatabasePool::Sqlite(p) => SqliteRepository::new(p),
    };
    let repo = Arc::new(repo);

    let protector: Arc<dyn SecretProtector> =
        Arc::new(AesGcmProtector::from_key_file(&config.key_file_path())?);

    let cors = CorsLayer::new()
        .allow_origin(config.overtone.frontend_url.parse::<HeaderValue>()?)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let state = Arc::new(overtone_server::AppState::new(config, repo, protector));
    let app = overtone_server::router(state)
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    println!("Overtone API listening on http://{}", addr);
    info!("Starting server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
