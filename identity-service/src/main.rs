use std::net::SocketAddr;
use std::sync::Arc;

use identity_service::{
    build_router,
    config::IdentityConfig,
    services::{Database, EmailService, JwtService, RedisService},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Configuration first; a bad environment should kill the process before
    // anything opens a connection.
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let state = bootstrap(config).await?;
    let port = state.config.common.port;

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Open the backing connections and wire the application state.
async fn bootstrap(config: IdentityConfig) -> Result<AppState, AppError> {
    let pool = identity_service::db::create_pool(&config.database).await?;
    identity_service::db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;
    let db = Database::new(pool);

    let redis = Arc::new(RedisService::new(&config.redis).await?);
    let email = Arc::new(EmailService::new(&config.smtp)?);
    let jwt = JwtService::new(&config.jwt)?;

    tracing::info!("Backing services initialized");

    Ok(AppState::new(config, db, email, jwt, redis))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
