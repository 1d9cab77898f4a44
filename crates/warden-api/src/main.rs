//! 인증/인가 API 서버.
//!
//! 설정을 읽고 저장소를 연결한 뒤 Axum 서버를 시작합니다.
//! `DATABASE_URL`이 없으면 메모리 저장소로 동작합니다.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method, StatusCode};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use warden_api::repository::run_migrations;
use warden_api::{create_router, AppState, Stores};
use warden_core::{init_logging, AppConfig, LogConfig, ServerConfig, SystemClock};

/// 저장소 연결.
///
/// 데이터베이스 URL이 설정되어 있으면 PostgreSQL, 아니면 메모리 저장소를 사용합니다.
async fn connect_stores(config: &AppConfig) -> anyhow::Result<(Stores, Option<sqlx::PgPool>)> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
        return Ok((Stores::memory(&config.roles), None));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .connect(url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to PostgreSQL");

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    let stores = Stores::postgres(pool.clone(), &config.roles)
        .await
        .context("Failed to seed configured roles")?;

    Ok((stores, Some(pool)))
}

/// 설정된 origin만 허용하는 CORS 레이어. 목록이 비어 있으면 모두 허용합니다.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env는 선택 사항
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("Failed to load configuration")?;

    init_logging(LogConfig::from(&config.logging).overridden_by_env())?;

    info!("Starting Warden API server...");

    let addr = config.server.socket_addr()?;
    let (stores, pool) = connect_stores(&config).await?;

    let mut state = AppState::new(&config, stores, Arc::new(SystemClock))?;
    if let Some(pool) = pool {
        state = state.with_db_pool(pool);
    }
    let state = Arc::new(state);

    info!(
        version = %state.version,
        storage = state.storage_backend,
        api_base = %state.api_base,
        "Application state initialized"
    );

    let app = create_router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.server.request_timeout(),
        ))
        .layer(cors_layer(&config.server));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM 대기. 진행 중인 요청은 마저 처리됩니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
