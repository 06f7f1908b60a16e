//! Market API 서버.
//!
//! 환경변수:
//! - `DATABASE_URL` (필수), `DATABASE_PASSWORD`
//! - `API_HOST` (기본 0.0.0.0), `API_PORT` (기본 3000)
//! - `CORS_ORIGINS` (쉼표 구분, 미설정 시 모든 origin 허용)

use anyhow::Context;
use axum::http::StatusCode;
use axum::Router;
use market_api::{app_router, AppState};
use market_data::{connect_pool, DatabaseConfig, PgAnalysisRepository};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_api=info,market_data=info,tower_http=debug".into()),
        )
        .init();

    info!("Starting Market API server...");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL 환경변수가 설정되지 않았습니다")?;
    let password = std::env::var("DATABASE_PASSWORD")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from);
    let pool = connect_pool(&DatabaseConfig::new(database_url, password)).await?;

    let state = Arc::new(AppState::new(Arc::new(PgAnalysisRepository::new(pool.clone()))));
    info!(version = %state.version, "Application state initialized");

    let addr = socket_addr()?;
    let app = with_middleware(app_router(state));

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Server shutdown complete");

    Ok(())
}

fn socket_addr() -> anyhow::Result<SocketAddr> {
    let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("API_PORT").unwrap_or_else(|_| "3000".to_string());
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("잘못된 소켓 주소: {}:{}. API_HOST, API_PORT를 확인하세요", host, port))
}

fn with_middleware(router: Router) -> Router {
    router
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C 핸들러 설치 실패");
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
                warn!(error = %e, "SIGTERM 핸들러 설치 실패");
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
