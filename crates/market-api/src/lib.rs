//! Analysis API over persisted market data.
//!
//! - `GET /analysis/{symbol}` - 최근 시세 + 롤링 피처 + 예측 레코드
//! - `GET /health`, `GET /health/ready` - 헬스 체크
//! - `/swagger-ui`, `/api-docs/openapi.json` - API 문서

pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::Router;
use std::sync::Arc;

pub use error::{ApiError, ApiErrorResponse};
pub use state::AppState;

/// 미들웨어를 제외한 전체 라우터.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::analysis_router())
        .nest("/health", routes::health_router())
        .with_state(state)
        .merge(openapi::swagger_ui_router())
}
