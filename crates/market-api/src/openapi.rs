//! OpenAPI 문서화 설정.
//!
//! Swagger UI는 `/swagger-ui`, JSON 스펙은 `/api-docs/openapi.json` 경로에서 제공됩니다.

use axum::Router;
use market_core::{FeaturePoint, PredictionRecord};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    AnalysisMeta, AnalysisResponse, ComponentHealth, ComponentStatus, HealthResponse,
};

/// Market API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Market Pipeline API",
        description = "수집된 시세에 롤링 피처(이동평균, 변동성, 변화율)를 계산하고 예측 레코드를 함께 조회합니다.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "analysis", description = "분석 - 시세 피처 및 예측 조회")
    ),
    components(
        schemas(
            HealthResponse,
            ComponentHealth,
            ComponentStatus,
            ApiErrorResponse,
            AnalysisResponse,
            AnalysisMeta,
            FeaturePoint,
            PredictionRecord,
        )
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::health::health_ready,
        crate::routes::analysis::get_analysis,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
