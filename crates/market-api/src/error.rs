//! API 에러 응답 타입.
//!
//! 모든 엔드포인트는 아래 형식의 JSON 에러 본문을 반환합니다.
//!
//! ```json
//! {
//!   "code": "INVALID_SYMBOL",
//!   "message": "심볼이 비어 있습니다",
//!   "timestamp": 1738300800
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use market_analytics::FeatureError;
use market_data::DataError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// API 에러 응답 본문.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "DB_ERROR", "VALIDATION_ERROR")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 기본 에러 생성 (타임스탬프 포함).
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }
}

/// 핸들러 에러.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 심볼 형식 오류
    #[error("잘못된 심볼: {0:?}")]
    InvalidSymbol(String),

    /// 쿼리 파라미터 검증 실패
    #[error("{0}")]
    Validation(String),

    /// 피처 계산 파라미터 오류
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] DataError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSymbol(_) | Self::Validation(_) | Self::Feature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSymbol(_) => "INVALID_SYMBOL",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Feature(_) => "INVALID_PARAMETER",
            Self::Store(_) => "DB_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "요청 처리 실패");
        }

        // 저장소 내부 메시지는 응답에 노출하지 않는다
        let message = match &self {
            Self::Store(_) => "데이터 조회 중 오류가 발생했습니다".to_string(),
            other => other.to_string(),
        };

        (status, Json(ApiErrorResponse::new(self.code(), message))).into_response()
    }
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());

        let json = serde_json::to_string(&error).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::InvalidSymbol(" ".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Feature(FeatureError::InvalidParameter("window".into())).code(),
            "INVALID_PARAMETER"
        );
        assert_eq!(
            ApiError::Store(DataError::PoolExhausted).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
