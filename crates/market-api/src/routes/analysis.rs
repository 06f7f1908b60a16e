//! Analysis API 라우트
//!
//! 저장된 최근 시세에 롤링 피처를 계산하고, 외부 예측 서비스가 기록한 예측 레코드를 함께 반환합니다.
//!
//! # 엔드포인트
//!
//! - `GET /analysis/{symbol}` - 시세/피처/예측 조회

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use market_analytics::{Feature, FeatureEngine, FeatureSet};
use market_core::{FeaturePoint, PredictionRecord, Symbol};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::state::AppState;

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 분석 조회 쿼리
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalysisQuery {
    /// 조회할 최근 시세 개수 (기본 200)
    #[serde(default = "default_points")]
    #[validate(range(min = 1, max = 5000, message = "points는 1-5000 사이여야 합니다"))]
    pub points: u32,

    /// 이동 구간 크기 (기본 20)
    #[serde(default = "default_window")]
    #[validate(range(min = 1, max = 1000, message = "window는 1-1000 사이여야 합니다"))]
    pub window: u32,

    /// 조회할 예측 레코드 개수 (기본 25)
    #[serde(default = "default_predictions")]
    #[validate(range(max = 500, message = "predictions는 0-500 사이여야 합니다"))]
    pub predictions: u32,

    /// 쉼표로 구분된 피처 목록 (ma, vol, pct_change). 생략 시 전체
    #[serde(default)]
    pub features: Option<String>,
}

fn default_points() -> u32 {
    200
}

fn default_window() -> u32 {
    20
}

fn default_predictions() -> u32 {
    25
}

impl AnalysisQuery {
    /// 요청된 피처 이름 (공백 제거, 빈 항목 제외). 없으면 전체 피처.
    pub fn feature_names(&self) -> Vec<String> {
        let names: Vec<String> = self
            .features
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            Feature::ALL.iter().map(|f| f.as_str().to_string()).collect()
        } else {
            names
        }
    }
}

/// 분석 응답
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    /// 정규화된 심볼
    pub symbol: String,
    /// 피처가 계산된 시세 (최신순)
    pub quotes: Vec<FeaturePoint>,
    /// 예측 레코드 (최신순)
    pub predictions: Vec<PredictionRecord>,
    /// 요청 정보
    pub meta: AnalysisMeta,
}

/// 분석 요청 정보
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMeta {
    pub points: u32,
    pub window: u32,
    /// 요청된 피처 이름 (알 수 없는 이름 포함, 계산에서는 무시됨)
    pub features: Vec<String>,
    pub pred_limit: u32,
}

// ================================================================================================
// Handlers
// ================================================================================================

/// GET /analysis/{symbol} - 시세 피처 및 예측 조회
#[utoipa::path(
    get,
    path = "/analysis/{symbol}",
    tag = "analysis",
    params(
        ("symbol" = String, Path, description = "티커 심볼 (대소문자 무관)"),
        AnalysisQuery
    ),
    responses(
        (status = 200, description = "조회 성공", body = AnalysisResponse),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 500, description = "서버 에러", body = ApiErrorResponse)
    )
)]
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(raw_symbol): Path<String>,
    query: Result<Query<AnalysisQuery>, QueryRejection>,
) -> ApiResult<Json<AnalysisResponse>> {
    let symbol = Symbol::parse(&raw_symbol).ok_or(ApiError::InvalidSymbol(raw_symbol))?;

    // 숫자가 아닌 파라미터도 JSON 에러 본문으로 응답
    let Query(query) = query.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    // 입력 유효성 검사
    if let Err(errors) = query.validate() {
        let message = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ApiError::Validation(message));
    }

    let feature_names = query.feature_names();
    let feature_set = FeatureSet::from_names(&feature_names);

    let quotes = state
        .store
        .latest_quotes(&symbol, i64::from(query.points))
        .await?;
    let enriched = FeatureEngine::new().compute(quotes, &feature_set, query.window as usize)?;

    let predictions = if query.predictions == 0 {
        Vec::new()
    } else {
        state
            .store
            .latest_predictions(&symbol, i64::from(query.predictions))
            .await?
    };

    debug!(
        symbol = %symbol,
        quotes = enriched.len(),
        predictions = predictions.len(),
        "분석 조회 완료"
    );

    Ok(Json(AnalysisResponse {
        symbol: symbol.into_inner(),
        quotes: enriched,
        predictions,
        meta: AnalysisMeta {
            points: query.points,
            window: query.window,
            features: feature_names,
            pred_limit: query.predictions,
        },
    }))
}

/// 분석 라우터 생성.
pub fn analysis_router() -> Router<Arc<AppState>> {
    Router::new().route("/analysis/{symbol}", get(get_analysis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(features: Option<&str>) -> AnalysisQuery {
        AnalysisQuery {
            points: default_points(),
            window: default_window(),
            predictions: default_predictions(),
            features: features.map(str::to_string),
        }
    }

    #[test]
    fn test_feature_names_default_to_all() {
        assert_eq!(query(None).feature_names(), vec!["ma", "vol", "pct_change"]);
        assert_eq!(query(Some(" , ")).feature_names(), vec!["ma", "vol", "pct_change"]);
    }

    #[test]
    fn test_feature_names_keep_requested_order() {
        assert_eq!(
            query(Some("pct_change, ma,foo")).feature_names(),
            vec!["pct_change", "ma", "foo"]
        );
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let mut q = query(None);
        assert!(q.validate().is_ok());

        q.window = 0;
        assert!(q.validate().is_err());
    }

    #[test]
    fn test_meta_serializes_pred_limit_in_camel_case() {
        let meta = AnalysisMeta {
            points: 200,
            window: 20,
            features: vec!["ma".into()],
            pred_limit: 25,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["predLimit"], 25);
        assert!(json.get("pred_limit").is_none());
    }
}
