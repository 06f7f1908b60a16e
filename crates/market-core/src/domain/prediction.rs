//! 외부 예측 서비스가 기록한 예측 레코드 (읽기 전용).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 예측 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct PredictionRecord {
    pub id: i64,
    pub symbol: Option<String>,
    pub model_name: Option<String>,
    /// 예측 기간 (년)
    pub horizon_years: i32,
    /// 기대 수익률
    pub expected_return: Option<Decimal>,
    /// 신뢰도
    pub confidence: Option<Decimal>,
    /// 예측 기준 시각
    pub as_of_utc: DateTime<Utc>,
    pub input_snapshot_id: Option<i64>,
    /// 모델별 부가 정보
    #[cfg_attr(feature = "utoipa-support", schema(value_type = Option<Object>))]
    pub extra_meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
