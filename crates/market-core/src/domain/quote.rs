//! 시세 데이터 타입.
//!
//! - `QuoteRow` - 저장소에 기록되는 원시 시세 행
//! - `QuotePoint` - 분석 조회 시 읽어오는 (시각, 가격) 쌍
//! - `FeaturePoint` - 롤링 피처가 덧붙은 시세 포인트 (저장하지 않음)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// 저장용 시세 행.
///
/// `raw_payload`에는 배치 응답 전체가 아닌 해당 종목의 JSON 조각만 담습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    /// 종목 심볼
    pub symbol: Symbol,
    /// 데이터 제공자 라벨 (예: "fmp_batch_quote")
    pub provider: String,
    /// 수집 실행 시각
    pub as_of: DateTime<Utc>,
    /// 가격
    pub price: Decimal,
    /// 응답 원본 조각
    pub raw_payload: serde_json::Value,
}

/// 시계열 시세 포인트.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct QuotePoint {
    /// 시세 시각 (UTC)
    pub as_of_utc: DateTime<Utc>,
    /// 가격
    pub price: Decimal,
}

impl QuotePoint {
    pub fn new(as_of_utc: DateTime<Utc>, price: Decimal) -> Self {
        Self { as_of_utc, price }
    }
}

/// 피처가 계산된 시세 포인트.
///
/// 각 피처는 충분한 과거 데이터가 있을 때만 값을 가지며, 그렇지 않으면 `None`(JSON `null`)입니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct FeaturePoint {
    /// 시세 시각 (UTC)
    pub as_of_utc: DateTime<Utc>,
    /// 가격
    pub price: Decimal,
    /// 단순 이동평균
    pub sma: Option<f64>,
    /// 직전 포인트 대비 변화율
    pub pct_change: Option<f64>,
    /// 모표준편차 기반 변동성
    pub volatility: Option<f64>,
}

impl From<QuotePoint> for FeaturePoint {
    fn from(point: QuotePoint) -> Self {
        Self {
            as_of_utc: point.as_of_utc,
            price: point.price,
            sma: None,
            pct_change: None,
            volatility: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_feature_point_serializes_absent_as_null() {
        let point = QuotePoint::new(Utc.with_ymd_and_hms(2025, 3, 3, 15, 0, 0).unwrap(), dec!(10.5));
        let json = serde_json::to_value(FeaturePoint::from(point)).unwrap();

        assert!(json["sma"].is_null());
        assert!(json["pct_change"].is_null());
        assert!(json["volatility"].is_null());
        assert_eq!(json["as_of_utc"], "2025-03-03T15:00:00Z");
    }
}
