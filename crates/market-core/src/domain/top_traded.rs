//! 거래 상위 종목 스냅샷.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// 거래 상위 종목 한 행.
///
/// 스냅샷은 중복 제거 없이 누적되며, `rank`는 응답 순서대로 1부터 매겨집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTradedRow {
    pub symbol: Symbol,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub change: Option<Decimal>,
    pub change_percentage: Option<Decimal>,
    pub exchange: Option<String>,
    pub volume: Option<i64>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    /// 데이터 제공자 라벨 (예: "fmp_most_actives")
    pub provider: String,
    /// 스냅샷 시각
    pub as_of: DateTime<Utc>,
    /// 순위 (1부터 시작)
    pub rank: i32,
    /// 응답 원본 조각
    pub raw_payload: serde_json::Value,
}
