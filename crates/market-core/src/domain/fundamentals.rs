//! 재무제표(Fundamentals) 레코드.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Symbol;

/// 재무제표 원본 레코드.
///
/// `(symbol, provider, statement_type, period, as_of)` 조합은 유일하며,
/// 같은 조합의 재삽입은 아무 효과가 없습니다 (append-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    /// 종목 심볼
    pub symbol: Symbol,
    /// 데이터 제공자 라벨 (예: "fmp_income_statement")
    pub provider: String,
    /// 재무제표 종류 (예: "income_statement")
    pub statement_type: String,
    /// 보고 주기 (예: "quarter", "annual")
    pub period: String,
    /// 보고 기준일
    pub as_of: NaiveDate,
    /// 제공자 응답 원본 (불투명 JSON)
    pub raw_payload: serde_json::Value,
}

impl FundamentalsRecord {
    /// 유일성 키를 반환합니다.
    pub fn unique_key(&self) -> (&Symbol, &str, &str, &str, NaiveDate) {
        (
            &self.symbol,
            &self.provider,
            &self.statement_type,
            &self.period,
            self.as_of,
        )
    }
}

/// "최근 재무 데이터 보유" 판정 조건.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundamentalsFilter {
    /// 데이터 제공자 라벨
    pub provider: String,
    /// 재무제표 종류
    pub statement_type: String,
    /// 보고 주기
    pub period: String,
    /// 이 날짜 이상(`>=`)인 레코드만 최근 데이터로 인정
    pub recency_cutoff: NaiveDate,
}

impl FundamentalsFilter {
    /// 레코드가 조건을 만족하는지 확인합니다.
    pub fn matches(&self, record: &FundamentalsRecord) -> bool {
        record.provider == self.provider
            && record.statement_type == self.statement_type
            && record.period == self.period
            && record.as_of >= self.recency_cutoff
    }
}
