//! 저장소 계약 및 구현.
//!
//! 수집 단계는 아래 트레잇에만 의존합니다. 저장 엔진 자체는 이 crate의 관심사가 아니며,
//! 운영 환경에서는 PostgreSQL(`PgSession`, `PgAnalysisRepository`)을,
//! 테스트와 드라이런에서는 `InMemoryStore`를 사용합니다.
//!
//! 실행 단계용 트레잇(`QuoteStore` 등)은 `&mut self`를 받습니다.
//! 한 번의 실행 동안 하나의 연결을 점유하는 모델을 타입으로 표현하기 위함입니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use market_core::{
    FundamentalsFilter, FundamentalsRecord, PredictionRecord, QuotePoint, QuoteRow, Symbol,
    TopTradedRow,
};

use crate::Result;

pub use memory::InMemoryStore;
pub use postgres::{connect_pool, run_migrations, DatabaseConfig, PgAnalysisRepository, PgSession};

/// 시세 수집용 저장소.
#[async_trait]
pub trait QuoteStore: Send {
    /// 갱신 대상 심볼 조회.
    ///
    /// 커서가 없거나 `stale_before`보다 오래된 심볼을 커서 없는 것 먼저,
    /// 그 다음 오래된 순으로 최대 `limit`개 반환합니다.
    async fn symbols_due(&mut self, stale_before: DateTime<Utc>, limit: i64) -> Result<Vec<Symbol>>;

    /// 시세 행 일괄 삽입. 삽입된 행 수를 반환합니다.
    async fn insert_quotes(&mut self, rows: &[QuoteRow]) -> Result<u64>;

    /// 주어진 심볼들의 커서를 `checked_at`으로 전진시킵니다.
    ///
    /// 커서는 앞으로만 움직입니다. 이미 더 최신인 커서는 변경하지 않습니다.
    async fn mark_checked(&mut self, symbols: &[Symbol], checked_at: DateTime<Utc>) -> Result<u64>;
}

/// 재무제표 수집용 저장소.
#[async_trait]
pub trait FundamentalsStore: Send {
    /// `symbols` 중 조건을 만족하는 최근 재무 데이터가 이미 있는 심볼 집합.
    async fn symbols_with_recent_fundamentals(
        &mut self,
        filter: &FundamentalsFilter,
        symbols: &[Symbol],
    ) -> Result<HashSet<Symbol>>;

    /// 중복 무시(ignore-duplicate) 방식 삽입. 새로 삽입된 행 수를 반환합니다.
    ///
    /// 레코드의 심볼은 시세 추적 대상으로도 등록됩니다 (기존 커서는 유지).
    async fn upsert_fundamentals(&mut self, records: &[FundamentalsRecord]) -> Result<u64>;
}

/// 재무제표 수집 대상 심볼 원천.
///
/// 반환값은 원시 문자열이며, 최종 정규화와 중복 제거는 호출 측에서 수행합니다.
#[async_trait]
pub trait SymbolSourceStore: Send {
    /// 허용 목록 심볼 (공백 제거 + 대문자 정규화, 빈 값과 중복 제외, 오름차순, 최대 `limit`개)
    ///
    /// 빈 값이나 대소문자 중복이 `limit`을 소모하지 않도록 제한 전에 정규화합니다.
    async fn allowlisted_symbols(&mut self, limit: i64) -> Result<Vec<String>>;

    /// `since` 이후 거래 상위 스냅샷의 심볼 (최신순, 최대 `limit`행)
    async fn top_traded_symbols(&mut self, since: DateTime<Utc>, limit: i64) -> Result<Vec<String>>;
}

/// 거래 상위 종목 스냅샷 저장소.
#[async_trait]
pub trait TopTradedStore: Send {
    async fn insert_top_traded(&mut self, rows: &[TopTradedRow]) -> Result<u64>;
}

/// 분석 조회용 저장소 (요청 단위 공유).
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// 최신순 시세 최대 `limit`개
    async fn latest_quotes(&self, symbol: &Symbol, limit: i64) -> Result<Vec<QuotePoint>>;

    /// 최신순 예측 레코드 최대 `limit`개
    async fn latest_predictions(&self, symbol: &Symbol, limit: i64) -> Result<Vec<PredictionRecord>>;

    /// 저장소 연결 확인
    async fn ping(&self) -> Result<()>;
}
