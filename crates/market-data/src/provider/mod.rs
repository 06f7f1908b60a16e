//! 외부 시장 데이터 제공자.
//!
//! 수집 파이프라인은 `MarketDataProvider` 트레잇에만 의존하며,
//! 운영 환경에서는 `FmpClient`가 이를 구현합니다.

pub mod fmp;

use async_trait::async_trait;
use market_core::Symbol;
use serde_json::Value;

pub use fmp::{FmpClient, FmpConfig, ProviderError};

/// 시장 데이터 제공자 트레잇.
///
/// 모든 메서드는 응답 JSON 배열의 원소를 가공 없이 반환합니다.
/// 원소 단위 검증은 호출 측(수집 모듈)의 책임입니다.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 여러 심볼의 현재 시세를 한 번의 요청으로 조회합니다.
    async fn batch_quote(&self, symbols: &[Symbol]) -> Result<Vec<Value>, ProviderError>;

    /// 단일 심볼의 재무제표 행 목록을 조회합니다.
    ///
    /// `statement_type`은 "income_statement" 형식이며 엔드포인트 경로로 변환됩니다.
    async fn statements(
        &self,
        symbol: &Symbol,
        statement_type: &str,
        period: &str,
    ) -> Result<Vec<Value>, ProviderError>;

    /// 거래 상위 종목 목록을 조회합니다.
    async fn most_actives(&self) -> Result<Vec<Value>, ProviderError>;
}
