//! 수집 단계 실행기.
//!
//! 각 실행마다 풀에서 연결 하나를 빌려(`PgSession`) 단계가 끝날 때까지 점유합니다.
//! 세션은 drop 시점에 풀로 반환됩니다.

use chrono::{DateTime, Utc};
use market_core::Symbol;
use market_data::{MarketDataProvider, PgSession};
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::FundamentalsSource;
use crate::modules::{fundamental_sync, quote_ingest, top_traded};
use crate::{CollectionStats, CollectorConfig};

/// 프로세스 수명 동안 공유되는 수집 실행기.
pub struct Pipeline {
    pool: PgPool,
    provider: Arc<dyn MarketDataProvider>,
    config: CollectorConfig,
}

impl Pipeline {
    pub fn new(pool: PgPool, provider: Arc<dyn MarketDataProvider>, config: CollectorConfig) -> Self {
        Self {
            pool,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// 시세 수집 (`symbols`가 없으면 갱신 대상 자동 선택)
    pub async fn collect_quotes(
        &self,
        now: DateTime<Utc>,
        symbols: Option<Vec<Symbol>>,
    ) -> Option<CollectionStats> {
        let mut session = self.session("시세 수집").await?;
        quote_ingest::run(&mut session, self.provider.as_ref(), &self.config, now, symbols).await
    }

    /// 재무제표 동기화 (`source`가 없으면 설정값 사용)
    pub async fn sync_fundamentals(
        &self,
        now: DateTime<Utc>,
        source: Option<FundamentalsSource>,
    ) -> Option<CollectionStats> {
        let source = source.unwrap_or(self.config.fundamentals.source);
        let mut session = self.session("재무제표 동기화").await?;
        fundamental_sync::run(&mut session, self.provider.as_ref(), &self.config, now, source).await
    }

    /// 거래 상위 종목 스냅샷 수집
    pub async fn ingest_top_traded(&self, now: DateTime<Utc>) -> Option<CollectionStats> {
        let mut session = self.session("거래 상위 종목 수집").await?;
        top_traded::run(&mut session, self.provider.as_ref(), &self.config, now).await
    }

    async fn session(&self, operation: &str) -> Option<PgSession> {
        match PgSession::acquire(&self.pool).await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(operation = operation, error = %e, "데이터베이스 연결 획득 실패");
                None
            }
        }
    }
}
