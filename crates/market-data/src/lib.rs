//! 데이터 제공자 연동 및 저장소 계약.
//!
//! 이 crate는 다음을 제공합니다:
//! - Financial Modeling Prep(FMP) HTTP 클라이언트
//! - 수집 파이프라인이 사용하는 저장소 트레잇
//! - PostgreSQL 구현 (실행 단위 연결 세션, 분석 조회 저장소)
//! - 테스트 및 드라이런용 인메모리 구현

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{FmpClient, FmpConfig, MarketDataProvider, ProviderError};
pub use storage::{
    connect_pool, run_migrations, AnalysisStore, DatabaseConfig, FundamentalsStore,
    InMemoryStore, PgAnalysisRepository, PgSession, QuoteStore, SymbolSourceStore, TopTradedStore,
};
