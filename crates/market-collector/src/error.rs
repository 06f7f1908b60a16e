//! 에러 타입 정의.

use market_data::{DataError, ProviderError};
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러 (자격 증명, 엔드포인트 누락 등)
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터 제공자 에러
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 저장소 에러
    #[error("Persistence error: {0}")]
    Persistence(#[from] DataError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
