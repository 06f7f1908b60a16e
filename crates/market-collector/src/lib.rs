//! Scheduled ingestion stages for the market pipeline.
//!
//! 이 crate는 API 서버와 독립적으로 데이터를 수집하는 바이너리를 제공합니다:
//! - 시세 수집 (장중, 오래된 심볼부터 배치 단위)
//! - 재무제표 동기화 (허용 목록 또는 거래 상위 종목)
//! - 거래 상위 종목 스냅샷 수집
//!
//! 각 단계는 `run(now)` 형태의 진입점을 가지며 스스로 스케줄링하지 않습니다.
//! 주기 실행은 바이너리의 데몬 모드가 담당합니다.

pub mod config;
pub mod error;
pub mod modules;
pub mod pipeline;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use pipeline::Pipeline;
pub use stats::CollectionStats;
