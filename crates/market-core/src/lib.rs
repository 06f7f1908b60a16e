//! # Market Core
//!
//! 시장 데이터 수집 파이프라인의 핵심 도메인 모델을 제공합니다.
//!
//! - 심볼 정규화 (`Symbol`)
//! - 시세 포인트 및 파생 피처 포인트
//! - 재무제표(Fundamentals) 레코드
//! - 거래 상위 종목 스냅샷
//! - 외부 예측 서비스 레코드 (읽기 전용)

pub mod domain;
pub mod types;

pub use domain::*;
pub use types::*;
