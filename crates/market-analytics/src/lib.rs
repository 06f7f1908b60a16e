//! 시세 시계열 분석.
//!
//! 저장된 시세 위에서 분석 조회 시점에 롤링 피처를 계산합니다.
//! 계산 결과는 저장하지 않습니다.

pub mod features;

pub use features::{Feature, FeatureEngine, FeatureError, FeatureSet};
