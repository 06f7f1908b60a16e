//! API 라우트 모듈.

pub mod analysis;
pub mod health;

pub use analysis::{analysis_router, AnalysisMeta, AnalysisQuery, AnalysisResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
