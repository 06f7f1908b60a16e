//! 모든 핸들러에서 공유되는 애플리케이션 상태.

use chrono::{DateTime, Utc};
use market_data::AnalysisStore;
use std::sync::Arc;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 분석 조회 저장소
    pub store: Arc<dyn AnalysisStore>,
    /// API 버전
    pub version: String,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self {
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// 서버 업타임 (초)
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// 저장소 연결 상태 확인.
    pub async fn is_store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
