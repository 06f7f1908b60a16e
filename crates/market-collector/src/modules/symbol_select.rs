//! 갱신 대상 심볼 선택.

use chrono::{DateTime, Duration, Utc};
use market_core::Symbol;
use market_data::QuoteStore;

use crate::error::CollectorError;
use crate::Result;

/// 커서가 없거나 `now - refresh_interval`보다 오래된 심볼을 고릅니다.
///
/// 커서 없는 심볼이 먼저, 그 다음 오래된 순이며 최대 `max_count`개입니다.
/// 기준 시각은 항상 주입된 `now`를 사용합니다.
pub async fn select_due<S>(
    store: &mut S,
    now: DateTime<Utc>,
    refresh_interval: Duration,
    max_count: usize,
) -> Result<Vec<Symbol>>
where
    S: QuoteStore + ?Sized,
{
    if max_count == 0 {
        return Ok(Vec::new());
    }

    let stale_before = now.checked_sub_signed(refresh_interval).ok_or_else(|| {
        CollectorError::Config(format!("잘못된 갱신 간격: {}", refresh_interval))
    })?;
    let limit = i64::try_from(max_count).unwrap_or(i64::MAX);
    let symbols = store.symbols_due(stale_before, limit).await?;

    tracing::debug!(
        stale_before = %stale_before,
        due = symbols.len(),
        "갱신 대상 심볼 조회 완료"
    );

    Ok(symbols)
}
