//! 거래 상위 종목 스냅샷 수집.
//!
//! 응답 순서대로 1부터 순위를 매기며, 심볼이 없는 원소는 순위를 소비한 뒤 버립니다.
//! 스냅샷은 중복 제거 없이 누적됩니다.

use chrono::{DateTime, Utc};
use market_core::{Symbol, TopTradedRow};
use market_data::{MarketDataProvider, TopTradedStore};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

use super::{finish, json_decimal, json_string};
use crate::{CollectionStats, CollectorConfig, Result};

/// 스냅샷 행에 기록되는 제공자 라벨
pub const TOP_TRADED_PROVIDER: &str = "fmp_most_actives";

/// 거래 상위 종목 수집 한 번 실행 (에러는 로그로 남기고 삼킴).
pub async fn run<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
) -> Option<CollectionStats>
where
    S: TopTradedStore + ?Sized,
{
    finish("거래 상위 종목 수집", ingest_top_traded(store, provider, config, now).await)
}

/// 거래 상위 종목 수집.
///
/// 조회 실패는 이번 실행 전체를 중단합니다.
pub async fn ingest_top_traded<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
) -> Result<CollectionStats>
where
    S: TopTradedStore + ?Sized,
{
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    config.provider.require_api_key()?;

    let items = provider.most_actives().await?;
    let rows = map_rows(&items, now);

    stats.total = items.len();
    stats.skipped = items.len() - rows.len();

    if rows.is_empty() {
        warn!(received = items.len(), "유효한 거래 상위 종목 행이 없습니다");
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    let inserted = store.insert_top_traded(&rows).await?;
    stats.success = rows.len();
    stats.rows_inserted = inserted;

    info!(rows = inserted, as_of = %now, "거래 상위 종목 스냅샷 저장 완료");

    stats.elapsed = start.elapsed();
    Ok(stats)
}

fn map_rows(items: &[Value], as_of: DateTime<Utc>) -> Vec<TopTradedRow> {
    items
        .iter()
        .zip(1..)
        .filter_map(|(item, rank)| {
            let symbol = Symbol::parse(&json_string(item, "symbol")?)?;
            let decimal = |key: &str| item.get(key).and_then(json_decimal);

            Some(TopTradedRow {
                symbol,
                name: json_string(item, "name"),
                price: decimal("price"),
                change: decimal("change"),
                change_percentage: decimal("changesPercentage"),
                exchange: json_string(item, "exchange"),
                volume: item.get("volume").and_then(Value::as_i64),
                high: decimal("dayHigh"),
                low: decimal("dayLow"),
                provider: TOP_TRADED_PROVIDER.to_string(),
                as_of,
                rank,
                raw_payload: item.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_map_rows_ranks_in_response_order() {
        let as_of = Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap();
        let items = vec![
            json!({
                "symbol": "NVDA",
                "name": "NVIDIA Corporation",
                "price": 118.2,
                "change": -1.5,
                "changesPercentage": -1.25,
                "exchange": "NASDAQ",
                "volume": 250000000,
                "dayHigh": 120.0,
                "dayLow": 116.9
            }),
            json!({"name": "no symbol"}),
            json!({"symbol": "tsla", "price": null}),
        ];

        let rows = map_rows(&items, as_of);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].price, Some(dec!(118.2)));
        assert_eq!(rows[0].change_percentage, Some(dec!(-1.25)));
        assert_eq!(rows[0].volume, Some(250_000_000));
        assert_eq!(rows[0].high, Some(dec!(120.0)));
        assert_eq!(rows[0].provider, TOP_TRADED_PROVIDER);

        assert_eq!(rows[1].symbol.as_str(), "TSLA");
        assert_eq!(rows[1].rank, 3);
        assert_eq!(rows[1].price, None);
        assert_eq!(rows[1].as_of, as_of);
    }
}
