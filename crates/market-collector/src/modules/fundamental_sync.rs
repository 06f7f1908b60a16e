//! 재무제표 동기화 모듈.
//!
//! ## 대상 심볼 원천
//! - 허용 목록: `fundamentals_allowlist` (심볼 오름차순)
//! - 거래 상위: 최근 `window_hours` 이내 스냅샷 (최신순)
//!
//! 원천 심볼 중 같은 (제공자, 재무제표 종류, 보고 주기)로 기준일이
//! `recency_cutoff` 이상인 레코드가 이미 있는 심볼은 건너뜁니다.
//! 나머지는 심볼 단위로 순차 조회 후 중복 무시 방식으로 저장합니다.
//! 심볼 하나의 실패는 다른 심볼에 영향을 주지 않으며, 다음 실행에서 다시 대상이 됩니다.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use market_core::{dedup_symbols, FundamentalsFilter, FundamentalsRecord, Symbol};
use market_data::{FundamentalsStore, MarketDataProvider, SymbolSourceStore};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{finish, json_string};
use crate::config::{FundamentalsConfig, FundamentalsSource, TopTradedConfig};
use crate::{CollectionStats, CollectorConfig, CollectorError, Result};

/// 재무제표 동기화 한 번 실행 (에러는 로그로 남기고 삼킴).
pub async fn run<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
    source: FundamentalsSource,
) -> Option<CollectionStats>
where
    S: FundamentalsStore + SymbolSourceStore + ?Sized,
{
    let operation = match source {
        FundamentalsSource::Allowlist => "재무제표 동기화 (허용 목록)",
        FundamentalsSource::TopTraded => "재무제표 동기화 (거래 상위)",
    };
    finish(operation, sync_fundamentals(store, provider, config, now, source).await)
}

/// 원천에서 대상 심볼 목록을 만듭니다 (정규화, 중복 제거, 최대 `max_per_run`개).
pub async fn resolve_source_symbols<S>(
    store: &mut S,
    source: FundamentalsSource,
    fundamentals: &FundamentalsConfig,
    top_traded: &TopTradedConfig,
    now: DateTime<Utc>,
) -> Result<Vec<Symbol>>
where
    S: SymbolSourceStore + ?Sized,
{
    let raw = match source {
        FundamentalsSource::Allowlist => {
            store
                .allowlisted_symbols(to_limit(fundamentals.max_per_run))
                .await?
        }
        FundamentalsSource::TopTraded => {
            let since = now.checked_sub_signed(top_traded.window()?).ok_or_else(|| {
                CollectorError::Config(format!(
                    "잘못된 스냅샷 범위: {}시간",
                    top_traded.window_hours
                ))
            })?;
            store
                .top_traded_symbols(since, to_limit(top_traded.scan_limit))
                .await?
        }
    };

    let mut symbols = dedup_symbols(raw);
    symbols.truncate(fundamentals.max_per_run);
    Ok(symbols)
}

/// 재무제표 동기화.
pub async fn sync_fundamentals<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
    source: FundamentalsSource,
) -> Result<CollectionStats>
where
    S: FundamentalsStore + SymbolSourceStore + ?Sized,
{
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    let settings = &config.fundamentals;

    config.provider.require_api_key()?;

    let symbols =
        resolve_source_symbols(store, source, settings, &config.top_traded, now).await?;

    if symbols.is_empty() {
        info!(source = %source, "재무제표 대상 심볼이 없습니다");
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    let filter = FundamentalsFilter {
        provider: settings.provider.clone(),
        statement_type: settings.statement_type.clone(),
        period: settings.period.clone(),
        recency_cutoff: recency_cutoff(now, settings.recency_days)?,
    };

    let existing = store
        .symbols_with_recent_fundamentals(&filter, &symbols)
        .await?;
    let to_fetch = missing_symbols(&symbols, &existing);

    stats.skipped = symbols.len() - to_fetch.len();

    info!(
        source = %source,
        candidates = symbols.len(),
        to_fetch = to_fetch.len(),
        cutoff = %filter.recency_cutoff,
        "재무제표 동기화 시작"
    );

    for symbol in &to_fetch {
        stats.total += 1;

        let items = match provider
            .statements(symbol, &settings.statement_type, &settings.period)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                stats.errors += 1;
                warn!(symbol = %symbol, error = %e, "재무제표 조회 실패");
                continue;
            }
        };

        let records = parse_statements(symbol, &items, settings);
        if records.is_empty() {
            stats.skipped += 1;
            debug!(symbol = %symbol, rows = items.len(), "저장할 재무제표 행 없음");
            continue;
        }

        match store.upsert_fundamentals(&records).await {
            Ok(inserted) => {
                stats.success += 1;
                stats.rows_inserted += inserted;
                info!(symbol = %symbol, rows = records.len(), inserted = inserted, "재무제표 저장 완료");
            }
            Err(e) => {
                stats.errors += 1;
                warn!(symbol = %symbol, error = %e, "재무제표 저장 실패");
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// 원천 순서를 유지한 채 이미 최신 데이터가 있는 심볼을 제외합니다.
fn missing_symbols(symbols: &[Symbol], existing: &HashSet<Symbol>) -> Vec<Symbol> {
    symbols
        .iter()
        .filter(|s| !existing.contains(*s))
        .cloned()
        .collect()
}

/// 실행일 기준 최신 판정 기준일
fn recency_cutoff(now: DateTime<Utc>, days: i64) -> Result<NaiveDate> {
    Duration::try_days(days)
        .and_then(|recency| now.date_naive().checked_sub_signed(recency))
        .ok_or_else(|| CollectorError::Config(format!("잘못된 최신 기준 일수: {}", days)))
}

/// 응답 행을 레코드로 변환합니다. `date`(YYYY-MM-DD)가 없는 행은 버립니다.
fn parse_statements(
    symbol: &Symbol,
    items: &[Value],
    settings: &FundamentalsConfig,
) -> Vec<FundamentalsRecord> {
    items
        .iter()
        .filter_map(|item| {
            let as_of = NaiveDate::parse_from_str(&json_string(item, "date")?, "%Y-%m-%d").ok()?;
            Some(FundamentalsRecord {
                symbol: symbol.clone(),
                provider: settings.provider.clone(),
                statement_type: settings.statement_type.clone(),
                period: settings.period.clone(),
                as_of,
                raw_payload: item.clone(),
            })
        })
        .collect()
}

fn to_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use market_core::TopTradedRow;
    use market_data::{InMemoryStore, TopTradedStore};
    use serde_json::json;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
    }

    fn top_row(symbol: &str, as_of: DateTime<Utc>, rank: i32) -> TopTradedRow {
        TopTradedRow {
            symbol: sym(symbol),
            name: None,
            price: None,
            change: None,
            change_percentage: None,
            exchange: None,
            volume: None,
            high: None,
            low: None,
            provider: "fmp_most_actives".into(),
            as_of,
            rank,
            raw_payload: json!({}),
        }
    }

    #[test]
    fn test_recency_cutoff_is_date_based() {
        assert_eq!(
            recency_cutoff(now(), 120).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 2).unwrap()
        );
        assert!(matches!(
            recency_cutoff(now(), i64::MAX),
            Err(CollectorError::Config(_))
        ));
    }

    #[test]
    fn test_parse_statements_drops_rows_without_date() {
        let items = vec![
            json!({"date": "2025-03-29", "revenue": 1}),
            json!({"date": "03/29/2025"}),
            json!({"date": null}),
            json!({"revenue": 2}),
        ];
        let records = parse_statements(&sym("AAPL"), &items, &FundamentalsConfig::default());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_of, NaiveDate::from_ymd_opt(2025, 3, 29).unwrap());
        assert_eq!(records[0].statement_type, "income_statement");
        assert_eq!(records[0].raw_payload, items[0]);
    }

    #[tokio::test]
    async fn test_allowlist_source_dedups_and_caps() {
        let mut store = InMemoryStore::new();
        for raw in ["NVDA", "aapl", "MSFT", "AAPL", " "] {
            store.allow(raw);
        }

        let all = resolve_source_symbols(
            &mut store,
            FundamentalsSource::Allowlist,
            &FundamentalsConfig::default(),
            &TopTradedConfig::default(),
            now(),
        )
        .await
        .unwrap();
        assert_eq!(all, vec![sym("AAPL"), sym("MSFT"), sym("NVDA")]);

        let capped = FundamentalsConfig {
            max_per_run: 2,
            ..FundamentalsConfig::default()
        };
        let symbols = resolve_source_symbols(
            &mut store,
            FundamentalsSource::Allowlist,
            &capped,
            &TopTradedConfig::default(),
            now(),
        )
        .await
        .unwrap();
        // 빈 값과 대소문자 중복은 상한을 소모하지 않는다
        assert_eq!(symbols, vec![sym("AAPL"), sym("MSFT")]);
    }

    #[tokio::test]
    async fn test_top_traded_source_uses_window_and_recency_order() {
        let mut store = InMemoryStore::new();
        store
            .insert_top_traded(&[
                top_row("OLD", now() - Duration::hours(4), 1),
                top_row("AMD", now() - Duration::hours(2), 2),
                top_row("TSLA", now() - Duration::hours(2), 1),
                top_row("AMD", now() - Duration::minutes(10), 1),
            ])
            .await
            .unwrap();

        let symbols = resolve_source_symbols(
            &mut store,
            FundamentalsSource::TopTraded,
            &FundamentalsConfig::default(),
            &TopTradedConfig::default(),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(symbols, vec![sym("AMD"), sym("TSLA")]);
    }

    #[test]
    fn test_missing_symbols_preserves_order() {
        let symbols = vec![sym("C"), sym("A"), sym("B")];
        let existing: HashSet<Symbol> = [sym("A")].into_iter().collect();
        assert_eq!(missing_symbols(&symbols, &existing), vec![sym("C"), sym("B")]);
    }
}
