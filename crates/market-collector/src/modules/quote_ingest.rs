//! 시세 수집 모듈.
//!
//! ## 흐름
//! 장 운영 시간 게이트 → 갱신 대상 심볼 선택 → 배치 조회 → 시세 저장 및 커서 전진
//!
//! ## 실패 격리
//! - 배치 조회 실패(HTTP 오류, 전송 실패, 빈/비배열 응답)는 로그 후 건너뜁니다.
//!   해당 배치 심볼의 커서는 움직이지 않으므로 다음 실행에서 다시 선택됩니다.
//! - 배치 조회가 성공하면 응답 원소 파싱 결과와 무관하게 시도한 모든 심볼을 확인 처리합니다.
//! - 저장소 에러는 실행 단위로 전파되어 `run`에서 로그로 남습니다.

use chrono::{DateTime, Utc};
use market_core::{QuoteRow, Symbol};
use market_data::{MarketDataProvider, QuoteStore};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::market_hours::MarketHoursGate;
use super::symbol_select::select_due;
use super::{finish, json_decimal, json_string};
use crate::{CollectionStats, CollectorConfig, Result};

/// 시세 행에 기록되는 제공자 라벨
pub const QUOTE_PROVIDER: &str = "fmp_batch_quote";

/// 배치 하나의 처리 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 응답을 받아 저장과 커서 전진까지 완료
    Written { inserted: u64, attempted: usize },
    /// 빈 응답 (커서 전진 없음)
    Empty { attempted: usize },
    /// 조회 실패 (커서 전진 없음)
    Failed { attempted: usize, error: String },
}

/// 배치 조회 전체 결과.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRunReport {
    /// 전체 삽입 행 수
    pub inserted: u64,
    /// 배치별 결과 (처리 순서)
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchRunReport {
    /// 커서가 전진한 심볼 수
    pub fn symbols_marked(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o {
                BatchOutcome::Written { attempted, .. } => *attempted as u64,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&BatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// 시세 수집 한 번 실행 (에러는 로그로 남기고 삼킴).
///
/// `symbols`가 주어지면 대상 선택을 건너뛰고 해당 심볼만 수집합니다.
pub async fn run<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
    symbols: Option<Vec<Symbol>>,
) -> Option<CollectionStats>
where
    S: QuoteStore + ?Sized,
{
    finish("시세 수집", collect_quotes(store, provider, config, now, symbols).await)
}

/// 시세 수집.
pub async fn collect_quotes<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    config: &CollectorConfig,
    now: DateTime<Utc>,
    symbols: Option<Vec<Symbol>>,
) -> Result<CollectionStats>
where
    S: QuoteStore + ?Sized,
{
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    if !MarketHoursGate::new(&config.market_hours).allows(now) {
        info!(now = %now, "장 운영 시간이 아니므로 시세 수집을 건너뜁니다");
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    config.provider.require_api_key()?;

    let targets = match symbols {
        Some(explicit) => {
            info!(count = explicit.len(), "특정 심볼 수집");
            explicit
        }
        None => {
            select_due(
                store,
                now,
                config.quotes.refresh_interval()?,
                config.quotes.max_symbols_per_run,
            )
            .await?
        }
    };

    if targets.is_empty() {
        info!("갱신 대상 심볼이 없습니다 (모두 최근에 확인됨)");
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    info!(symbols = targets.len(), "시세 수집 시작");

    let report = fetch_batches(store, provider, &targets, config.quotes.batch_size, now).await?;

    stats.total = report.outcomes.len();
    stats.success = report.count(|o| matches!(o, BatchOutcome::Written { .. }));
    stats.errors = report.count(|o| matches!(o, BatchOutcome::Failed { .. }));
    stats.skipped = report.count(|o| matches!(o, BatchOutcome::Empty { .. }));
    stats.rows_inserted = report.inserted;
    stats.symbols_marked = report.symbols_marked();
    stats.elapsed = start.elapsed();

    Ok(stats)
}

/// 심볼을 고정 크기 배치로 나눠 순차적으로 조회하고 저장합니다.
///
/// 배치 단위 조회 실패는 결과에 기록할 뿐 에러로 반환하지 않습니다.
/// 저장소 에러만 `Err`로 전파됩니다.
pub async fn fetch_batches<S>(
    store: &mut S,
    provider: &dyn MarketDataProvider,
    symbols: &[Symbol],
    batch_size: usize,
    run_ts: DateTime<Utc>,
) -> Result<BatchRunReport>
where
    S: QuoteStore + ?Sized,
{
    let mut report = BatchRunReport::default();

    for (idx, batch) in symbols.chunks(batch_size.max(1)).enumerate() {
        let batch_num = idx + 1;

        let outcome = match provider.batch_quote(batch).await {
            Ok(items) if items.is_empty() => {
                warn!(batch = batch_num, symbols = batch.len(), "빈 응답, 배치를 건너뜁니다");
                BatchOutcome::Empty {
                    attempted: batch.len(),
                }
            }
            Ok(items) => {
                let inserted = write_quotes(store, &items, batch, run_ts).await?;
                info!(
                    batch = batch_num,
                    inserted = inserted,
                    marked = batch.len(),
                    "배치 저장 및 확인 처리 완료"
                );
                report.inserted += inserted;
                BatchOutcome::Written {
                    inserted,
                    attempted: batch.len(),
                }
            }
            Err(e) => {
                warn!(batch = batch_num, symbols = batch.len(), error = %e, "배치 조회 실패, 건너뜁니다");
                BatchOutcome::Failed {
                    attempted: batch.len(),
                    error: e.to_string(),
                }
            }
        };

        report.outcomes.push(outcome);
    }

    Ok(report)
}

/// 배치 응답을 저장하고 시도한 심볼 전체의 커서를 `run_ts`로 전진시킵니다.
///
/// 유효하지 않은 원소(심볼 누락, 가격이 숫자가 아님)는 조용히 버립니다.
/// 삽입된 행 수를 반환합니다.
pub async fn write_quotes<S>(
    store: &mut S,
    items: &[Value],
    attempted: &[Symbol],
    run_ts: DateTime<Utc>,
) -> Result<u64>
where
    S: QuoteStore + ?Sized,
{
    let rows: Vec<QuoteRow> = items
        .iter()
        .filter_map(|item| parse_quote(item, run_ts))
        .collect();

    if rows.len() < items.len() {
        debug!(dropped = items.len() - rows.len(), "유효하지 않은 시세 원소 제외");
    }

    let inserted = if rows.is_empty() {
        0
    } else {
        store.insert_quotes(&rows).await?
    };

    // 삽입과 커서 갱신은 별개의 문장이며 원자적이지 않다
    store.mark_checked(attempted, run_ts).await?;

    Ok(inserted)
}

/// 응답 원소 하나를 시세 행으로 변환합니다.
fn parse_quote(item: &Value, run_ts: DateTime<Utc>) -> Option<QuoteRow> {
    let symbol = Symbol::parse(&json_string(item, "symbol")?)?;
    let price = json_decimal(item.get("price")?)?;

    Some(QuoteRow {
        symbol,
        provider: QUOTE_PROVIDER.to_string(),
        as_of: run_ts,
        price,
        raw_payload: item.clone(),
    })
}
