//! 인메모리 저장소.
//!
//! PostgreSQL 구현과 같은 계약(정렬, 커서 단조 증가, 중복 무시)을 따르며,
//! 파이프라인 테스트와 DB 없는 드라이런에 사용합니다.
//! 복제본은 같은 내부 상태를 공유합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use market_core::{
    FundamentalsFilter, FundamentalsRecord, PredictionRecord, QuotePoint, QuoteRow, Symbol,
    TopTradedRow,
};

use super::{AnalysisStore, FundamentalsStore, QuoteStore, SymbolSourceStore, TopTradedStore};
use crate::error::{DataError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    cursors: BTreeMap<Symbol, Option<DateTime<Utc>>>,
    quotes: Vec<QuoteRow>,
    fundamentals: Vec<FundamentalsRecord>,
    allowlist: Vec<String>,
    top_traded: Vec<TopTradedRow>,
    predictions: Vec<PredictionRecord>,
    failing_symbols: HashSet<Symbol>,
}

/// 인메모리 저장소.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 추적 심볼 등록 (커서 지정).
    pub fn track_symbol(&self, symbol: Symbol, last_checked_at: Option<DateTime<Utc>>) {
        self.lock().cursors.insert(symbol, last_checked_at);
    }

    /// 허용 목록에 원시 심볼 추가.
    pub fn allow(&self, raw_symbol: impl Into<String>) {
        self.lock().allowlist.push(raw_symbol.into());
    }

    /// 예측 레코드 추가.
    pub fn add_prediction(&self, record: PredictionRecord) {
        self.lock().predictions.push(record);
    }

    /// 해당 심볼이 포함된 쓰기를 실패시킵니다.
    pub fn fail_writes_for(&self, symbol: Symbol) {
        self.lock().failing_symbols.insert(symbol);
    }

    /// 심볼의 현재 커서.
    pub fn cursor(&self, symbol: &Symbol) -> Option<DateTime<Utc>> {
        self.lock().cursors.get(symbol).copied().flatten()
    }

    /// 저장된 시세 행 전체.
    pub fn quotes(&self) -> Vec<QuoteRow> {
        self.lock().quotes.clone()
    }

    /// 저장된 재무제표 레코드 전체.
    pub fn fundamentals(&self) -> Vec<FundamentalsRecord> {
        self.lock().fundamentals.clone()
    }

    /// 저장된 거래 상위 스냅샷 전체.
    pub fn top_traded(&self) -> Vec<TopTradedRow> {
        self.lock().top_traded.clone()
    }

    fn check_writable<'a>(
        state: &MemoryState,
        mut symbols: impl Iterator<Item = &'a Symbol>,
    ) -> Result<()> {
        match symbols.find(|s| state.failing_symbols.contains(*s)) {
            Some(symbol) => Err(DataError::InsertError(format!("쓰기 거부: {}", symbol))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QuoteStore for InMemoryStore {
    async fn symbols_due(&mut self, stale_before: DateTime<Utc>, limit: i64) -> Result<Vec<Symbol>> {
        let state = self.lock();
        let mut due: Vec<(&Symbol, Option<DateTime<Utc>>)> = state
            .cursors
            .iter()
            .filter(|(_, cursor)| cursor.map_or(true, |at| at < stale_before))
            .map(|(symbol, cursor)| (symbol, *cursor))
            .collect();

        // None < Some 이므로 커서 없는 심볼이 먼저 온다
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        Ok(due
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(|(symbol, _)| symbol.clone())
            .collect())
    }

    async fn insert_quotes(&mut self, rows: &[QuoteRow]) -> Result<u64> {
        let mut state = self.lock();
        Self::check_writable(&state, rows.iter().map(|r| &r.symbol))?;
        state.quotes.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn mark_checked(&mut self, symbols: &[Symbol], checked_at: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock();
        let mut updated = 0;
        for symbol in symbols {
            if let Some(cursor) = state.cursors.get_mut(symbol) {
                if cursor.map_or(true, |at| at < checked_at) {
                    *cursor = Some(checked_at);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

#[async_trait]
impl FundamentalsStore for InMemoryStore {
    async fn symbols_with_recent_fundamentals(
        &mut self,
        filter: &FundamentalsFilter,
        symbols: &[Symbol],
    ) -> Result<HashSet<Symbol>> {
        let wanted: HashSet<&Symbol> = symbols.iter().collect();
        Ok(self
            .lock()
            .fundamentals
            .iter()
            .filter(|r| filter.matches(r) && wanted.contains(&r.symbol))
            .map(|r| r.symbol.clone())
            .collect())
    }

    async fn upsert_fundamentals(&mut self, records: &[FundamentalsRecord]) -> Result<u64> {
        let mut state = self.lock();
        Self::check_writable(&state, records.iter().map(|r| &r.symbol))?;

        let mut inserted = 0;
        for record in records {
            let exists = state
                .fundamentals
                .iter()
                .any(|r| r.unique_key() == record.unique_key());
            if !exists {
                state.fundamentals.push(record.clone());
                inserted += 1;
            }
            state.cursors.entry(record.symbol.clone()).or_insert(None);
        }
        Ok(inserted)
    }
}

#[async_trait]
impl SymbolSourceStore for InMemoryStore {
    async fn allowlisted_symbols(&mut self, limit: i64) -> Result<Vec<String>> {
        let normalized: BTreeSet<Symbol> = self
            .lock()
            .allowlist
            .iter()
            .filter_map(|raw| Symbol::parse(raw))
            .collect();

        Ok(normalized
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(Symbol::into_inner)
            .collect())
    }

    async fn top_traded_symbols(&mut self, since: DateTime<Utc>, limit: i64) -> Result<Vec<String>> {
        let state = self.lock();
        let mut rows: Vec<&TopTradedRow> = state.top_traded.iter().filter(|r| r.as_of >= since).collect();
        rows.sort_by(|a, b| b.as_of.cmp(&a.as_of).then_with(|| a.rank.cmp(&b.rank)));

        Ok(rows
            .into_iter()
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .map(|r| r.symbol.to_string())
            .collect())
    }
}

#[async_trait]
impl TopTradedStore for InMemoryStore {
    async fn insert_top_traded(&mut self, rows: &[TopTradedRow]) -> Result<u64> {
        let mut state = self.lock();
        Self::check_writable(&state, rows.iter().map(|r| &r.symbol))?;
        state.top_traded.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn latest_quotes(&self, symbol: &Symbol, limit: i64) -> Result<Vec<QuotePoint>> {
        let state = self.lock();
        let mut points: Vec<QuotePoint> = state
            .quotes
            .iter()
            .filter(|r| &r.symbol == symbol)
            .map(|r| QuotePoint::new(r.as_of, r.price))
            .collect();
        points.sort_by(|a, b| b.as_of_utc.cmp(&a.as_of_utc));
        points.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(points)
    }

    async fn latest_predictions(&self, symbol: &Symbol, limit: i64) -> Result<Vec<PredictionRecord>> {
        let state = self.lock();
        let mut records: Vec<PredictionRecord> = state
            .predictions
            .iter()
            .filter(|r| r.symbol.as_deref().and_then(Symbol::parse).as_ref() == Some(symbol))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.as_of_utc.cmp(&a.as_of_utc).then_with(|| b.id.cmp(&a.id)));
        records.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
