//! PostgreSQL 저장소 구현.
//!
//! - `PgSession`: 수집 실행 한 번 동안 풀에서 빌린 연결 하나를 점유합니다.
//!   세션이 drop되면 (에러로 조기 반환하는 경우 포함) 연결은 풀로 반환됩니다.
//! - `PgAnalysisRepository`: 분석 API가 요청마다 풀을 통해 조회합니다.
//!
//! 스키마는 저장소 루트의 `migrations/`에 정의되어 있습니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use market_core::{
    FundamentalsFilter, FundamentalsRecord, PredictionRecord, QuotePoint, QuoteRow, Symbol,
    TopTradedRow,
};

use super::{AnalysisStore, FundamentalsStore, QuoteStore, SymbolSourceStore, TopTradedStore};
use crate::error::{DataError, Result};

/// UNNEST 일괄 삽입 시 한 번에 보내는 최대 행 수
const INSERT_CHUNK_SIZE: usize = 500;

/// 데이터베이스 연결 설정.
#[derive(Debug)]
pub struct DatabaseConfig {
    /// 데이터베이스 URL (postgresql://user@host:port/db)
    pub url: String,
    /// URL과 별도로 주입되는 비밀번호 (선택)
    pub password: Option<SecretString>,
    /// 풀의 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            url: url.into(),
            password,
            max_connections: 5,
            connect_timeout_secs: 30,
        }
    }
}

/// 연결 풀 생성.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| DataError::ConfigError(format!("잘못된 DATABASE_URL: {}", e)))?;

    if let Some(password) = &config.password {
        options = options.password(password.expose_secret());
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .map_err(|e| DataError::ConnectionError(e.to_string()))?;

    info!("데이터베이스 연결 풀 생성 완료");
    Ok(pool)
}

/// 내장 마이그레이션 적용.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("마이그레이션 적용 완료");
    Ok(())
}

/// 실행 단위 DB 세션.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

impl PgSession {
    /// 풀에서 연결 하나를 빌려 세션을 시작합니다.
    pub async fn acquire(pool: &PgPool) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        Ok(Self { conn })
    }
}

fn symbol_strs(symbols: &[Symbol]) -> Vec<&str> {
    symbols.iter().map(Symbol::as_str).collect()
}

#[async_trait]
impl QuoteStore for PgSession {
    async fn symbols_due(&mut self, stale_before: DateTime<Utc>, limit: i64) -> Result<Vec<Symbol>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT symbol
            FROM tracked_symbol
            WHERE last_price_checked_at IS NULL
               OR last_price_checked_at < $1
            ORDER BY last_price_checked_at ASC NULLS FIRST, symbol ASC
            LIMIT $2
            "#,
        )
        .bind(stale_before)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(s,)| Symbol::parse(&s))
            .collect())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_quotes(&mut self, rows: &[QuoteRow]) -> Result<u64> {
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let symbols: Vec<&str> = chunk.iter().map(|r| r.symbol.as_str()).collect();
            let providers: Vec<&str> = chunk.iter().map(|r| r.provider.as_str()).collect();
            let as_ofs: Vec<DateTime<Utc>> = chunk.iter().map(|r| r.as_of).collect();
            let prices: Vec<Decimal> = chunk.iter().map(|r| r.price).collect();
            let payloads: Vec<Value> = chunk.iter().map(|r| r.raw_payload.clone()).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO stocks_raw (symbol, provider, as_of, price, raw_payload)
                SELECT * FROM UNNEST(
                    $1::text[], $2::text[], $3::timestamptz[], $4::numeric[], $5::jsonb[]
                )
                "#,
            )
            .bind(&symbols)
            .bind(&providers)
            .bind(&as_ofs)
            .bind(&prices)
            .bind(&payloads)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn mark_checked(&mut self, symbols: &[Symbol], checked_at: DateTime<Utc>) -> Result<u64> {
        if symbols.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE tracked_symbol
            SET last_price_checked_at = $1
            WHERE symbol = ANY($2)
              AND (last_price_checked_at IS NULL OR last_price_checked_at < $1)
            "#,
        )
        .bind(checked_at)
        .bind(symbol_strs(symbols))
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FundamentalsStore for PgSession {
    async fn symbols_with_recent_fundamentals(
        &mut self,
        filter: &FundamentalsFilter,
        symbols: &[Symbol],
    ) -> Result<HashSet<Symbol>> {
        if symbols.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT symbol
            FROM fundamentals_raw
            WHERE provider = $1
              AND statement_type = $2
              AND period = $3
              AND as_of >= $4
              AND symbol = ANY($5)
            "#,
        )
        .bind(&filter.provider)
        .bind(&filter.statement_type)
        .bind(&filter.period)
        .bind(filter.recency_cutoff)
        .bind(symbol_strs(symbols))
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(s,)| Symbol::parse(&s))
            .collect())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_fundamentals(&mut self, records: &[FundamentalsRecord]) -> Result<u64> {
        let mut inserted = 0;

        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let symbols: Vec<&str> = chunk.iter().map(|r| r.symbol.as_str()).collect();
            let providers: Vec<&str> = chunk.iter().map(|r| r.provider.as_str()).collect();
            let statement_types: Vec<&str> =
                chunk.iter().map(|r| r.statement_type.as_str()).collect();
            let periods: Vec<&str> = chunk.iter().map(|r| r.period.as_str()).collect();
            let as_ofs: Vec<NaiveDate> = chunk.iter().map(|r| r.as_of).collect();
            let payloads: Vec<Value> = chunk.iter().map(|r| r.raw_payload.clone()).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO fundamentals_raw
                    (symbol, provider, statement_type, period, as_of, raw_payload)
                SELECT * FROM UNNEST(
                    $1::text[], $2::text[], $3::text[], $4::text[], $5::date[], $6::jsonb[]
                )
                ON CONFLICT (symbol, provider, statement_type, period, as_of) DO NOTHING
                "#,
            )
            .bind(&symbols)
            .bind(&providers)
            .bind(&statement_types)
            .bind(&periods)
            .bind(&as_ofs)
            .bind(&payloads)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected();
        }

        // 재무 데이터가 있는 심볼은 시세 갱신 대상으로 등록
        let mut tracked: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        tracked.sort_unstable();
        tracked.dedup();
        if !tracked.is_empty() {
            let registered = sqlx::query(
                r#"
                INSERT INTO tracked_symbol (symbol)
                SELECT * FROM UNNEST($1::text[])
                ON CONFLICT (symbol) DO NOTHING
                "#,
            )
            .bind(&tracked)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?
            .rows_affected();
            debug!(registered, "시세 추적 심볼 등록");
        }

        Ok(inserted)
    }
}

#[async_trait]
impl SymbolSourceStore for PgSession {
    async fn allowlisted_symbols(&mut self, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT upper(trim(symbol)) AS symbol
            FROM fundamentals_allowlist
            WHERE trim(symbol) <> ''
            ORDER BY 1 ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    async fn top_traded_symbols(&mut self, since: DateTime<Utc>, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT symbol
            FROM top_traded_raw
            WHERE as_of >= $1
            ORDER BY as_of DESC, rank ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

#[async_trait]
impl TopTradedStore for PgSession {
    async fn insert_top_traded(&mut self, rows: &[TopTradedRow]) -> Result<u64> {
        let mut inserted = 0;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO top_traded_raw (
                    symbol, name, price, change, change_percentage, exchange,
                    volume, high, low, provider, as_of, rank, raw_payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(row.symbol.as_str())
            .bind(row.name.as_deref())
            .bind(row.price)
            .bind(row.change)
            .bind(row.change_percentage)
            .bind(row.exchange.as_deref())
            .bind(row.volume)
            .bind(row.high)
            .bind(row.low)
            .bind(&row.provider)
            .bind(row.as_of)
            .bind(row.rank)
            .bind(&row.raw_payload)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| DataError::InsertError(e.to_string()))?;

            inserted += result.rows_affected();
        }

        debug!(inserted, "거래 상위 스냅샷 저장");
        Ok(inserted)
    }
}

/// 분석 조회 저장소.
#[derive(Clone)]
pub struct PgAnalysisRepository {
    pool: PgPool,
}

impl PgAnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisRepository {
    async fn latest_quotes(&self, symbol: &Symbol, limit: i64) -> Result<Vec<QuotePoint>> {
        let points = sqlx::query_as::<_, QuotePoint>(
            r#"
            SELECT as_of AS as_of_utc, price
            FROM stocks_raw
            WHERE symbol = $1
            ORDER BY as_of DESC
            LIMIT $2
            "#,
        )
        .bind(symbol.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }

    async fn latest_predictions(&self, symbol: &Symbol, limit: i64) -> Result<Vec<PredictionRecord>> {
        let records = sqlx::query_as::<_, PredictionRecord>(
            r#"
            SELECT id, symbol, model_name, horizon_years, expected_return, confidence,
                   as_of_utc, input_snapshot_id, extra_meta, created_at
            FROM predictions
            WHERE upper(trim(symbol)) = $1
            ORDER BY as_of_utc DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(symbol.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
