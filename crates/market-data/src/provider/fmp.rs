//! Financial Modeling Prep(FMP) HTTP 클라이언트.
//!
//! ## 사용 엔드포인트
//! - `/stable/batch-quote`: 여러 심볼 현재가 일괄 조회
//! - `/stable/{statement}`: 재무제표 (예: `income-statement`)
//! - `/stable/most-actives`: 거래 상위 종목
//!
//! ## 사용 예시
//! ```rust,ignore
//! let client = FmpClient::new(FmpConfig::new(base_url, Some(api_key)))?;
//! let quotes = client.batch_quote(&symbols).await?;
//! ```
//!
//! 클라이언트는 프로세스 시작 시 한 번 생성되어 종료까지 공유됩니다.
//! 내부 `reqwest::Client`가 연결 풀을 보유하므로 호출마다 새로 만들지 않습니다.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use market_core::Symbol;

use super::MarketDataProvider;

/// 로그에 남길 응답 본문 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 500;

/// 제공자 호출 에러
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP 요청 실패: {0}")]
    Http(#[from] reqwest::Error),

    #[error("제공자 응답 오류 ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("예상하지 못한 응답 형식: {0}")]
    UnexpectedShape(String),

    #[error("FMP API 키가 설정되지 않았습니다")]
    MissingApiKey,
}

/// FMP 클라이언트 설정
#[derive(Debug)]
pub struct FmpConfig {
    /// API 기본 URL (예: "https://financialmodelingprep.com")
    pub base_url: String,
    /// API 키
    pub api_key: Option<SecretString>,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl FmpConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// FMP HTTP 클라이언트
pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl FmpClient {
    /// 설정으로 클라이언트 생성
    pub fn new(config: FmpConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    /// API 키 설정 여부
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET 요청 후 JSON 배열 응답을 반환합니다.
    async fn get_array(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or(ProviderError::MissingApiKey)?;
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "FMP 요청");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", api_key.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => Ok(items),
            other => Err(ProviderError::UnexpectedShape(
                other.to_string().chars().take(MAX_ERROR_BODY_CHARS).collect(),
            )),
        }
    }
}

/// "income_statement" → "income-statement"
fn statement_path(statement_type: &str) -> String {
    format!("/stable/{}", statement_type.trim().replace('_', "-"))
}

#[async_trait]
impl MarketDataProvider for FmpClient {
    async fn batch_quote(&self, symbols: &[Symbol]) -> Result<Vec<Value>, ProviderError> {
        let csv = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");

        self.get_array("/stable/batch-quote", &[("symbols", csv.as_str())])
            .await
    }

    async fn statements(
        &self,
        symbol: &Symbol,
        statement_type: &str,
        period: &str,
    ) -> Result<Vec<Value>, ProviderError> {
        self.get_array(
            &statement_path(statement_type),
            &[("symbol", symbol.as_str()), ("period", period)],
        )
        .await
    }

    async fn most_actives(&self) -> Result<Vec<Value>, ProviderError> {
        self.get_array("/stable/most-actives", &[]).await
    }
}
