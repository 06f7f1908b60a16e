//! 환경변수 기반 설정 모듈.
//!
//! 설정은 프로세스 시작 시 한 번 로드되며 이후 변경되지 않습니다.
//! 각 수집 단계에는 참조로 전달됩니다.

use chrono::NaiveTime;
use chrono_tz::Tz;
use market_data::{DatabaseConfig, FmpConfig};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CollectorError;
use crate::Result;

/// 기본 FMP API 주소
pub const DEFAULT_FMP_BASE_URL: &str = "https://financialmodelingprep.com";

/// 시세 갱신 기준 상한 (분, 1년)
const MAX_REFRESH_MINUTES: i64 = 525_600;
/// 거래 상위 스냅샷 범위 상한 (시간, 1년)
const MAX_WINDOW_HOURS: i64 = 8_760;
/// 재무제표 최신 판정 일수 상한 (100년)
const MAX_RECENCY_DAYS: i64 = 36_500;
/// 데몬 실행 주기 상한 (분, 30일)
const MAX_DAEMON_INTERVAL_MINUTES: u64 = 43_200;

/// Collector 전체 설정
#[derive(Debug)]
pub struct CollectorConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 데이터 제공자 설정
    pub provider: ProviderConfig,
    /// 시세 수집 설정
    pub quotes: QuoteIngestConfig,
    /// 장 운영 시간 설정
    pub market_hours: MarketHoursConfig,
    /// 재무제표 동기화 설정
    pub fundamentals: FundamentalsConfig,
    /// 거래 상위 종목 설정
    pub top_traded: TopTradedConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 데이터 제공자(FMP) 설정
#[derive(Debug)]
pub struct ProviderConfig {
    /// API 기본 URL
    pub base_url: String,
    /// API 키 (없으면 각 실행이 설정 에러로 중단됨)
    pub api_key: Option<SecretString>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

/// 시세 수집 설정
#[derive(Debug, Clone)]
pub struct QuoteIngestConfig {
    /// 실행당 최대 심볼 수
    pub max_symbols_per_run: usize,
    /// 배치당 심볼 수
    pub batch_size: usize,
    /// 갱신 기준 (마지막 확인 후 N분 경과 시 재수집)
    pub refresh_minutes: i64,
}

/// 장 운영 시간 설정
#[derive(Debug, Clone)]
pub struct MarketHoursConfig {
    /// 거래소 시간대
    pub timezone: Tz,
    /// 개장 시각 (현지)
    pub open: NaiveTime,
    /// 마감 시각 (현지)
    pub close: NaiveTime,
    /// 장 운영 시간 검사 생략
    pub bypass: bool,
}

/// 재무제표 수집 대상 원천
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FundamentalsSource {
    /// 허용 목록 테이블
    #[default]
    Allowlist,
    /// 최근 거래 상위 종목 스냅샷
    TopTraded,
}

impl FundamentalsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowlist => "allowlist",
            Self::TopTraded => "top-traded",
        }
    }
}

impl fmt::Display for FundamentalsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundamentalsSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allowlist" => Ok(Self::Allowlist),
            "top-traded" | "top_traded" => Ok(Self::TopTraded),
            other => Err(format!("알 수 없는 재무제표 원천: {}", other)),
        }
    }
}

/// 재무제표 동기화 설정
#[derive(Debug, Clone)]
pub struct FundamentalsConfig {
    /// 대상 심볼 원천
    pub source: FundamentalsSource,
    /// 실행당 최대 심볼 수
    pub max_per_run: usize,
    /// 보고 주기
    pub period: String,
    /// 재무제표 종류
    pub statement_type: String,
    /// 저장 시 제공자 라벨
    pub provider: String,
    /// 이 일수 이내 기준일의 레코드가 있으면 최신으로 간주
    pub recency_days: i64,
}

/// 거래 상위 종목 설정
#[derive(Debug, Clone)]
pub struct TopTradedConfig {
    /// 재무제표 원천으로 사용할 스냅샷 범위 (시간)
    pub window_hours: i64,
    /// 원천 조회 시 최대 스캔 행 수
    pub scan_limit: usize,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 시세 수집 주기 (분)
    pub quote_interval_minutes: u64,
    /// 재무제표 동기화 주기 (분)
    pub fundamentals_interval_minutes: u64,
    /// 거래 상위 종목 수집 주기 (분)
    pub top_traded_interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })?;

        let quote_defaults = QuoteIngestConfig::default();
        let hours_defaults = MarketHoursConfig::default();
        let fundamentals_defaults = FundamentalsConfig::default();
        let top_traded_defaults = TopTradedConfig::default();
        let daemon_defaults = DaemonConfig::default();

        Self {
            database: DatabaseConfig::new(database_url, env_var_secret("DATABASE_PASSWORD")),
            provider: ProviderConfig {
                base_url: std::env::var("FMP_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_FMP_BASE_URL.to_string()),
                api_key: env_var_secret("FMP_API_KEY"),
                timeout_secs: env_var_parse("FMP_TIMEOUT_SECS", 30),
            },
            quotes: QuoteIngestConfig {
                max_symbols_per_run: env_var_parse(
                    "QUOTE_MAX_SYMBOLS_PER_RUN",
                    quote_defaults.max_symbols_per_run,
                ),
                batch_size: env_var_parse("QUOTE_BATCH_SIZE", quote_defaults.batch_size),
                refresh_minutes: env_var_parse("QUOTE_REFRESH_MINUTES", quote_defaults.refresh_minutes),
            },
            market_hours: MarketHoursConfig {
                timezone: env_var_parse("MARKET_TIMEZONE", hours_defaults.timezone),
                open: env_var_parse("MARKET_OPEN", hours_defaults.open),
                close: env_var_parse("MARKET_CLOSE", hours_defaults.close),
                bypass: env_var_bool("BYPASS_MARKET_HOURS", false),
            },
            fundamentals: FundamentalsConfig {
                source: env_var_parse("FUNDAMENTAL_SOURCE", fundamentals_defaults.source),
                max_per_run: env_var_parse("FUNDAMENTAL_MAX_PER_RUN", fundamentals_defaults.max_per_run),
                period: std::env::var("FUNDAMENTAL_PERIOD").unwrap_or(fundamentals_defaults.period),
                statement_type: std::env::var("FUNDAMENTAL_STATEMENT_TYPE")
                    .unwrap_or(fundamentals_defaults.statement_type),
                provider: std::env::var("FUNDAMENTAL_PROVIDER")
                    .unwrap_or(fundamentals_defaults.provider),
                recency_days: env_var_parse(
                    "FUNDAMENTAL_RECENCY_DAYS",
                    fundamentals_defaults.recency_days,
                ),
            },
            top_traded: TopTradedConfig {
                window_hours: env_var_parse("TOP_TRADED_WINDOW_HOURS", top_traded_defaults.window_hours),
                scan_limit: env_var_parse("TOP_TRADED_SCAN_LIMIT", top_traded_defaults.scan_limit),
            },
            daemon: DaemonConfig {
                quote_interval_minutes: env_var_parse(
                    "QUOTE_INTERVAL_MINUTES",
                    daemon_defaults.quote_interval_minutes,
                ),
                fundamentals_interval_minutes: env_var_parse(
                    "FUNDAMENTAL_INTERVAL_MINUTES",
                    daemon_defaults.fundamentals_interval_minutes,
                ),
                top_traded_interval_minutes: env_var_parse(
                    "TOP_TRADED_INTERVAL_MINUTES",
                    daemon_defaults.top_traded_interval_minutes,
                ),
            },
        }
        .validated()
    }

    /// 기간/주기 값의 허용 범위를 검사합니다.
    ///
    /// 0 주기나 날짜 범위를 넘는 기간은 실행 중 패닉 대신 시작 시 설정 에러가 됩니다.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "QUOTE_REFRESH_MINUTES",
            self.quotes.refresh_minutes,
            1,
            MAX_REFRESH_MINUTES,
        )?;
        check_range(
            "TOP_TRADED_WINDOW_HOURS",
            self.top_traded.window_hours,
            1,
            MAX_WINDOW_HOURS,
        )?;
        check_range(
            "FUNDAMENTAL_RECENCY_DAYS",
            self.fundamentals.recency_days,
            0,
            MAX_RECENCY_DAYS,
        )?;
        check_range(
            "QUOTE_INTERVAL_MINUTES",
            self.daemon.quote_interval_minutes,
            1,
            MAX_DAEMON_INTERVAL_MINUTES,
        )?;
        check_range(
            "FUNDAMENTAL_INTERVAL_MINUTES",
            self.daemon.fundamentals_interval_minutes,
            1,
            MAX_DAEMON_INTERVAL_MINUTES,
        )?;
        check_range(
            "TOP_TRADED_INTERVAL_MINUTES",
            self.daemon.top_traded_interval_minutes,
            1,
            MAX_DAEMON_INTERVAL_MINUTES,
        )
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// 데이터베이스/제공자 설정만 지정하고 나머지는 기본값을 사용합니다.
    pub fn new(database: DatabaseConfig, provider: ProviderConfig) -> Self {
        Self {
            database,
            provider,
            quotes: QuoteIngestConfig::default(),
            market_hours: MarketHoursConfig::default(),
            fundamentals: FundamentalsConfig::default(),
            top_traded: TopTradedConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout_secs: 30,
        }
    }

    /// API 키가 없으면 설정 에러를 반환합니다.
    pub fn require_api_key(&self) -> Result<()> {
        match &self.api_key {
            Some(key) if !key.expose_secret().trim().is_empty() => Ok(()),
            _ => Err(CollectorError::Config(
                "FMP_API_KEY 환경변수가 설정되지 않았습니다".to_string(),
            )),
        }
    }

    /// HTTP 클라이언트 설정 생성
    pub fn fmp_config(&self) -> FmpConfig {
        let api_key = self
            .api_key
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_string()));

        FmpConfig::new(self.base_url.clone(), api_key)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

impl Default for QuoteIngestConfig {
    fn default() -> Self {
        Self {
            max_symbols_per_run: 900,
            batch_size: 200,
            refresh_minutes: 30,
        }
    }
}

impl QuoteIngestConfig {
    /// 갱신 기준 간격
    pub fn refresh_interval(&self) -> Result<chrono::Duration> {
        check_range("QUOTE_REFRESH_MINUTES", self.refresh_minutes, 1, MAX_REFRESH_MINUTES)?;
        chrono::Duration::try_minutes(self.refresh_minutes)
            .ok_or_else(|| out_of_range("QUOTE_REFRESH_MINUTES", self.refresh_minutes))
    }
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            bypass: false,
        }
    }
}

impl Default for FundamentalsConfig {
    fn default() -> Self {
        Self {
            source: FundamentalsSource::Allowlist,
            max_per_run: 25,
            period: "quarter".to_string(),
            statement_type: "income_statement".to_string(),
            provider: "fmp_income_statement".to_string(),
            recency_days: 120,
        }
    }
}

impl FundamentalsConfig {
    /// 최신 판정 기간
    pub fn recency(&self) -> Result<chrono::Duration> {
        check_range("FUNDAMENTAL_RECENCY_DAYS", self.recency_days, 0, MAX_RECENCY_DAYS)?;
        chrono::Duration::try_days(self.recency_days)
            .ok_or_else(|| out_of_range("FUNDAMENTAL_RECENCY_DAYS", self.recency_days))
    }
}

impl TopTradedConfig {
    /// 재무제표 원천으로 사용할 스냅샷 범위
    pub fn window(&self) -> Result<chrono::Duration> {
        check_range("TOP_TRADED_WINDOW_HOURS", self.window_hours, 1, MAX_WINDOW_HOURS)?;
        chrono::Duration::try_hours(self.window_hours)
            .ok_or_else(|| out_of_range("TOP_TRADED_WINDOW_HOURS", self.window_hours))
    }
}

impl Default for TopTradedConfig {
    fn default() -> Self {
        Self {
            window_hours: 3,
            scan_limit: 200,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            quote_interval_minutes: 2,
            fundamentals_interval_minutes: 120,
            top_traded_interval_minutes: 120,
        }
    }
}

impl DaemonConfig {
    pub fn quote_interval(&self) -> Result<Duration> {
        minutes_interval("QUOTE_INTERVAL_MINUTES", self.quote_interval_minutes)
    }

    pub fn fundamentals_interval(&self) -> Result<Duration> {
        minutes_interval("FUNDAMENTAL_INTERVAL_MINUTES", self.fundamentals_interval_minutes)
    }

    pub fn top_traded_interval(&self) -> Result<Duration> {
        minutes_interval("TOP_TRADED_INTERVAL_MINUTES", self.top_traded_interval_minutes)
    }
}

/// 0이 아닌 분 단위 주기 (`tokio::time::interval`은 0 주기를 허용하지 않음)
fn minutes_interval(key: &str, minutes: u64) -> Result<Duration> {
    check_range(key, minutes, 1, MAX_DAEMON_INTERVAL_MINUTES)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| out_of_range(key, minutes))
}

fn check_range<T>(key: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display,
{
    if value < min || value > max {
        return Err(CollectorError::Config(format!(
            "{}={}: {}-{} 범위여야 합니다",
            key, value, min, max
        )));
    }
    Ok(())
}

fn out_of_range(key: &str, value: impl fmt::Display) -> CollectorError {
    CollectorError::Config(format!("{}={}: 표현할 수 없는 기간입니다", key, value))
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// 비어 있지 않은 환경변수를 비밀 값으로 로드
fn env_var_secret(key: &str) -> Option<SecretString> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let quotes = QuoteIngestConfig::default();
        assert_eq!(quotes.max_symbols_per_run, 900);
        assert_eq!(quotes.batch_size, 200);
        assert_eq!(quotes.refresh_interval().unwrap(), chrono::Duration::minutes(30));

        let fundamentals = FundamentalsConfig::default();
        assert_eq!(fundamentals.max_per_run, 25);
        assert_eq!(fundamentals.recency_days, 120);
        assert_eq!(fundamentals.provider, "fmp_income_statement");

        let hours = MarketHoursConfig::default();
        assert_eq!(hours.timezone, chrono_tz::America::New_York);
        assert_eq!(hours.open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());

        assert_eq!(
            DaemonConfig::default().quote_interval().unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(TopTradedConfig::default().window().unwrap(), chrono::Duration::hours(3));
        assert_eq!(fundamentals.recency().unwrap(), chrono::Duration::days(120));
    }

    fn config() -> CollectorConfig {
        CollectorConfig::new(
            DatabaseConfig::new("postgres://localhost/unused", None),
            ProviderConfig::new(DEFAULT_FMP_BASE_URL, None),
        )
    }

    #[test]
    fn test_zero_daemon_interval_is_config_error() {
        let mut config = config();
        assert!(config.validate().is_ok());

        config.daemon.quote_interval_minutes = 0;
        assert!(matches!(config.validate(), Err(CollectorError::Config(_))));
        assert!(matches!(
            config.daemon.quote_interval(),
            Err(CollectorError::Config(_))
        ));

        config.daemon.quote_interval_minutes = u64::MAX;
        assert!(config.validate().is_err());
        assert!(config.daemon.quote_interval().is_err());
    }

    #[test]
    fn test_oversized_durations_are_config_errors() {
        let mut config = config();
        config.quotes.refresh_minutes = i64::MAX / 2;
        assert!(matches!(config.validate(), Err(CollectorError::Config(_))));
        assert!(config.quotes.refresh_interval().is_err());

        let mut config = self::config();
        config.top_traded.window_hours = i64::MAX;
        assert!(config.validate().is_err());
        assert!(config.top_traded.window().is_err());

        let mut config = self::config();
        config.fundamentals.recency_days = i64::MAX;
        assert!(config.validate().is_err());
        assert!(config.fundamentals.recency().is_err());

        config.fundamentals.recency_days = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fundamentals_source_parse() {
        assert_eq!("allowlist".parse::<FundamentalsSource>(), Ok(FundamentalsSource::Allowlist));
        assert_eq!("Top-Traded".parse::<FundamentalsSource>(), Ok(FundamentalsSource::TopTraded));
        assert_eq!("top_traded".parse::<FundamentalsSource>(), Ok(FundamentalsSource::TopTraded));
        assert!("sp500".parse::<FundamentalsSource>().is_err());
    }

    #[test]
    fn test_require_api_key() {
        assert!(ProviderConfig::new(DEFAULT_FMP_BASE_URL, None)
            .require_api_key()
            .is_err());
        assert!(
            ProviderConfig::new(DEFAULT_FMP_BASE_URL, Some(SecretString::from("  ".to_string())))
                .require_api_key()
                .is_err()
        );
        assert!(
            ProviderConfig::new(DEFAULT_FMP_BASE_URL, Some(SecretString::from("k".to_string())))
                .require_api_key()
                .is_ok()
        );
    }
}
