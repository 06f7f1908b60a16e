//! Market collector CLI.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use market_collector::config::FundamentalsSource;
use market_collector::{CollectorConfig, Pipeline};
use market_core::dedup_symbols;
use market_data::{connect_pool, run_migrations, FmpClient};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "market-collector")]
#[command(about = "Market quote and fundamentals collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 시세 수집 1회
    CollectQuotes {
        /// 특정 심볼만 수집 (쉼표로 구분, 예: "AAPL,MSFT")
        #[arg(long)]
        symbols: Option<String>,
    },

    /// 재무제표 동기화 1회
    SyncFundamentals {
        /// 대상 심볼 원천 (allowlist, top-traded)
        #[arg(long)]
        source: Option<FundamentalsSource>,
    },

    /// 거래 상위 종목 스냅샷 수집 1회
    IngestTopTraded,

    /// 전체 워크플로우 실행 (거래 상위 → 재무제표 → 시세)
    RunAll,

    /// 데몬 모드: 단계별 주기로 반복 실행
    Daemon,

    /// 데이터베이스 마이그레이션 적용
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Market Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        provider = %config.provider.base_url,
        batch_size = config.quotes.batch_size,
        max_symbols = config.quotes.max_symbols_per_run,
        "설정 로드 완료"
    );
    if config.provider.api_key.is_none() {
        tracing::warn!("FMP_API_KEY가 없습니다. 수집 실행은 설정 에러로 중단됩니다");
    }

    // DB 연결
    let pool = connect_pool(&config.database).await?;

    if let Commands::Migrate = cli.command {
        run_migrations(&pool).await?;
        pool.close().await;
        return Ok(());
    }

    // HTTP 클라이언트는 한 번만 생성하여 모든 단계가 공유
    let provider = FmpClient::new(config.provider.fmp_config()).context("FMP 클라이언트 생성 실패")?;
    let pipeline = Pipeline::new(pool.clone(), Arc::new(provider), config);

    // 명령 실행
    match cli.command {
        Commands::CollectQuotes { symbols } => {
            let symbols = symbols.map(|s| dedup_symbols(s.split(',')));
            pipeline.collect_quotes(Utc::now(), symbols).await;
        }
        Commands::SyncFundamentals { source } => {
            pipeline.sync_fundamentals(Utc::now(), source).await;
        }
        Commands::IngestTopTraded => {
            pipeline.ingest_top_traded(Utc::now()).await;
        }
        Commands::RunAll => {
            tracing::info!("=== 전체 워크플로우 시작 ===");

            tracing::info!("Step 1/3: 거래 상위 종목 수집");
            pipeline.ingest_top_traded(Utc::now()).await;

            tracing::info!("Step 2/3: 재무제표 동기화");
            pipeline.sync_fundamentals(Utc::now(), None).await;

            tracing::info!("Step 3/3: 시세 수집");
            pipeline.collect_quotes(Utc::now(), None).await;

            tracing::info!("=== 전체 워크플로우 완료 ===");
        }
        Commands::Daemon => run_daemon(&pipeline).await?,
        Commands::Migrate => {}
    }

    pool.close().await;
    tracing::info!("Market Collector 종료");

    Ok(())
}

/// 단계별 독립 주기로 실행하며 Ctrl-C에서 종료합니다.
async fn run_daemon(pipeline: &Pipeline) -> anyhow::Result<()> {
    let daemon = &pipeline.config().daemon;
    tracing::info!(
        quotes_min = daemon.quote_interval_minutes,
        top_traded_min = daemon.top_traded_interval_minutes,
        fundamentals_min = daemon.fundamentals_interval_minutes,
        "=== 데몬 모드 시작 ==="
    );

    let mut quotes = interval(daemon.quote_interval()?);
    let mut top_traded = interval(daemon.top_traded_interval()?);
    let mut fundamentals = interval(daemon.fundamentals_interval()?);
    for ticker in [&mut quotes, &mut top_traded, &mut fundamentals] {
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, 데몬 종료 중...");
                break;
            }
            _ = top_traded.tick() => {
                pipeline.ingest_top_traded(Utc::now()).await;
            }
            _ = fundamentals.tick() => {
                pipeline.sync_fundamentals(Utc::now(), None).await;
            }
            _ = quotes.tick() => {
                pipeline.collect_quotes(Utc::now(), None).await;
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` 미설정 시 필터. 저장소/프로바이더 로그도 같은 레벨로 남깁니다.
fn default_log_filter(level: &str) -> String {
    format!("market_collector={level},market_data={level}")
}
