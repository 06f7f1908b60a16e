//! 시세 수집 파이프라인 통합 테스트 (mockito + 인메모리 저장소).

use chrono::{DateTime, TimeZone, Utc};
use market_collector::config::ProviderConfig;
use market_collector::modules::{collect_quotes, quote_ingest, BatchOutcome};
use market_collector::{CollectorConfig, CollectorError};
use market_core::Symbol;
use market_data::{DatabaseConfig, FmpClient, InMemoryStore};
use mockito::{Matcher, Server};
use rust_decimal_macros::dec;
use secrecy::SecretString;

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

fn config_for(server: &Server, api_key: Option<&str>) -> CollectorConfig {
    CollectorConfig::new(
        DatabaseConfig::new("postgres://localhost/unused", None),
        ProviderConfig::new(server.url(), api_key.map(|k| SecretString::from(k.to_string()))),
    )
}

fn client_for(config: &CollectorConfig) -> FmpClient {
    FmpClient::new(config.provider.fmp_config()).unwrap()
}

/// 2025-03-05 (수) 11:00 뉴욕
fn market_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap()
}

/// 2025-03-08 (토)
fn weekend() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 8, 16, 0, 0).unwrap()
}

async fn mock_batch(server: &mut Server, csv: &str, status: usize, body: &str) -> mockito::Mock {
    server
        .mock("GET", "/stable/batch-quote")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbols".into(), csv.into()),
            Matcher::UrlEncoded("apikey".into(), "test-key".into()),
        ]))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn failed_batch_is_isolated_and_left_unmarked() {
    let mut server = Server::new_async().await;
    let batch1 = mock_batch(
        &mut server,
        "AAA,BBB",
        200,
        r#"[{"symbol":"AAA","price":10.5},{"symbol":"BBB","price":null}]"#,
    )
    .await;
    let batch2 = mock_batch(&mut server, "CCC,DDD", 500, "internal error").await;
    let batch3 = mock_batch(
        &mut server,
        "EEE,FFF",
        200,
        r#"[{"symbol":"EEE","price":1},{"symbol":"fff","price":2.25}]"#,
    )
    .await;

    let mut config = config_for(&server, Some("test-key"));
    config.quotes.batch_size = 2;
    let client = client_for(&config);

    let mut store = InMemoryStore::new();
    for s in ["FFF", "EEE", "DDD", "CCC", "BBB", "AAA"] {
        store.track_symbol(sym(s), None);
    }

    let now = market_open();
    let stats = collect_quotes(&mut store, &client, &config, now, None)
        .await
        .unwrap();

    batch1.assert_async().await;
    batch2.assert_async().await;
    batch3.assert_async().await;

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.rows_inserted, 3);
    assert_eq!(stats.symbols_marked, 4);

    let quotes = store.quotes();
    assert_eq!(quotes.len(), 3);
    assert!(quotes.iter().all(|q| q.as_of == now && q.provider == "fmp_batch_quote"));
    assert!(quotes.iter().any(|q| q.symbol == sym("FFF") && q.price == dec!(2.25)));

    // 파싱에 실패한 BBB도 시도했으므로 확인 처리된다
    for s in ["AAA", "BBB", "EEE", "FFF"] {
        assert_eq!(store.cursor(&sym(s)), Some(now), "{s}");
    }
    for s in ["CCC", "DDD"] {
        assert_eq!(store.cursor(&sym(s)), None, "{s}");
    }
}

#[tokio::test]
async fn fetch_batches_reports_each_batch_in_order() {
    let mut server = Server::new_async().await;
    mock_batch(&mut server, "AAA", 200, "[]").await;
    mock_batch(&mut server, "BBB", 200, r#"{"Error Message":"Limit Reach"}"#).await;
    mock_batch(&mut server, "CCC", 200, r#"[{"symbol":"CCC","price":3}]"#).await;

    let config = config_for(&server, Some("test-key"));
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    let symbols = vec![sym("AAA"), sym("BBB"), sym("CCC")];
    for s in &symbols {
        store.track_symbol(s.clone(), None);
    }

    let report = market_collector::modules::fetch_batches(&mut store, &client, &symbols, 1, market_open())
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert!(matches!(report.outcomes[0], BatchOutcome::Empty { attempted: 1 }));
    assert!(matches!(report.outcomes[1], BatchOutcome::Failed { attempted: 1, .. }));
    assert!(matches!(
        report.outcomes[2],
        BatchOutcome::Written { inserted: 1, attempted: 1 }
    ));

    // 빈 응답과 비배열 응답은 확인 처리하지 않는다
    assert_eq!(store.cursor(&sym("AAA")), None);
    assert_eq!(store.cursor(&sym("BBB")), None);
    assert_eq!(store.cursor(&sym("CCC")), Some(market_open()));
}

#[tokio::test]
async fn closed_market_skips_run_without_requests() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/stable/batch-quote")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = config_for(&server, Some("test-key"));
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    store.track_symbol(sym("AAPL"), None);

    let stats = collect_quotes(&mut store, &client, &config, weekend(), None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(stats.total, 0);
    assert_eq!(store.cursor(&sym("AAPL")), None);
}

#[tokio::test]
async fn bypass_flag_runs_outside_market_hours() {
    let mut server = Server::new_async().await;
    mock_batch(&mut server, "AAPL", 200, r#"[{"symbol":"AAPL","price":190}]"#).await;

    let mut config = config_for(&server, Some("test-key"));
    config.market_hours.bypass = true;
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    store.track_symbol(sym("AAPL"), None);

    let stats = collect_quotes(&mut store, &client, &config, weekend(), None)
        .await
        .unwrap();

    assert_eq!(stats.rows_inserted, 1);
    assert_eq!(store.cursor(&sym("AAPL")), Some(weekend()));
}

#[tokio::test]
async fn explicit_symbols_skip_selection() {
    let mut server = Server::new_async().await;
    let mock = mock_batch(&mut server, "TSLA", 200, r#"[{"symbol":"TSLA","price":250}]"#).await;

    let config = config_for(&server, Some("test-key"));
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    store.track_symbol(sym("TSLA"), Some(market_open()));

    let stats = collect_quotes(&mut store, &client, &config, market_open(), Some(vec![sym("TSLA")]))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(stats.rows_inserted, 1);
}

#[tokio::test]
async fn missing_api_key_aborts_run_and_is_swallowed() {
    let server = Server::new_async().await;
    let config = config_for(&server, None);
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    store.track_symbol(sym("AAPL"), None);

    let err = collect_quotes(&mut store, &client, &config, market_open(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CollectorError::Config(_)));

    let outcome = quote_ingest::run(&mut store, &client, &config, market_open(), None).await;
    assert!(outcome.is_none());
    assert_eq!(store.cursor(&sym("AAPL")), None);
}

#[tokio::test]
async fn persistence_error_is_caught_at_run() {
    let mut server = Server::new_async().await;
    mock_batch(&mut server, "AAPL", 200, r#"[{"symbol":"AAPL","price":190}]"#).await;

    let config = config_for(&server, Some("test-key"));
    let client = client_for(&config);
    let mut store = InMemoryStore::new();
    store.track_symbol(sym("AAPL"), None);
    store.fail_writes_for(sym("AAPL"));

    let outcome = quote_ingest::run(&mut store, &client, &config, market_open(), None).await;

    assert!(outcome.is_none());
    assert!(store.quotes().is_empty());
    assert_eq!(store.cursor(&sym("AAPL")), None);
}
