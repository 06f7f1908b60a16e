//! 데이터 수집 모듈.

pub mod fundamental_sync;
pub mod market_hours;
pub mod quote_ingest;
pub mod symbol_select;
pub mod top_traded;

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::{CollectionStats, Result};

pub use fundamental_sync::{resolve_source_symbols, sync_fundamentals};
pub use market_hours::{is_open, MarketHoursGate};
pub use quote_ingest::{collect_quotes, fetch_batches, write_quotes, BatchOutcome, BatchRunReport};
pub use symbol_select::select_due;
pub use top_traded::ingest_top_traded;

/// 단계 실행 결과를 로그로 남기고 에러는 삼킵니다.
pub(crate) fn finish(operation: &str, result: Result<CollectionStats>) -> Option<CollectionStats> {
    match result {
        Ok(stats) => {
            stats.log_summary(operation);
            Some(stats)
        }
        Err(e) => {
            tracing::error!(operation = operation, error = %e, "수집 실행 실패");
            None
        }
    }
}

/// JSON 숫자를 Decimal로 변환합니다. 숫자가 아니면 `None`.
pub(crate) fn json_decimal(value: &Value) -> Option<Decimal> {
    let Value::Number(number) = value else {
        return None;
    };
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// 공백이 아닌 JSON 문자열 필드.
pub(crate) fn json_string(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_json_decimal() {
        assert_eq!(json_decimal(&json!(190.12)), Some(dec!(190.12)));
        assert_eq!(json_decimal(&json!(42)), Some(dec!(42)));
        assert_eq!(json_decimal(&json!(1.5e-3)), Some(dec!(0.0015)));
        assert_eq!(json_decimal(&json!("190.12")), None);
        assert_eq!(json_decimal(&Value::Null), None);
    }

    #[test]
    fn test_json_string() {
        let item = json!({"symbol": "  aapl ", "blank": "   ", "n": 1});
        assert_eq!(json_string(&item, "symbol").as_deref(), Some("aapl"));
        assert_eq!(json_string(&item, "blank"), None);
        assert_eq!(json_string(&item, "n"), None);
        assert_eq!(json_string(&item, "missing"), None);
    }
}
