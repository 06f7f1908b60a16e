//! 티커 심볼 정의.
//!
//! 모든 심볼은 앞뒤 공백을 제거하고 대문자로 정규화된 상태로만 존재합니다.
//! 공백뿐인 문자열은 심볼이 아닙니다.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 정규화된 티커 심볼 (예: "AAPL", "BRK.B").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 원시 문자열을 정규화하여 심볼을 생성합니다.
    ///
    /// 공백 제거 후 비어 있으면 `None`을 반환합니다.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_uppercase()))
        }
    }

    /// 심볼 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 내부 문자열을 소유권과 함께 반환합니다.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Symbol::parse(&raw).ok_or_else(|| serde::de::Error::custom("빈 심볼"))
    }
}

/// 원시 문자열 목록을 정규화하고 첫 등장 순서를 유지하며 중복을 제거합니다.
///
/// 공백 문자열은 버려집니다. 대소문자만 다른 항목은 같은 심볼로 취급됩니다.
pub fn dedup_symbols<I, S>(raw: I) -> Vec<Symbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|s| Symbol::parse(s.as_ref()))
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol.to_string(), "AAPL");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(Symbol::parse("").is_none());
        assert!(Symbol::parse("   ").is_none());
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let symbols = dedup_symbols(["msft", "AAPL", " Msft", "", "nvda", "aapl"]);
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["MSFT", "AAPL", "NVDA"]);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let symbol: Symbol = serde_json::from_str("\" tsla\"").unwrap();
        assert_eq!(symbol.as_str(), "TSLA");
        assert!(serde_json::from_str::<Symbol>("\"  \"").is_err());
    }
}
