//! 롤링 피처 계산 (FeatureEngine).
//!
//! # 지원 피처
//! - **ma**: 단순 이동평균 (SMA)
//! - **vol**: 변동성 (모표준편차, 분모 = window)
//! - **pct_change**: 직전 포인트 대비 변화율
//!
//! # 순서 규칙
//! 계산은 시각 오름차순 시계열에서 수행하고, 결과는 표시를 위해 시각 내림차순으로 반환합니다.
//!
//! # 사용 예시
//!
//! ```ignore
//! use market_analytics::{FeatureEngine, FeatureSet};
//!
//! let points = FeatureEngine::new().compute(quotes, &FeatureSet::all(), 20)?;
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use market_core::{FeaturePoint, QuotePoint};

/// 피처 계산 오류.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),

    /// 알 수 없는 피처 이름
    #[error("알 수 없는 피처: {0}")]
    UnknownFeature(String),
}

/// 계산 가능한 피처 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// 단순 이동평균 ("ma")
    Ma,
    /// 변동성 ("vol")
    Vol,
    /// 변화율 ("pct_change")
    PctChange,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Ma, Feature::Vol, Feature::PctChange];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ma => "ma",
            Self::Vol => "vol",
            Self::PctChange => "pct_change",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ma" => Ok(Self::Ma),
            "vol" => Ok(Self::Vol),
            "pct_change" => Ok(Self::PctChange),
            other => Err(FeatureError::UnknownFeature(other.to_string())),
        }
    }
}

/// 요청된 피처 집합.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureSet {
    ma: bool,
    vol: bool,
    pct_change: bool,
}

impl FeatureSet {
    /// 모든 피처.
    pub fn all() -> Self {
        Self {
            ma: true,
            vol: true,
            pct_change: true,
        }
    }

    /// 피처 이름 목록에서 집합을 구성합니다. 알 수 없는 이름은 무시합니다.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| name.as_ref().parse::<Feature>().ok())
            .fold(Self::default(), |set, feature| set.with(feature))
    }

    #[must_use]
    pub fn with(mut self, feature: Feature) -> Self {
        match feature {
            Feature::Ma => self.ma = true,
            Feature::Vol => self.vol = true,
            Feature::PctChange => self.pct_change = true,
        }
        self
    }

    pub fn contains(&self, feature: Feature) -> bool {
        match feature {
            Feature::Ma => self.ma,
            Feature::Vol => self.vol,
            Feature::PctChange => self.pct_change,
        }
    }
}

/// 롤링 피처 계산기.
#[derive(Debug, Default)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// 시세 시계열에 피처를 계산합니다.
    ///
    /// # 인자
    /// * `quotes` - 순서와 무관한 시세 포인트
    /// * `features` - 계산할 피처
    /// * `window` - 이동 구간 크기 (1 이상)
    ///
    /// # 반환
    /// 입력과 같은 개수의 피처 포인트 (시각 내림차순).
    /// 정의되지 않는 값은 `None`입니다.
    pub fn compute(
        &self,
        mut quotes: Vec<QuotePoint>,
        features: &FeatureSet,
        window: usize,
    ) -> Result<Vec<FeaturePoint>, FeatureError> {
        if window == 0 {
            return Err(FeatureError::InvalidParameter(
                "window는 0보다 커야 합니다".to_string(),
            ));
        }

        quotes.sort_by_key(|q| q.as_of_utc);

        let prices: Vec<Decimal> = quotes.iter().map(|q| q.price).collect();
        let mut output: Vec<FeaturePoint> = Vec::with_capacity(quotes.len());

        for (i, quote) in quotes.iter().enumerate() {
            let mut point = FeaturePoint::from(*quote);

            if i + 1 >= window {
                let slice = &prices[i + 1 - window..=i];
                if features.contains(Feature::Ma) {
                    point.sma = sma(slice);
                }
                if features.contains(Feature::Vol) {
                    point.volatility = population_std_dev(slice);
                }
            }

            if features.contains(Feature::PctChange) && i > 0 {
                point.pct_change = pct_change(prices[i - 1], prices[i]);
            }

            output.push(point);
        }

        output.sort_by(|a, b| b.as_of_utc.cmp(&a.as_of_utc));
        Ok(output)
    }
}

/// SMA = (P1 + ... + Pn) / n
fn sma(window: &[Decimal]) -> Option<f64> {
    let sum: Decimal = window.iter().sum();
    sum.checked_div(Decimal::from(window.len()))?.to_f64()
}

/// σ = sqrt(Σ(p - μ)² / n)
fn population_std_dev(window: &[Decimal]) -> Option<f64> {
    let values: Vec<f64> = window.iter().map(|p| p.to_f64()).collect::<Option<_>>()?;
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// 직전 가격이 0이면 정의되지 않음
fn pct_change(previous: Decimal, current: Decimal) -> Option<f64> {
    if previous.is_zero() {
        return None;
    }
    (current - previous).checked_div(previous)?.to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    const EPS: f64 = 1e-3;

    fn series(prices: &[Decimal]) -> Vec<QuotePoint> {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| QuotePoint::new(start + Duration::minutes(i as i64), *p))
            .collect()
    }

    /// 내림차순 결과를 오름차순으로 되돌려 인덱스 비교를 쉽게 한다
    fn ascending(mut points: Vec<FeaturePoint>) -> Vec<FeaturePoint> {
        points.reverse();
        points
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("값이 있어야 함");
        assert!((value - expected).abs() < EPS, "{value} != {expected}");
    }

    #[test]
    fn test_reference_series_window_two() {
        let quotes = series(&[dec!(10), dec!(12), dec!(11), dec!(13)]);
        let points = ascending(FeatureEngine::new().compute(quotes, &FeatureSet::all(), 2).unwrap());

        assert_eq!(points[0].sma, None);
        assert_close(points[1].sma, 11.0);
        assert_close(points[2].sma, 11.5);
        assert_close(points[3].sma, 12.0);

        assert_eq!(points[0].volatility, None);
        assert_close(points[1].volatility, 1.0);
        assert_close(points[2].volatility, 0.5);
        assert_close(points[3].volatility, 1.0);

        assert_eq!(points[0].pct_change, None);
        assert_close(points[1].pct_change, 0.2);
        assert_close(points[2].pct_change, -0.0833);
        assert_close(points[3].pct_change, 0.1818);
    }

    #[test]
    fn test_output_is_descending_even_for_unsorted_input() {
        let mut quotes = series(&[dec!(1), dec!(2), dec!(3)]);
        quotes.swap(0, 2);

        let points = FeatureEngine::new().compute(quotes, &FeatureSet::all(), 2).unwrap();

        assert_eq!(points[0].price, dec!(3));
        assert_eq!(points[2].price, dec!(1));
        // 오름차순 기준으로 계산되었는지 확인: 최신 포인트의 변화율은 (3-2)/2
        assert_close(points[0].pct_change, 0.5);
    }

    #[test]
    fn test_unrequested_features_stay_absent() {
        let quotes = series(&[dec!(10), dec!(12), dec!(11)]);
        let set = FeatureSet::from_names(["pct_change", "bogus"]);

        let points = FeatureEngine::new().compute(quotes, &set, 1).unwrap();

        assert!(points.iter().all(|p| p.sma.is_none() && p.volatility.is_none()));
        assert!(points[0].pct_change.is_some());
    }

    #[test]
    fn test_pct_change_undefined_after_zero_price() {
        let quotes = series(&[dec!(0), dec!(5), dec!(10)]);
        let points = ascending(FeatureEngine::new().compute(quotes, &FeatureSet::all(), 5).unwrap());

        assert_eq!(points[1].pct_change, None);
        assert_close(points[2].pct_change, 1.0);
        assert!(points.iter().all(|p| p.sma.is_none()));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = FeatureEngine::new()
            .compute(series(&[dec!(1)]), &FeatureSet::all(), 0)
            .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameter(_)));
    }

    #[test]
    fn test_empty_input() {
        let points = FeatureEngine::new().compute(Vec::new(), &FeatureSet::all(), 3).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.as_str().parse::<Feature>().unwrap(), feature);
        }
        assert_eq!(FeatureSet::from_names(Vec::<String>::new()), FeatureSet::default());
    }

    proptest! {
        #[test]
        fn prop_shape_and_definedness(
            raw in prop::collection::vec(0u32..100_000, 0..60),
            window in 1usize..12,
        ) {
            let prices: Vec<Decimal> = raw.iter().map(|p| Decimal::new(i64::from(*p), 2)).collect();
            let mut quotes = series(&prices);
            quotes.reverse();

            let points = FeatureEngine::new().compute(quotes, &FeatureSet::all(), window).unwrap();
            prop_assert_eq!(points.len(), prices.len());

            for pair in points.windows(2) {
                prop_assert!(pair[0].as_of_utc > pair[1].as_of_utc);
            }

            let asc = ascending(points);
            for (i, point) in asc.iter().enumerate() {
                prop_assert_eq!(point.sma.is_some(), i + 1 >= window);
                prop_assert_eq!(point.volatility.is_some(), i + 1 >= window);
                prop_assert_eq!(point.pct_change.is_some(), i > 0 && !prices[i - 1].is_zero());
            }
        }
    }
}
