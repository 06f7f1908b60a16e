//! 장 운영 시간 게이트.
//!
//! 예약 실행이 진행될지 여부만 판단하는 순수 함수입니다.
//! 공휴일은 고려하지 않습니다.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::MarketHoursConfig;

/// 거래소 현지 시각 기준으로 장이 열려 있는지 확인합니다.
///
/// 토/일요일은 항상 `false`이며, 평일에는 `[open, close]` 구간(양 끝 포함)을
/// 초 단위로 비교합니다.
pub fn is_open(now: DateTime<Utc>, tz: Tz, open: NaiveTime, close: NaiveTime) -> bool {
    let local = now.with_timezone(&tz);

    // 주말 체크
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let time = local.time();
    let Some(time) = NaiveTime::from_hms_opt(time.hour(), time.minute(), time.second()) else {
        return false;
    };

    time >= open && time <= close
}

/// 설정을 묶은 장 운영 시간 게이트.
#[derive(Debug, Clone)]
pub struct MarketHoursGate {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    bypass: bool,
}

impl MarketHoursGate {
    pub fn new(config: &MarketHoursConfig) -> Self {
        Self {
            tz: config.timezone,
            open: config.open,
            close: config.close,
            bypass: config.bypass,
        }
    }

    /// 실행 허용 여부. 우회 플래그가 켜져 있으면 항상 허용합니다.
    pub fn allows(&self, now: DateTime<Utc>) -> bool {
        self.bypass || is_open(now, self.tz, self.open, self.close)
    }
}
