use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::clock::ManualClock;
use crate::time::{OperatingTimezone, TimeRange};

pub struct TestConfig {
    pub platform_account_id: Uuid,
    pub operating_utc_offset_minutes: i32,
    pub max_reschedule: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            platform_account_id: Uuid::new_v4(),
            operating_utc_offset_minutes: 0,
            max_reschedule: 3,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.platform_account_id = self.platform_account_id;
        config.operating_utc_offset_minutes = self.operating_utc_offset_minutes;
        config.booking.max_reschedule = self.max_reschedule;
        config
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn timezone(&self) -> OperatingTimezone {
        OperatingTimezone::from_offset_minutes(self.operating_utc_offset_minutes)
    }
}

/// Monday 2030-01-07 08:00 UTC; far enough ahead that fixtures never land in the past.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(fixed_now()))
}

/// First date on or after `from` that falls on `weekday`.
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let mut date = from;
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    date
}

pub fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

pub fn range(raw: &str) -> TimeRange {
    match raw.parse() {
        Ok(range) => range,
        Err(e) => panic!("invalid test time range {}: {}", raw, e),
    }
}
