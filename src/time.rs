use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Asia::Ho_Chi_Minh;

use crate::dates::format_date;

/// Results are not final before 18:13 civil time.
pub const DRAW_CUTOFF: (u32, u32) = (18, 13);
/// Live draw window, inclusive on both ends.
pub const LIVE_WINDOW_START: (u32, u32) = (18, 13);
pub const LIVE_WINDOW_END: (u32, u32) = (18, 35);

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    instant: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    /// Builds a clock pinned to a Vietnam wall-clock time.
    pub fn at_civil(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        Ho_Chi_Minh
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(|t| Self::new(t.with_timezone(&Utc)))
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.instant.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        match self.instant.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Wall-clock reading in Asia/Ho_Chi_Minh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl CivilTime {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    fn minutes_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// Resolves the draw calendar from a [`Clock`], independent of host timezone.
#[derive(Clone)]
pub struct TimeService {
    clock: Arc<dyn Clock>,
}

impl Default for TimeService {
    fn default() -> Self {
        Self::system()
    }
}

impl TimeService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn now(&self) -> CivilTime {
        let local = self.clock.now_utc().with_timezone(&Ho_Chi_Minh);
        CivilTime {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    /// Epoch milliseconds, used for `lastUpdated`.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_utc().timestamp_millis()
    }

    pub fn current_date(&self) -> NaiveDate {
        self.clock.now_utc().with_timezone(&Ho_Chi_Minh).date_naive()
    }

    pub fn current_date_string(&self) -> String {
        format_date(self.current_date())
    }

    /// Yesterday before the 18:13 cutoff, today from then on.
    pub fn default_date_string(&self) -> String {
        let now = self.now();
        let today = self.current_date();
        let cutoff = DRAW_CUTOFF.0 * 60 + DRAW_CUTOFF.1;

        if now.minutes_of_day() < cutoff {
            let yesterday = today.pred_opt().unwrap_or(today);
            format_date(yesterday)
        } else {
            format_date(today)
        }
    }

    pub fn is_live_window(&self) -> bool {
        let now = self.now();
        now.hour == LIVE_WINDOW_START.0
            && now.minute >= LIVE_WINDOW_START.1
            && now.minute <= LIVE_WINDOW_END.1
    }

    /// True when `date` is today and the draw is in progress.
    pub fn is_live_for(&self, date: &str) -> bool {
        self.is_live_window() && date == self.current_date_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_at(hour: u32, minute: u32) -> TimeService {
        let clock = FixedClock::at_civil(2024, 5, 10, hour, minute).unwrap();
        TimeService::new(Arc::new(clock))
    }

    #[test]
    fn civil_time_ignores_host_timezone() {
        // 23:30 UTC is already the next morning in Vietnam.
        let utc = Utc.with_ymd_and_hms(2024, 5, 9, 23, 30, 0).unwrap();
        let time = TimeService::new(Arc::new(FixedClock::new(utc)));

        let now = time.now();
        assert_eq!((now.year, now.month, now.day), (2024, 5, 10));
        assert_eq!((now.hour, now.minute), (6, 30));
        assert_eq!(time.current_date_string(), "2024-05-10");
    }

    #[test]
    fn default_date_is_yesterday_before_cutoff() {
        assert_eq!(service_at(18, 12).default_date_string(), "2024-05-09");
        assert_eq!(service_at(0, 5).default_date_string(), "2024-05-09");
    }

    #[test]
    fn default_date_is_today_from_cutoff() {
        assert_eq!(service_at(18, 13).default_date_string(), "2024-05-10");
        assert_eq!(service_at(23, 59).default_date_string(), "2024-05-10");
    }

    #[test]
    fn default_date_crosses_month_boundary() {
        let clock = FixedClock::at_civil(2024, 3, 1, 9, 0).unwrap();
        let time = TimeService::new(Arc::new(clock));
        assert_eq!(time.default_date_string(), "2024-02-29");
    }

    #[test]
    fn live_window_bounds() {
        assert!(service_at(18, 13).is_live_window());
        assert!(service_at(18, 20).is_live_window());
        assert!(service_at(18, 35).is_live_window());
        assert!(!service_at(18, 12).is_live_window());
        assert!(!service_at(18, 36).is_live_window());
        assert!(!service_at(17, 59).is_live_window());
        assert!(!service_at(19, 20).is_live_window());
    }

    #[test]
    fn live_for_requires_today() {
        let time = service_at(18, 20);
        assert!(time.is_live_for("2024-05-10"));
        assert!(!time.is_live_for("2024-05-09"));
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = Arc::new(FixedClock::at_civil(2024, 5, 10, 18, 35).unwrap());
        let time = TimeService::new(clock.clone());
        assert!(time.is_live_window());

        clock.advance(Duration::minutes(1));
        assert!(!time.is_live_window());
    }
}
