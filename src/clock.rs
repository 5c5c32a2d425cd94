use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
#[cfg(test)]
use std::sync::Mutex;

/// Source of "now" for every age computation
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Midnight UTC of the day containing `at`
pub fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Start of the UTC day `days` days before `now`; the inclusive lower bound of a trailing window
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    start_of_day(now - Duration::days(days))
}

/// ISO week identifier, e.g. `2025-W01`. Uses the ISO week-year.
pub fn week_key(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_week_key_mid_year() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        assert_eq!(week_key(at), "2024-W10");
    }

    #[test]
    fn test_week_key_year_boundaries() {
        // Friday Jan 1 2021 belongs to the last ISO week of 2020
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(week_key(at), "2020-W53");

        // Monday Dec 30 2024 starts ISO week 1 of 2025
        let at = Utc.with_ymd_and_hms(2024, 12, 30, 23, 59, 59).unwrap();
        assert_eq!(week_key(at), "2025-W01");
    }

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 45, 0).unwrap();
        assert_eq!(
            window_start(now, 7),
            Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap()
        );
        assert_eq!(start_of_day(now), Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::days(100));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap());
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
