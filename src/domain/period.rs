//! Trend periods and bucket arithmetic. All buckets are aligned in UTC.

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid trend period: {0}")]
pub struct InvalidPeriod(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendPeriod {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl TrendPeriod {
    pub const ALL: [TrendPeriod; 4] = [
        TrendPeriod::Hour,
        TrendPeriod::Day,
        TrendPeriod::Week,
        TrendPeriod::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Hour => "hour",
            TrendPeriod::Day => "day",
            TrendPeriod::Week => "week",
            TrendPeriod::Month => "month",
        }
    }

    /// How far back a trend query for this period reaches.
    pub fn lookback(&self) -> Duration {
        match self {
            TrendPeriod::Hour => Duration::hours(24),
            TrendPeriod::Day => Duration::days(7),
            TrendPeriod::Week => Duration::days(30),
            TrendPeriod::Month => Duration::days(365),
        }
    }

    /// Parses a caller-supplied period, falling back to `Day` when it is missing or unknown.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            None => TrendPeriod::default(),
            Some(value) => value.parse().unwrap_or_else(|e: InvalidPeriod| {
                tracing::warn!("{}, falling back to {}", e, TrendPeriod::default());
                TrendPeriod::default()
            }),
        }
    }

    /// Start of the bucket containing `ts`. Weeks start on Monday.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let hour = ts
            - Duration::minutes(i64::from(ts.minute()))
            - Duration::seconds(i64::from(ts.second()))
            - Duration::nanoseconds(i64::from(ts.nanosecond()));
        if *self == TrendPeriod::Hour {
            return hour;
        }

        let day = hour - Duration::hours(i64::from(ts.hour()));
        match self {
            TrendPeriod::Week => day - Duration::days(i64::from(ts.weekday().num_days_from_monday())),
            TrendPeriod::Month => day - Duration::days(i64::from(ts.day0())),
            _ => day,
        }
    }

    /// Start of the bucket following the one that starts at `bucket`.
    pub fn next_bucket(&self, bucket: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TrendPeriod::Hour => bucket.checked_add_signed(Duration::hours(1)),
            TrendPeriod::Day => bucket.checked_add_signed(Duration::days(1)),
            TrendPeriod::Week => bucket.checked_add_signed(Duration::weeks(1)),
            TrendPeriod::Month => bucket.checked_add_months(Months::new(1)),
        }
    }
}

impl fmt::Display for TrendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendPeriod {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TrendPeriod::ALL
            .into_iter()
            .find(|period| period.as_str() == wanted)
            .ok_or_else(|| InvalidPeriod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    #[test]
    fn unknown_period_falls_back_to_day() {
        assert_eq!(TrendPeriod::parse_or_default(Some("fortnight")), TrendPeriod::Day);
        assert_eq!(TrendPeriod::parse_or_default(None), TrendPeriod::Day);
        assert_eq!(TrendPeriod::parse_or_default(Some("MONTH")), TrendPeriod::Month);
    }

    #[test]
    fn hour_and_day_buckets_truncate() {
        let t = ts(2024, 3, 14, 15, 42, 7);
        assert_eq!(TrendPeriod::Hour.bucket_start(t), ts(2024, 3, 14, 15, 0, 0));
        assert_eq!(TrendPeriod::Day.bucket_start(t), ts(2024, 3, 14, 0, 0, 0));
    }

    #[test]
    fn week_bucket_starts_on_monday() {
        // 2024-03-14 is a Thursday.
        let t = ts(2024, 3, 14, 9, 0, 0);
        assert_eq!(TrendPeriod::Week.bucket_start(t), ts(2024, 3, 11, 0, 0, 0));
        let monday = ts(2024, 3, 11, 0, 0, 0);
        assert_eq!(TrendPeriod::Week.bucket_start(monday), monday);
    }

    #[test]
    fn month_bucket_and_next() {
        let t = ts(2024, 1, 31, 23, 59, 59);
        let start = TrendPeriod::Month.bucket_start(t);
        assert_eq!(start, ts(2024, 1, 1, 0, 0, 0));
        assert_eq!(TrendPeriod::Month.next_bucket(start), Some(ts(2024, 2, 1, 0, 0, 0)));
    }

    #[test]
    fn lookbacks_are_fixed() {
        assert_eq!(TrendPeriod::Hour.lookback(), Duration::hours(24));
        assert_eq!(TrendPeriod::Week.lookback(), Duration::days(30));
        assert_eq!(TrendPeriod::Month.lookback(), Duration::days(365));
    }

    #[test]
    fn every_period_round_trips_and_buckets_advance() {
        let t = ts(2024, 3, 14, 15, 42, 7);
        for period in TrendPeriod::ALL {
            assert_eq!(period.as_str().parse::<TrendPeriod>(), Ok(period));

            let start = period.bucket_start(t);
            assert!(start <= t);
            assert_eq!(period.bucket_start(start), start);

            let next = period.next_bucket(start).unwrap();
            assert!(next > t);
            assert_eq!(period.bucket_start(next), next);
            assert!(t - period.lookback() < start);
        }
    }
}
