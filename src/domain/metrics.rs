use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::payment::PaymentMethod;

/// Inclusive time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Rolling summary for one tenant over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_volume: BigDecimal,
    pub success_rate: f64,
    pub average_amount: BigDecimal,
    pub peak_hour: Option<u32>,
    pub top_payment_method: Option<PaymentMethod>,
    pub total_transactions: u64,
    pub failed_transactions: u64,
    pub refunded_transactions: u64,
    pub period: TimeWindow,
}

/// One bucket of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub amount: BigDecimal,
    pub success_rate: f64,
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
