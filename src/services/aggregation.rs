//! Windowed aggregation over the payment log.
//!
//! The store does the grouping; this module only combines grouped rows into snapshots and
//! trend series.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::metrics::ratio;
use crate::domain::{MetricsSnapshot, PaymentMethod, PaymentStatus, TimeWindow, TrendPeriod, TrendPoint};
use crate::ports::{AggregateQuery, GroupKey, GroupRow, GroupSpec, PaymentStore};
use crate::services::metrics_service::MetricsError;

pub struct AggregationEngine {
    store: Arc<dyn PaymentStore>,
    zero_fill: bool,
}

impl AggregationEngine {
    /// `zero_fill` emits a point for every bucket in a trend window, including empty ones.
    pub fn new(store: Arc<dyn PaymentStore>, zero_fill: bool) -> Self {
        Self { store, zero_fill }
    }

    pub async fn compute_metrics(
        &self,
        tenant_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsSnapshot, MetricsError> {
        // Every count and amount comes from the one status-grouped read, so the snapshot is
        // internally consistent even when writes land between the three queries.
        let by_status = AggregateQuery::new(tenant_id, window, GroupSpec::Status);
        let by_method = AggregateQuery::new(tenant_id, window, GroupSpec::Method);
        let by_hour = AggregateQuery::new(tenant_id, window, GroupSpec::HourOfDay);

        let (by_status, by_method, by_hour) = tokio::try_join!(
            self.store.query_aggregate(&by_status),
            self.store.query_aggregate(&by_method),
            self.store.query_aggregate(&by_hour),
        )
        .map_err(|e| {
            tracing::error!(tenant_id = %tenant_id, error = %e, "metrics aggregation failed");
            MetricsError::from(e)
        })?;

        let (total, total_amount) = totals(&by_status);
        let (completed, volume) = status_totals(&by_status, PaymentStatus::Completed);

        Ok(MetricsSnapshot {
            total_volume: volume,
            success_rate: ratio(completed, total),
            average_amount: average(&total_amount, total),
            peak_hour: peak_hour(&by_hour),
            top_payment_method: top_method(&by_method),
            total_transactions: total,
            failed_transactions: status_totals(&by_status, PaymentStatus::Failed).0,
            refunded_transactions: status_totals(&by_status, PaymentStatus::Refunded).0,
            period: window,
        })
    }

    pub async fn compute_trends(
        &self,
        tenant_id: &str,
        period: TrendPeriod,
    ) -> Result<Vec<TrendPoint>, MetricsError> {
        self.compute_trends_at(tenant_id, period, Utc::now()).await
    }

    /// Trend series for the window ending at `now`.
    pub async fn compute_trends_at(
        &self,
        tenant_id: &str,
        period: TrendPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>, MetricsError> {
        let window = TimeWindow::trailing(now, period.lookback());
        let query = AggregateQuery::new(tenant_id, window, GroupSpec::Bucket(period));
        let rows = self.store.query_aggregate(&query).await.map_err(|e| {
            tracing::error!(tenant_id = %tenant_id, period = %period, error = %e, "trend aggregation failed");
            MetricsError::from(e)
        })?;

        let points = trend_points(&rows);
        if self.zero_fill {
            Ok(fill_empty_buckets(points, period, window))
        } else {
            Ok(points)
        }
    }
}

fn totals(rows: &[GroupRow]) -> (u64, BigDecimal) {
    rows.iter()
        .fold((0, BigDecimal::zero()), |(count, amount), row| {
            (count + row.count, amount + &row.amount)
        })
}

fn status_totals(rows: &[GroupRow], status: PaymentStatus) -> (u64, BigDecimal) {
    rows.iter()
        .find(|row| row.key == GroupKey::Status(status))
        .map_or((0, BigDecimal::zero()), |row| (row.count, row.amount.clone()))
}

fn average(sum: &BigDecimal, count: u64) -> BigDecimal {
    if count == 0 {
        return BigDecimal::zero();
    }
    (sum.clone() / BigDecimal::from(count)).round(2)
}

/// Busiest UTC hour; ties go to the earliest hour.
pub fn peak_hour(rows: &[GroupRow]) -> Option<u32> {
    let mut best: Option<(u32, u64)> = None;
    for row in rows {
        let GroupKey::Hour(hour) = row.key else {
            continue;
        };
        if row.count == 0 {
            continue;
        }
        best = match best {
            Some((h, c)) if c > row.count || (c == row.count && h < hour) => Some((h, c)),
            _ => Some((hour, row.count)),
        };
    }
    best.map(|(hour, _)| hour)
}

/// Most used method; ties go to the one listed first in `PaymentMethod::ALL`.
pub fn top_method(rows: &[GroupRow]) -> Option<PaymentMethod> {
    let count_for = |method: PaymentMethod| {
        rows.iter()
            .filter(|row| row.key == GroupKey::Method(method))
            .map(|row| row.count)
            .sum::<u64>()
    };

    let mut best: Option<(PaymentMethod, u64)> = None;
    for method in PaymentMethod::ALL {
        let count = count_for(method);
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((method, count));
        }
    }
    best.map(|(method, _)| method)
}

pub fn trend_points(rows: &[GroupRow]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = rows
        .iter()
        .filter_map(|row| match row.key {
            GroupKey::Bucket(timestamp) => Some(TrendPoint {
                timestamp,
                count: row.count,
                amount: row.amount.clone(),
                success_rate: ratio(row.completed_count, row.count),
            }),
            _ => None,
        })
        .collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

/// Adds zero points for every bucket in `window` that has no data.
pub fn fill_empty_buckets(
    points: Vec<TrendPoint>,
    period: TrendPeriod,
    window: TimeWindow,
) -> Vec<TrendPoint> {
    let mut by_bucket: BTreeMap<DateTime<Utc>, TrendPoint> =
        points.into_iter().map(|p| (p.timestamp, p)).collect();

    let mut bucket = Some(period.bucket_start(window.start));
    while let Some(start) = bucket.filter(|b| *b <= window.end) {
        by_bucket.entry(start).or_insert_with(|| TrendPoint {
            timestamp: start,
            count: 0,
            amount: BigDecimal::zero(),
            success_rate: 0.0,
        });
        bucket = period.next_bucket(start);
    }

    by_bucket.into_values().collect()
}
