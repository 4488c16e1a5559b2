use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{MetricsSnapshot, TimeWindow, TrendPeriod, TrendPoint};
use crate::ports::{PaymentStore, StoreError};
use crate::services::aggregation::AggregationEngine;
use crate::services::cache::{CacheKey, ResultCache};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    #[error("payment store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub metrics_ttl: Duration,
    pub trends_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            metrics_ttl: Duration::from_secs(30),
            trends_ttl: Duration::from_secs(60),
        }
    }
}

/// Read-through access to tenant metrics and trends.
pub struct MetricsService {
    engine: Arc<AggregationEngine>,
    snapshots: ResultCache<MetricsSnapshot, MetricsError>,
    trends: ResultCache<Vec<TrendPoint>, MetricsError>,
    policy: CachePolicy,
}

impl MetricsService {
    pub fn new(engine: AggregationEngine, policy: CachePolicy) -> Self {
        Self {
            engine: Arc::new(engine),
            snapshots: ResultCache::new(),
            trends: ResultCache::new(),
            policy,
        }
    }

    pub fn with_store(store: Arc<dyn PaymentStore>, zero_fill: bool, policy: CachePolicy) -> Self {
        Self::new(AggregationEngine::new(store, zero_fill), policy)
    }

    /// Summary over the trailing 24 hours.
    pub async fn get_metrics(&self, tenant_id: &str) -> Result<MetricsSnapshot, MetricsError> {
        let engine = Arc::clone(&self.engine);
        let tenant = tenant_id.to_string();

        self.snapshots
            .get_or_compute(CacheKey::metrics(tenant_id), self.policy.metrics_ttl, move || async move {
                let window = TimeWindow::trailing(Utc::now(), ChronoDuration::hours(24));
                engine.compute_metrics(&tenant, window).await
            })
            .await
    }

    pub async fn get_trends(
        &self,
        tenant_id: &str,
        period: TrendPeriod,
    ) -> Result<Vec<TrendPoint>, MetricsError> {
        let engine = Arc::clone(&self.engine);
        let tenant = tenant_id.to_string();

        self.trends
            .get_or_compute(
                CacheKey::trends(tenant_id, period),
                self.policy.trends_ttl,
                move || async move { engine.compute_trends(&tenant, period).await },
            )
            .await
    }

    /// Drops the tenant's metrics entry and all of its trend entries.
    pub fn invalidate_cache(&self, tenant_id: &str) {
        self.snapshots.invalidate_tenant(tenant_id);
        self.trends.invalidate_tenant(tenant_id);
        tracing::debug!(tenant_id = %tenant_id, "metrics cache invalidated");
    }

    pub fn purge_expired(&self) -> usize {
        self.snapshots.purge_expired() + self.trends.purge_expired()
    }

    pub fn cached_entries(&self) -> usize {
        self.snapshots.len() + self.trends.len()
    }

    /// Periodically purges expired entries until `shutdown` flips to true.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = every.as_secs(), "cache sweeper started");
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = self.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "expired cache entries purged");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("cache sweeper stopped");
        })
    }
}
