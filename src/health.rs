use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::ports::PaymentStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_subscribers: usize,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> DependencyStatus;
}

pub struct StoreChecker {
    store: Arc<dyn PaymentStore>,
}

impl StoreChecker {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DependencyChecker for StoreChecker {
    fn name(&self) -> &'static str {
        "payment_store"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.store.ping().await {
            Ok(()) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: e.to_string(),
            },
        }
    }
}

pub async fn check_health(
    checker: &dyn DependencyChecker,
    start_time: Instant,
    active_subscribers: usize,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let status = timeout(timeout_duration, checker.check())
        .await
        .unwrap_or_else(|_| DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: "timeout".to_string(),
        });

    let overall = match status {
        DependencyStatus::Healthy { .. } => "healthy",
        DependencyStatus::Unhealthy { .. } => "unhealthy",
    };

    let mut dependencies = HashMap::new();
    dependencies.insert(checker.name().to_string(), status);

    HealthResponse {
        status: overall.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        active_subscribers,
        dependencies,
    }
}
