#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use payment_pulse::adapters::InMemoryPaymentStore;
use payment_pulse::domain::{NewPayment, PaymentMethod, PaymentRecord, PaymentStatus};
use payment_pulse::ports::{
    AggregateQuery, GroupRow, GroupSpec, PaymentStore, StatusUpdate, StoreError, StoreResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub fn payment(
    tenant: &str,
    amount: i64,
    method: PaymentMethod,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
) -> PaymentRecord {
    PaymentRecord {
        id: Uuid::new_v4(),
        tenant_id: tenant.to_string(),
        amount: BigDecimal::from(amount),
        currency: "USD".to_string(),
        method,
        status,
        merchant_id: "merchant_test".to_string(),
        customer_id: "customer_test".to_string(),
        description: None,
        metadata: None,
        created_at,
        updated_at: created_at,
    }
}

pub fn new_payment(tenant: Option<&str>, amount: i64, status: PaymentStatus) -> NewPayment {
    NewPayment {
        tenant_id: tenant.map(str::to_string),
        amount: BigDecimal::from(amount),
        currency: None,
        method: PaymentMethod::CreditCard,
        status,
        merchant_id: "merchant_api".to_string(),
        customer_id: "customer_api".to_string(),
        description: Some("test payment".to_string()),
        metadata: None,
    }
}

/// 7 completed x 100, 2 failed x 200, 1 refunded x 300, all at `at`.
pub async fn seed_scenario(store: &dyn PaymentStore, tenant: &str, at: DateTime<Utc>) {
    for _ in 0..7 {
        store
            .insert(&payment(tenant, 100, PaymentMethod::Paypal, PaymentStatus::Completed, at))
            .await
            .unwrap();
    }
    for _ in 0..2 {
        store
            .insert(&payment(tenant, 200, PaymentMethod::CreditCard, PaymentStatus::Failed, at))
            .await
            .unwrap();
    }
    store
        .insert(&payment(tenant, 300, PaymentMethod::Crypto, PaymentStatus::Refunded, at))
        .await
        .unwrap();
}

/// In-memory store that counts aggregate queries and can be slowed down.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryPaymentStore,
    aggregate_calls: AtomicUsize,
    snapshot_runs: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    /// Each metrics snapshot issues exactly one hour-of-day query.
    pub fn snapshot_runs(&self) -> usize {
        self.snapshot_runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentStore for CountingStore {
    async fn insert(&self, record: &PaymentRecord) -> StoreResult<Uuid> {
        self.inner.insert(record).await
    }

    async fn query_aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<GroupRow>> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        if query.group == GroupSpec::HourOfDay {
            self.snapshot_runs.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.query_aggregate(query).await
    }

    async fn list_recent(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<PaymentRecord>> {
        self.inner.list_recent(tenant_id, limit).await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRecord>> {
        self.inner.get_by_id(id).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> StoreResult<StatusUpdate> {
        self.inner.update_status(id, status).await
    }

    async fn clear(&self) -> StoreResult<u64> {
        self.inner.clear().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Store whose every call fails as unreachable.
pub struct FailingStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl PaymentStore for FailingStore {
    async fn insert(&self, _record: &PaymentRecord) -> StoreResult<Uuid> {
        down()
    }

    async fn query_aggregate(&self, _query: &AggregateQuery) -> StoreResult<Vec<GroupRow>> {
        down()
    }

    async fn list_recent(&self, _tenant_id: &str, _limit: i64) -> StoreResult<Vec<PaymentRecord>> {
        down()
    }

    async fn get_by_id(&self, _id: Uuid) -> StoreResult<Option<PaymentRecord>> {
        down()
    }

    async fn update_status(
        &self,
        _id: Uuid,
        _status: PaymentStatus,
    ) -> StoreResult<StatusUpdate> {
        down()
    }

    async fn clear(&self) -> StoreResult<u64> {
        down()
    }

    async fn ping(&self) -> StoreResult<()> {
        down()
    }
}
