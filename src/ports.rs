//! Storage port for payment records.
//! The aggregation engine only ever talks to storage through `PaymentStore`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{PaymentMethod, PaymentRecord, PaymentStatus, TimeWindow, TrendPeriod};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Grouping applied by `query_aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSpec {
    Status,
    Method,
    HourOfDay,
    Bucket(TrendPeriod),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    Status(PaymentStatus),
    Method(PaymentMethod),
    Hour(u32),
    Bucket(DateTime<Utc>),
}

/// One aggregated group: how many records, their summed amount, and how many completed.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupKey,
    pub count: u64,
    pub amount: BigDecimal,
    pub completed_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub tenant_id: String,
    pub range: TimeWindow,
    pub group: GroupSpec,
}

impl AggregateQuery {
    pub fn new(tenant_id: &str, range: TimeWindow, group: GroupSpec) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            range,
            group,
        }
    }
}

/// Outcome of `PaymentStore::update_status`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    NotFound,
    /// The record already had the requested status; nothing was written.
    Unchanged(PaymentRecord),
    Changed(PaymentRecord),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, record: &PaymentRecord) -> StoreResult<Uuid>;

    /// Groups matching records (tenant + inclusive time range).
    /// Groups with no records are not returned.
    async fn query_aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<GroupRow>>;

    /// Newest first.
    async fn list_recent(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<PaymentRecord>>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRecord>>;

    /// Writes `status` only when it differs from the stored one. The comparison and the
    /// write happen atomically, so concurrent updates to the same status change it once.
    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<StatusUpdate>;

    /// Administrative bulk clear. Returns the number of deleted records.
    async fn clear(&self) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}
