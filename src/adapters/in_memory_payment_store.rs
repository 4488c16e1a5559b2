//! In-memory implementation of PaymentStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Timelike, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{PaymentRecord, PaymentStatus};
use crate::ports::{
    AggregateQuery, GroupKey, GroupRow, GroupSpec, PaymentStore, StatusUpdate, StoreResult,
};

/// Payment log held in process memory.
///
/// Backs local development and tests; grouping mirrors what the Postgres adapter does in SQL.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<Vec<PaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn group_key(record: &PaymentRecord, spec: GroupSpec) -> GroupKey {
    match spec {
        GroupSpec::Status => GroupKey::Status(record.status),
        GroupSpec::Method => GroupKey::Method(record.method),
        GroupSpec::HourOfDay => GroupKey::Hour(record.created_at.hour()),
        GroupSpec::Bucket(period) => GroupKey::Bucket(period.bucket_start(record.created_at)),
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, record: &PaymentRecord) -> StoreResult<Uuid> {
        let mut records = self.records.write().await;
        records.push(record.clone());
        Ok(record.id)
    }

    async fn query_aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<GroupRow>> {
        let records = self.records.read().await;
        let mut groups: BTreeMap<GroupKey, GroupRow> = BTreeMap::new();

        let matching = records
            .iter()
            .filter(|r| r.tenant_id == query.tenant_id && query.range.contains(r.created_at));

        for record in matching {
            let key = group_key(record, query.group);
            let row = groups.entry(key.clone()).or_insert_with(|| GroupRow {
                key,
                count: 0,
                amount: BigDecimal::from(0),
                completed_count: 0,
            });
            row.count += 1;
            row.amount = &row.amount + &record.amount;
            if record.status == PaymentStatus::Completed {
                row.completed_count += 1;
            }
        }

        Ok(groups.into_values().collect())
    }

    async fn list_recent(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<PaymentRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<PaymentRecord> = records
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<StatusUpdate> {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(StatusUpdate::NotFound);
        };
        if record.status == status {
            return Ok(StatusUpdate::Unchanged(record.clone()));
        }

        record.status = status;
        record.updated_at = Utc::now();
        Ok(StatusUpdate::Changed(record.clone()))
    }

    async fn clear(&self) -> StoreResult<u64> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
