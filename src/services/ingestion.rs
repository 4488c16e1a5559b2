use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{NewPayment, PaymentEvent, PaymentRecord, PaymentStatus};
use crate::ports::{PaymentStore, StatusUpdate, StoreError};
use crate::services::broadcaster::EventBroadcaster;
use crate::services::metrics_service::MetricsService;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid payment: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write path shared by API calls and the simulator:
/// store write, then cache invalidation, then a tenant-scoped event.
pub struct PaymentIngestor {
    store: Arc<dyn PaymentStore>,
    metrics: Arc<MetricsService>,
    broadcaster: Arc<EventBroadcaster>,
}

impl PaymentIngestor {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        metrics: Arc<MetricsService>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            store,
            metrics,
            broadcaster,
        }
    }

    /// Validates and stores a new payment. `fallback_tenant` applies when the payload has none.
    pub async fn ingest(
        &self,
        payment: NewPayment,
        fallback_tenant: &str,
    ) -> Result<PaymentRecord, IngestError> {
        payment.validate().map_err(IngestError::Invalid)?;
        let record = payment.into_record(fallback_tenant, Utc::now());
        Ok(self.record(record).await?)
    }

    pub async fn record(&self, record: PaymentRecord) -> Result<PaymentRecord, StoreError> {
        self.store.insert(&record).await.map_err(|e| {
            tracing::error!(tenant_id = %record.tenant_id, error = %e, "failed to store payment");
            e
        })?;

        tracing::info!(
            payment_id = %record.id,
            tenant_id = %record.tenant_id,
            amount = %record.amount,
            status = %record.status,
            "payment recorded"
        );

        self.metrics.invalidate_cache(&record.tenant_id);
        self.broadcaster.publish(
            PaymentEvent::for_record(record.clone(), Utc::now()),
            Some(&record.tenant_id),
        );
        Ok(record)
    }

    /// Moves a tenant's payment to `status`. Returns `None` when the payment does not exist
    /// for that tenant. An event is published only by the update that actually changed the
    /// status, and only for non-pending statuses.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        // Tenant ownership never changes, so checking it ahead of the write is safe.
        match self.store.get_by_id(id).await? {
            Some(record) if record.tenant_id == tenant_id => {}
            _ => return Ok(None),
        }

        let updated = match self.store.update_status(id, status).await? {
            StatusUpdate::NotFound => return Ok(None),
            StatusUpdate::Unchanged(record) => {
                tracing::debug!(payment_id = %id, tenant_id = %tenant_id, status = %status, "payment status unchanged");
                return Ok(Some(record));
            }
            StatusUpdate::Changed(record) => record,
        };

        tracing::info!(
            payment_id = %id,
            tenant_id = %tenant_id,
            to = %status,
            "payment status updated"
        );

        self.metrics.invalidate_cache(tenant_id);
        if status != PaymentStatus::Pending {
            self.broadcaster.publish(
                PaymentEvent::for_record(updated.clone(), Utc::now()),
                Some(tenant_id),
            );
        }
        Ok(Some(updated))
    }
}
