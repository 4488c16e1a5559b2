use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payment::{PaymentRecord, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    PaymentReceived,
    PaymentFailed,
    PaymentRefunded,
}

impl PaymentEventType {
    pub fn for_status(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Failed => PaymentEventType::PaymentFailed,
            PaymentStatus::Refunded => PaymentEventType::PaymentRefunded,
            PaymentStatus::Pending | PaymentStatus::Completed => PaymentEventType::PaymentReceived,
        }
    }
}

/// Live notification pushed to subscribers. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: PaymentEventType,
    pub payment: PaymentRecord,
    pub timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn for_record(payment: PaymentRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: PaymentEventType::for_status(payment.status),
            payment,
            timestamp,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.payment.tenant_id
    }
}
