//! Payment domain entity.
//! Framework-agnostic representation of a tenant's payment record.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
    Crypto,
}

impl PaymentMethod {
    /// Fixed enumeration order. Also the tie-break order for top-method selection.
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Paypal,
        PaymentMethod::BankTransfer,
        PaymentMethod::Crypto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Crypto => "crypto",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown payment method: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Persisted payment. Only `status` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub tenant_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub merchant_id: String,
    pub customer_id: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a payment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub amount: BigDecimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub merchant_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(tenant_id) = &self.tenant_id {
            if tenant_id.trim().is_empty() {
                return Err("tenant_id must not be empty".to_string());
            }
        }
        if self.amount <= BigDecimal::zero() {
            return Err("amount must be positive".to_string());
        }
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(format!("invalid currency code: {}", currency));
            }
        }
        if self.merchant_id.trim().is_empty() {
            return Err("merchant_id must not be empty".to_string());
        }
        if self.customer_id.trim().is_empty() {
            return Err("customer_id must not be empty".to_string());
        }
        if let Some(metadata) = &self.metadata {
            if !metadata.is_object() {
                return Err("metadata must be a JSON object".to_string());
            }
        }
        Ok(())
    }

    /// Materializes the record. `fallback_tenant` is used when the payload carries none.
    pub fn into_record(self, fallback_tenant: &str, now: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id.unwrap_or_else(|| fallback_tenant.to_string()),
            amount: self.amount,
            currency: self
                .currency
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            method: self.method,
            status: self.status,
            merchant_id: self.merchant_id,
            customer_id: self.customer_id,
            description: self.description,
            metadata: self.metadata,
            created_at: now,
            updated_at: now,
        }
    }
}
