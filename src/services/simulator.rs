//! Synthetic payment traffic for demos and local runs.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::payment::DEFAULT_CURRENCY;
use crate::domain::{PaymentMethod, PaymentRecord, PaymentStatus};
use crate::services::ingestion::PaymentIngestor;

const MIN_AMOUNT: i64 = 100;
const MAX_AMOUNT: i64 = 5_100;
const SUCCESS_PROBABILITY: f64 = 0.85;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

pub struct SyntheticPaymentGenerator<R: Rng> {
    rng: R,
}

impl SyntheticPaymentGenerator<ChaCha8Rng> {
    /// Same seed, same sequence of payments.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng> SyntheticPaymentGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn next_payment(&mut self, tenant_id: &str, now: DateTime<Utc>) -> PaymentRecord {
        let amount = self.rng.gen_range(MIN_AMOUNT..MAX_AMOUNT);
        let method = PaymentMethod::ALL[self.rng.gen_range(0..PaymentMethod::ALL.len())];
        let status = if self.rng.gen_bool(SUCCESS_PROBABILITY) {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        PaymentRecord {
            id: uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid(),
            tenant_id: tenant_id.to_string(),
            amount: BigDecimal::from(amount),
            currency: DEFAULT_CURRENCY.to_string(),
            method,
            status,
            merchant_id: format!("merchant_{}", self.random_suffix()),
            customer_id: format!("customer_{}", self.random_suffix()),
            description: Some("Real-time payment transaction".to_string()),
            metadata: Some(serde_json::json!({ "source": "simulator" })),
            created_at: now,
            updated_at: now,
        }
    }

    fn random_suffix(&mut self) -> String {
        (0..ID_SUFFIX_LEN)
            .map(|_| char::from(ID_ALPHABET[self.rng.gen_range(0..ID_ALPHABET.len())]))
            .collect()
    }
}

/// Ingests one synthetic payment for `tenant_id` every `every` until `shutdown` flips to true.
pub async fn run_simulation<R>(
    ingestor: Arc<PaymentIngestor>,
    mut generator: SyntheticPaymentGenerator<R>,
    tenant_id: String,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    R: Rng + Send,
{
    tracing::info!(tenant_id = %tenant_id, interval_ms = every.as_millis() as u64, "payment simulator started");
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payment = generator.next_payment(&tenant_id, Utc::now());
                if let Err(e) = ingestor.record(payment).await {
                    tracing::error!(tenant_id = %tenant_id, error = %e, "simulated payment not recorded");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(tenant_id = %tenant_id, "payment simulator stopped");
}
