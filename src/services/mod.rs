pub mod aggregation;
pub mod broadcaster;
pub mod cache;
pub mod ingestion;
pub mod metrics_service;
pub mod simulator;

pub use aggregation::AggregationEngine;
pub use broadcaster::{Binding, ConnectionId, DeliveryReport, EventBroadcaster};
pub use cache::{CacheKey, QueryKind, ResultCache};
pub use ingestion::{IngestError, PaymentIngestor};
pub use metrics_service::{CachePolicy, MetricsError, MetricsService};
pub use simulator::{run_simulation, SyntheticPaymentGenerator};
