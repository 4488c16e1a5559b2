pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, patch},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::ports::PaymentStore;
use crate::services::{CachePolicy, EventBroadcaster, MetricsService, PaymentIngestor};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PaymentStore>,
    pub metrics: Arc<MetricsService>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub ingestor: Arc<PaymentIngestor>,
    pub query_timeout: Duration,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the services around `store` using the cache, queue and timeout settings in `config`.
    pub fn new(store: Arc<dyn PaymentStore>, config: &Config) -> Self {
        let policy = CachePolicy {
            metrics_ttl: config.metrics_ttl(),
            trends_ttl: config.trends_ttl(),
        };
        let metrics = Arc::new(MetricsService::with_store(
            store.clone(),
            config.trend_zero_fill,
            policy,
        ));
        let broadcaster = Arc::new(EventBroadcaster::new(config.subscriber_buffer));
        let ingestor = Arc::new(PaymentIngestor::new(
            store.clone(),
            metrics.clone(),
            broadcaster.clone(),
        ));

        Self {
            store,
            metrics,
            broadcaster,
            ingestor,
            query_timeout: config.query_timeout(),
            start_time: Instant::now(),
        }
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = %origin, "invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

pub fn create_app(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/analytics/metrics", get(handlers::analytics::get_metrics))
        .route("/api/analytics/trends", get(handlers::analytics::get_trends))
        .route(
            "/api/payments",
            get(handlers::payments::list_payments).post(handlers::payments::create_payment),
        )
        .route("/api/payments/:id", get(handlers::payments::get_payment))
        .route(
            "/api/payments/:id/status",
            patch(handlers::payments::update_payment_status),
        )
        .route("/ws/payments", get(handlers::ws::ws_handler))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
