mod common;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::FailingStore;
use http_body_util::BodyExt;
use payment_pulse::adapters::InMemoryPaymentStore;
use payment_pulse::config::Config;
use payment_pulse::domain::{PaymentRecord, PaymentStatus};
use payment_pulse::ports::{AggregateQuery, GroupRow, PaymentStore, StatusUpdate, StoreResult};
use payment_pulse::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

fn app_with(store: Arc<dyn PaymentStore>) -> Router {
    let config = Config::default();
    create_app(AppState::new(store, &config), &config.cors_origin)
}

fn app() -> Router {
    app_with(Arc::new(InMemoryPaymentStore::new()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str, tenant: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-tenant-id", tenant)
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, tenant: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-tenant-id", tenant)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn payment_body(amount: u32, status: &str) -> Value {
    json!({
        "amount": amount,
        "method": "paypal",
        "status": status,
        "merchant_id": "merchant_1",
        "customer_id": "customer_1"
    })
}

#[tokio::test]
async fn test_health_reports_store_and_subscribers() {
    let response = app().oneshot(get("/health", "default")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_subscribers"], 0);
    assert_eq!(body["dependencies"]["payment_store"]["status"], "healthy");
}

#[tokio::test]
async fn test_health_unhealthy_when_store_down() {
    let response = app_with(Arc::new(FailingStore))
        .oneshot(get("/health", "default"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_created_payment_shows_up_in_tenant_metrics() {
    let app = app();

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/payments", "acme", payment_body(250, "completed")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["tenant_id"], "acme");
    assert_eq!(created["currency"], "USD");

    let metrics = body_json(app.clone().oneshot(get("/api/analytics/metrics", "acme")).await.unwrap()).await;
    assert_eq!(metrics["total_transactions"], 1);
    assert_eq!(metrics["top_payment_method"], "paypal");

    let other = body_json(app.oneshot(get("/api/analytics/metrics", "other")).await.unwrap()).await;
    assert_eq!(other["total_transactions"], 0);
    assert_eq!(other["peak_hour"], Value::Null);
}

#[tokio::test]
async fn test_invalid_payment_is_bad_request() {
    let response = app()
        .oneshot(send_json("POST", "/api/payments", "acme", payment_body(0, "completed")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_unknown_trend_period_falls_back_to_day() {
    let response = app()
        .oneshot(get("/api/analytics/trends?period=fortnight", "acme"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_payment_lookup_is_tenant_scoped_and_status_patchable() {
    let app = app();
    let created = body_json(
        app.clone()
            .oneshot(send_json("POST", "/api/payments", "acme", payment_body(90, "pending")))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let found = app.clone().oneshot(get(&format!("/api/payments/{}", id), "acme")).await.unwrap();
    assert_eq!(found.status(), StatusCode::OK);

    let hidden = app.clone().oneshot(get(&format!("/api/payments/{}", id), "other")).await.unwrap();
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let patched = app
        .clone()
        .oneshot(send_json(
            "PATCH",
            &format!("/api/payments/{}/status", id),
            "acme",
            json!({ "status": "completed" }),
        ))
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
    assert_eq!(body_json(patched).await["status"], "completed");

    let missing = app
        .oneshot(send_json(
            "PATCH",
            &format!("/api/payments/{}/status", Uuid::new_v4()),
            "acme",
            json!({ "status": "failed" }),
        ))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_payments_validates_limit() {
    let app = app();
    for amount in [10, 20, 30] {
        app.clone()
            .oneshot(send_json("POST", "/api/payments", "acme", payment_body(amount, "completed")))
            .await
            .unwrap();
    }

    let listed = body_json(app.clone().oneshot(get("/api/payments?limit=2", "acme")).await.unwrap()).await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let rejected = app.oneshot(get("/api/payments?limit=0", "acme")).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_outage_maps_to_service_unavailable() {
    let response = app_with(Arc::new(FailingStore))
        .oneshot(get("/api/analytics/metrics", "acme"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Store whose aggregate queries never finish in time.
struct StalledStore(InMemoryPaymentStore);

#[async_trait]
impl PaymentStore for StalledStore {
    async fn insert(&self, record: &PaymentRecord) -> StoreResult<Uuid> {
        self.0.insert(record).await
    }

    async fn query_aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<GroupRow>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        self.0.query_aggregate(query).await
    }

    async fn list_recent(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<PaymentRecord>> {
        self.0.list_recent(tenant_id, limit).await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRecord>> {
        self.0.get_by_id(id).await
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<StatusUpdate> {
        self.0.update_status(id, status).await
    }

    async fn clear(&self) -> StoreResult<u64> {
        self.0.clear().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.0.ping().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_metrics_query_times_out() {
    let response = app_with(Arc::new(StalledStore(InMemoryPaymentStore::new())))
        .oneshot(get("/api/analytics/metrics", "acme"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}
