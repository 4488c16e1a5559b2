pub mod analytics;
pub mod payments;
pub mod ws;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::health::{StoreChecker, check_health};
use crate::services::broadcaster::DEFAULT_TENANT;
use crate::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant named by the `x-tenant-id` header, or the default tenant.
pub fn tenant_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_TENANT)
        .to_string()
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checker = StoreChecker::new(state.store.clone());
    let response = check_health(
        &checker,
        state.start_time,
        state.broadcaster.connection_count(),
    )
    .await;

    let status_code = if response.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
