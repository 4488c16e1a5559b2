use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::domain::{MetricsSnapshot, TrendPeriod, TrendPoint};
use crate::error::AppError;
use crate::handlers::tenant_from_headers;
use crate::services::MetricsError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub period: Option<String>,
}

/// Dropping the query future on timeout leaves any shared computation to its other waiters.
async fn within<T>(
    limit: Duration,
    query: impl Future<Output = Result<T, MetricsError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, query).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Timeout(limit.as_millis() as u64)),
    }
}

pub async fn get_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MetricsSnapshot>, AppError> {
    let tenant_id = tenant_from_headers(&headers);
    let snapshot = within(state.query_timeout, state.metrics.get_metrics(&tenant_id)).await?;
    Ok(Json(snapshot))
}

pub async fn get_trends(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TrendsQuery>,
) -> Result<Json<Vec<TrendPoint>>, AppError> {
    let tenant_id = tenant_from_headers(&headers);
    let period = TrendPeriod::parse_or_default(params.period.as_deref());
    let points = within(state.query_timeout, state.metrics.get_trends(&tenant_id, period)).await?;
    Ok(Json(points))
}
