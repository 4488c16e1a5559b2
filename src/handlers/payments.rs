use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{NewPayment, PaymentRecord, PaymentStatus};
use crate::error::AppError;
use crate::handlers::tenant_from_headers;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
}

pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payment): Json<NewPayment>,
) -> Result<(StatusCode, Json<PaymentRecord>), AppError> {
    let tenant_id = tenant_from_headers(&headers);
    let record = state.ingestor.ingest(payment, &tenant_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PaymentRecord>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let tenant_id = tenant_from_headers(&headers);
    let payments = state.store.list_recent(&tenant_id, limit).await?;
    Ok(Json(payments))
}

pub async fn get_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecord>, AppError> {
    let tenant_id = tenant_from_headers(&headers);
    match state.store.get_by_id(id).await? {
        Some(record) if record.tenant_id == tenant_id => Ok(Json(record)),
        _ => Err(AppError::NotFound(format!("payment {}", id))),
    }
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<PaymentRecord>, AppError> {
    let tenant_id = tenant_from_headers(&headers);
    state
        .ingestor
        .update_status(&tenant_id, id, update.status)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("payment {}", id)))
}
