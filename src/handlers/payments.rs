use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::domain::TransactionRecord;
use crate::error::AppError;
use crate::services::{PaymentInitiator, PaymentRequest, StatusReconciler};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub elapsed_seconds: i64,
    pub simulated: bool,
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let initiator = PaymentInitiator::new(
        state.store.clone(),
        state.mpesa.clone(),
        state.mpesa_config.clone(),
    );
    let ack = initiator.initiate(request).await?;
    Ok(Json(ack))
}

pub async fn get_payment_status(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let reconciler = StatusReconciler::new(
        state.store.clone(),
        state.mpesa.clone(),
        state.mpesa_config.clone(),
    );
    let record = reconciler.get_status(&correlation_id).await?;

    let elapsed_seconds = (Utc::now() - record.created_at).num_seconds();
    let simulated = record.is_simulated();
    Ok(Json(StatusResponse {
        record,
        elapsed_seconds,
        simulated,
    }))
}
