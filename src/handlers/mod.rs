pub mod admin;
pub mod callback;
pub mod payments;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "gateway_circuit": state.mpesa.circuit_state(),
    }))
}
