//! Runtime credential management and the diagnostic endpoint.
//!
//! A credential update builds a complete new `MpesaConfig` snapshot and
//! swaps it atomically; requests already in flight keep the snapshot they
//! loaded, so none ever sees a half-updated configuration.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::config::MpesaConfig;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdateRequest {
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub business_short_code: Option<String>,
    pub passkey: Option<String>,
    pub callback_url: Option<String>,
    pub enable_fallback: Option<bool>,
}

pub async fn update_mpesa_config(
    State(state): State<AppState>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (consumer_key, consumer_secret) = match (request.consumer_key, request.consumer_secret) {
        (Some(key), Some(secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
            (key, secret)
        }
        _ => {
            return Err(AppError::Validation(
                "consumer key and secret are required".to_string(),
            ));
        }
    };

    let current = state.mpesa_config.load();
    let updated = MpesaConfig {
        consumer_key,
        consumer_secret,
        business_short_code: request
            .business_short_code
            .unwrap_or_else(|| current.business_short_code.clone()),
        passkey: request.passkey.unwrap_or_else(|| current.passkey.clone()),
        callback_url: request
            .callback_url
            .unwrap_or_else(|| current.callback_url.clone()),
        enable_fallback: request.enable_fallback.unwrap_or(current.enable_fallback),
        environment: current.environment,
        base_url_override: current.base_url_override.clone(),
    };

    tracing::info!(
        consumer_key = %updated.masked_consumer_key(),
        "gateway credentials updated"
    );
    state.mpesa_config.store(updated);

    Ok(Json(json!({
        "success": true,
        "message": "Gateway configuration updated",
    })))
}

/// Single parameterized diagnostic flow: reports the active configuration
/// (secrets masked) and whether the gateway token endpoint is reachable
/// with it.
pub async fn diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.mpesa_config.load();

    let token_check = match state.mpesa.get_access_token(&config).await {
        Ok(_) => "ok".to_string(),
        Err(err) => format!("failed: {}", err),
    };

    Json(json!({
        "environment": config.environment.as_str(),
        "consumerKey": config.masked_consumer_key(),
        "businessShortCode": config.business_short_code,
        "callbackUrl": config.callback_url,
        "enableFallback": config.enable_fallback,
        "gatewayCircuit": state.mpesa.circuit_state(),
        "tokenCheck": token_check,
    }))
}
