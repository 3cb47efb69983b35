//! Inbound callback from the payment gateway.
//!
//! The contract with the gateway is "never cause a retry storm": the
//! handler always acknowledges with ResultCode 0, whatever happened
//! internally. Malformed payloads are logged and dropped without touching
//! the store.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::{TransactionStatus, TransactionUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CallbackEnvelope {
    #[serde(rename = "Body")]
    body: Option<CallbackBody>,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: Option<StkCallback>,
}

#[derive(Debug, Deserialize)]
struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    result_code: Option<Value>,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    item: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: Option<Value>,
}

impl CallbackMetadata {
    fn find(&self, name: &str) -> Option<&Value> {
        self.item
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }

    fn find_string(&self, name: &str) -> Option<String> {
        self.find(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn find_amount(&self) -> Option<u32> {
        match self.find("Amount")? {
            Value::Number(n) => n.as_f64().map(|f| f.round() as u32),
            Value::String(s) => s.parse::<f64>().ok().map(|f| f.round() as u32),
            _ => None,
        }
    }
}

pub async fn mpesa_callback(State(state): State<AppState>, body: String) -> impl IntoResponse {
    process(&state, &body);

    // Acknowledge no matter what; a non-success response here would make
    // the gateway retry.
    Json(json!({
        "ResultCode": 0,
        "ResultDesc": "Callback received successfully",
    }))
}

fn process(state: &AppState, body: &str) {
    let envelope: CallbackEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable callback body, ignoring");
            return;
        }
    };

    let Some(callback) = envelope.body.and_then(|b| b.stk_callback) else {
        tracing::warn!("callback without stkCallback envelope, ignoring");
        return;
    };

    let Some(correlation_id) = callback.checkout_request_id else {
        tracing::warn!("callback without CheckoutRequestID, ignoring");
        return;
    };

    let result_code = match callback.result_code {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s,
        _ => {
            tracing::warn!(correlation_id = %correlation_id, "callback without ResultCode, ignoring");
            return;
        }
    };

    let update = if result_code == "0" {
        let metadata = callback.callback_metadata.unwrap_or_default();
        tracing::info!(
            correlation_id = %correlation_id,
            receipt = ?metadata.find_string("MpesaReceiptNumber"),
            "payment completed via callback"
        );
        TransactionUpdate {
            status: Some(TransactionStatus::Completed),
            result_code: Some(result_code),
            result_description: Some(
                callback
                    .result_desc
                    .unwrap_or_else(|| "Payment completed successfully".to_string()),
            ),
            receipt_reference: metadata.find_string("MpesaReceiptNumber"),
            transaction_date: metadata.find_string("TransactionDate"),
            amount: metadata.find_amount(),
            phone: metadata.find_string("PhoneNumber"),
            callback_received: Some(true),
            ..Default::default()
        }
    } else {
        tracing::info!(
            correlation_id = %correlation_id,
            result_code = %result_code,
            "payment failed or cancelled via callback"
        );
        TransactionUpdate {
            status: Some(TransactionStatus::Failed),
            result_code: Some(result_code),
            result_description: callback.result_desc,
            callback_received: Some(true),
            ..Default::default()
        }
    };

    if state.store.update(&correlation_id, update).is_none() {
        tracing::warn!(
            correlation_id = %correlation_id,
            "callback for unknown transaction, nothing updated"
        );
    }
}
