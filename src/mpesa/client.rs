use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::MpesaConfig;

/// The gateway's canonical success value for ResponseCode and ResultCode.
pub const RESPONSE_CODE_SUCCESS: &str = "0";

#[derive(Error, Debug)]
pub enum MpesaError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected request ({code}): {description}")]
    Rejected { code: String, description: String },
    #[error("invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
}

/// Builds the `YYYYMMDDHHMMSS` timestamp the gateway expects. The same
/// string must feed both `compute_password` and the request payload; a
/// mismatch fails gateway-side authentication.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Base64 of `short_code + passkey + timestamp`. Pure, no I/O.
pub fn compute_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

/// Acknowledgment from a successfully accepted push request. Accepted
/// means the prompt was sent, not that payment completed.
#[derive(Debug, Clone)]
pub struct StkPushAck {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// Outcome of a push-payment status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StkQueryOutcome {
    Completed {
        result_code: String,
        result_description: String,
    },
    Failed {
        result_code: String,
        result_description: String,
    },
    /// Non-zero ResponseCode: the gateway has no result yet.
    Pending { description: String },
}

#[derive(Debug, Serialize)]
struct StkPushPayload<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
    #[serde(rename = "Timestamp")]
    timestamp: &'a str,
    #[serde(rename = "TransactionType")]
    transaction_type: &'a str,
    #[serde(rename = "Amount")]
    amount: u32,
    #[serde(rename = "PartyA")]
    party_a: &'a str,
    #[serde(rename = "PartyB")]
    party_b: &'a str,
    #[serde(rename = "PhoneNumber")]
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    #[serde(rename = "AccountReference")]
    account_reference: &'a str,
    #[serde(rename = "TransactionDesc")]
    transaction_desc: &'a str,
}

#[derive(Debug, Serialize)]
struct StkQueryPayload<'a> {
    #[serde(rename = "BusinessShortCode")]
    business_short_code: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
    #[serde(rename = "Timestamp")]
    timestamp: &'a str,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

/// HTTP client for the Daraja push-payment API. Credentials and endpoints
/// come from the `MpesaConfig` snapshot passed into each call, so one
/// request never mixes fields from two configurations.
#[derive(Clone)]
pub struct MpesaClient {
    client: Client,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl Default for MpesaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MpesaClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        MpesaClient {
            client,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker.
    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    /// Sends a request through the circuit breaker and returns the raw
    /// status and body. Only transport failures count against the breaker;
    /// gateway-level rejections are interpreted by the callers.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), MpesaError> {
        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;
                let status = response.status();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((status, body))
            })
            .await;

        match result {
            Ok(ok) => Ok(ok),
            Err(FailsafeError::Rejected) => Err(MpesaError::CircuitOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(MpesaError::Transport(e)),
        }
    }

    /// Obtains an OAuth access token via HTTP Basic auth with the
    /// consumer key/secret pair.
    pub async fn get_access_token(&self, config: &MpesaConfig) -> Result<String, MpesaError> {
        let credentials =
            BASE64.encode(format!("{}:{}", config.consumer_key, config.consumer_secret));
        let request = self
            .client
            .get(format!("{}?grant_type=client_credentials", config.auth_url()))
            .header("Authorization", format!("Basic {}", credentials))
            .header("Content-Type", "application/json");

        let (status, body) = self.execute(request).await?;

        if !status.is_success() {
            return Err(MpesaError::Auth(format!("HTTP {}: {}", status, body)));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| MpesaError::Auth(format!("token response is not JSON: {}", e)))?;

        parsed
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| MpesaError::Auth("no access token in response".to_string()))
    }

    /// Submits a push-payment request. `password` and `timestamp` must
    /// come from the same `compute_password`/`format_timestamp` pair.
    #[allow(clippy::too_many_arguments)]
    pub async fn stk_push(
        &self,
        config: &MpesaConfig,
        access_token: &str,
        password: &str,
        timestamp: &str,
        amount: u32,
        phone: &str,
        reference: &str,
        description: &str,
    ) -> Result<StkPushAck, MpesaError> {
        let payload = StkPushPayload {
            business_short_code: &config.business_short_code,
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: phone,
            party_b: &config.business_short_code,
            phone_number: phone,
            callback_url: &config.callback_url,
            account_reference: reference,
            transaction_desc: description,
        };

        let request = self
            .client
            .post(config.stk_push_url())
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&payload);

        let (_, body) = self.execute(request).await?;
        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            MpesaError::InvalidResponse(format!("push response is not JSON: {}", e))
        })?;

        let response_code = field_as_string(&parsed, "ResponseCode");
        if response_code.as_deref() == Some(RESPONSE_CODE_SUCCESS) {
            let checkout_request_id = field_as_string(&parsed, "CheckoutRequestID")
                .ok_or_else(|| {
                    MpesaError::InvalidResponse("missing CheckoutRequestID".to_string())
                })?;
            Ok(StkPushAck {
                checkout_request_id,
                merchant_request_id: field_as_string(&parsed, "MerchantRequestID")
                    .unwrap_or_default(),
                customer_message: field_as_string(&parsed, "CustomerMessage").unwrap_or_else(
                    || "Please check your phone for the payment prompt.".to_string(),
                ),
            })
        } else {
            Err(MpesaError::Rejected {
                code: response_code.unwrap_or_else(|| "unknown".to_string()),
                description: field_as_string(&parsed, "ResponseDescription")
                    .or_else(|| field_as_string(&parsed, "errorMessage"))
                    .unwrap_or_else(|| "push payment request failed".to_string()),
            })
        }
    }

    /// Queries the status of a previously submitted push request.
    pub async fn stk_query(
        &self,
        config: &MpesaConfig,
        access_token: &str,
        password: &str,
        timestamp: &str,
        checkout_request_id: &str,
    ) -> Result<StkQueryOutcome, MpesaError> {
        let payload = StkQueryPayload {
            business_short_code: &config.business_short_code,
            password,
            timestamp,
            checkout_request_id,
        };

        let request = self
            .client
            .post(config.stk_query_url())
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&payload);

        let (_, body) = self.execute(request).await?;
        let parsed: Value = serde_json::from_str(&body).map_err(|e| {
            MpesaError::InvalidResponse(format!("query response is not JSON: {}", e))
        })?;

        let response_code = field_as_string(&parsed, "ResponseCode");
        if response_code.as_deref() == Some(RESPONSE_CODE_SUCCESS) {
            let result_code = field_as_string(&parsed, "ResultCode")
                .ok_or_else(|| MpesaError::InvalidResponse("missing ResultCode".to_string()))?;
            let result_description =
                field_as_string(&parsed, "ResultDesc").unwrap_or_default();
            if result_code == RESPONSE_CODE_SUCCESS {
                Ok(StkQueryOutcome::Completed {
                    result_code,
                    result_description,
                })
            } else {
                Ok(StkQueryOutcome::Failed {
                    result_code,
                    result_description,
                })
            }
        } else {
            Ok(StkQueryOutcome::Pending {
                description: field_as_string(&parsed, "ResponseDescription")
                    .unwrap_or_else(|| "status check pending".to_string()),
            })
        }
    }
}

/// The gateway is inconsistent about numeric fields: some responses carry
/// `"0"`, callbacks carry `0`. Accept both.
fn field_as_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
