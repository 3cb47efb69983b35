//! Validates a payment intent and turns it into a tracked transaction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SharedMpesaConfig;
use crate::domain::transaction::new_simulated_id;
use crate::domain::TransactionRecord;
use crate::error::AppError;
use crate::mpesa::{compute_password, format_timestamp, MpesaClient};
use crate::store::TransactionStore;
use crate::validation::{normalize_phone, validate_amount};

const DEFAULT_DESCRIPTION: &str = "Order payment";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub phone: Option<String>,
    pub amount: Option<i64>,
    #[serde(alias = "accountReference")]
    pub reference: Option<String>,
    #[serde(alias = "transactionDesc")]
    pub description: Option<String>,
}

/// Acknowledgment returned to the caller once a prompt has been pushed
/// (or simulated). `simulated` lets the caller tell the two apart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateAck {
    pub correlation_id: String,
    pub customer_message: String,
    pub simulated: bool,
}

#[derive(Clone)]
pub struct PaymentInitiator {
    store: Arc<dyn TransactionStore>,
    client: MpesaClient,
    config: SharedMpesaConfig,
}

impl PaymentInitiator {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        client: MpesaClient,
        config: SharedMpesaConfig,
    ) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    pub async fn initiate(&self, request: PaymentRequest) -> Result<InitiateAck, AppError> {
        // Fail fast, first violation wins: presence, amount range, phone.
        let (phone_raw, amount_raw, reference) =
            match (&request.phone, request.amount, &request.reference) {
                (Some(phone), Some(amount), Some(reference))
                    if !phone.trim().is_empty() && !reference.trim().is_empty() =>
                {
                    (phone.clone(), amount, reference.clone())
                }
                _ => {
                    return Err(AppError::Validation("missing required fields".to_string()));
                }
            };

        validate_amount(amount_raw).map_err(|e| AppError::Validation(e.to_string()))?;
        let amount = amount_raw as u32;

        let phone =
            normalize_phone(&phone_raw).map_err(|e| AppError::Validation(e.to_string()))?;

        let description = request
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        // One snapshot for the whole submission; a concurrent credential
        // update cannot hand us a password from one config and a short
        // code from another.
        let config = self.config.load();

        tracing::info!(
            phone = %phone,
            amount,
            reference = %reference,
            "initiating push payment"
        );

        let push_result = async {
            let token = self.client.get_access_token(&config).await?;
            let timestamp = format_timestamp(Utc::now());
            let password =
                compute_password(&config.business_short_code, &config.passkey, &timestamp);
            self.client
                .stk_push(
                    &config,
                    &token,
                    &password,
                    &timestamp,
                    amount,
                    &phone,
                    &reference,
                    &description,
                )
                .await
        }
        .await;

        match push_result {
            Ok(ack) => {
                tracing::info!(
                    correlation_id = %ack.checkout_request_id,
                    "push payment accepted by gateway"
                );
                let record =
                    TransactionRecord::new(ack.checkout_request_id.clone(), amount, phone);
                self.store
                    .create(record)
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                Ok(InitiateAck {
                    correlation_id: ack.checkout_request_id,
                    customer_message: ack.customer_message,
                    simulated: false,
                })
            }
            Err(err) if config.enable_fallback => {
                tracing::warn!(error = %err, "gateway call failed, falling back to simulation");
                let correlation_id = new_simulated_id();
                let record = TransactionRecord::new(correlation_id.clone(), amount, phone.clone());
                self.store
                    .create(record)
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                Ok(InitiateAck {
                    correlation_id,
                    customer_message: format!(
                        "Dear customer, you will receive a payment prompt on {}. \
                         Enter your PIN to complete payment of KES {}.",
                        phone, amount
                    ),
                    simulated: true,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "push payment failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, MpesaConfig};
    use crate::store::InMemoryStore;

    fn test_setup(enable_fallback: bool, base_url: String) -> PaymentInitiator {
        let config = MpesaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            business_short_code: "174379".to_string(),
            passkey: "passkey".to_string(),
            environment: Environment::Sandbox,
            enable_fallback,
            callback_url: "https://example.com/mpesa/callback".to_string(),
            base_url_override: Some(base_url),
        };
        PaymentInitiator::new(
            Arc::new(InMemoryStore::new()),
            MpesaClient::new(),
            SharedMpesaConfig::new(config),
        )
    }

    fn request(phone: &str, amount: i64) -> PaymentRequest {
        PaymentRequest {
            phone: Some(phone.to_string()),
            amount: Some(amount),
            reference: Some("REF1".to_string()),
            description: Some("desc".to_string()),
        }
    }

    #[tokio::test]
    async fn rejects_missing_fields_first() {
        let initiator = test_setup(false, "http://127.0.0.1:1".to_string());
        let result = initiator
            .initiate(PaymentRequest {
                phone: None,
                amount: Some(0), // would also fail, but presence check wins
                reference: None,
                description: None,
            })
            .await;

        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "missing required fields"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_blank_fields_as_missing() {
        let initiator = test_setup(false, "http://127.0.0.1:1".to_string());
        let result = initiator
            .initiate(PaymentRequest {
                phone: Some("   ".to_string()),
                amount: Some(65),
                reference: Some("".to_string()),
                description: None,
            })
            .await;

        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "missing required fields"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_amount_before_phone() {
        let initiator = test_setup(false, "http://127.0.0.1:1".to_string());
        let result = initiator.initiate(request("not-a-phone", 70_001)).await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("amount")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_invalid_phone() {
        let initiator = test_setup(false, "http://127.0.0.1:1".to_string());
        let result = initiator.initiate(request("0812345678", 65)).await;

        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("phone")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_gateway_without_fallback_surfaces_error() {
        // Port 1 refuses connections; no fallback configured.
        let initiator = test_setup(false, "http://127.0.0.1:1".to_string());
        let result = initiator.initiate(request("0712345678", 65)).await;

        assert!(matches!(
            result,
            Err(AppError::Auth(_)) | Err(AppError::GatewayUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_gateway_with_fallback_simulates() {
        let initiator = test_setup(true, "http://127.0.0.1:1".to_string());
        let ack = initiator.initiate(request("0712345678", 65)).await.unwrap();

        assert!(ack.simulated);
        assert!(ack
            .correlation_id
            .starts_with(crate::domain::SIMULATED_ID_PREFIX));
        assert!(ack.customer_message.contains("254712345678"));

        let record = initiator.store.get(&ack.correlation_id).unwrap();
        assert_eq!(record.amount, 65);
        assert_eq!(record.phone, "254712345678");
    }

    #[tokio::test]
    async fn successful_push_creates_pending_record() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("GET", "/oauth/v1/generate?grant_type=client_credentials")
            .with_status(200)
            .with_body(r#"{"access_token":"tok","expires_in":"3599"}"#)
            .create_async()
            .await;
        let _push = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(200)
            .with_body(
                r#"{"ResponseCode":"0","CheckoutRequestID":"ABC123",
                    "MerchantRequestID":"1-2-3","CustomerMessage":"Check your phone"}"#,
            )
            .create_async()
            .await;

        let initiator = test_setup(false, server.url());
        let ack = initiator.initiate(request("0712345678", 65)).await.unwrap();

        assert!(!ack.simulated);
        assert_eq!(ack.correlation_id, "ABC123");

        let record = initiator.store.get("ABC123").unwrap();
        assert_eq!(record.amount, 65);
        assert_eq!(record.phone, "254712345678");
        assert_eq!(
            record.status,
            crate::domain::TransactionStatus::Pending
        );
    }
}
