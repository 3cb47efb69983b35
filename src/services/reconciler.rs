//! Answers "what is the state of transaction X now".
//!
//! Terminal records and records already settled by a callback are served
//! straight from the store. Simulated transactions advance through the
//! elapsed-time state machine in `simulation`. Real transactions with no
//! callback yet are refreshed by querying the gateway; a failed query
//! leaves the record pending with a diagnostic, never terminal.

use std::sync::Arc;

use chrono::Utc;

use crate::config::SharedMpesaConfig;
use crate::domain::{TransactionRecord, TransactionStatus, TransactionUpdate};
use crate::error::AppError;
use crate::mpesa::{compute_password, format_timestamp, MpesaClient, StkQueryOutcome};
use crate::services::simulation::{
    self, stage_for_elapsed, SimulationStage, CANCELLED_RESULT_CODE, TIMEOUT_RESULT_CODE,
};
use crate::store::TransactionStore;

#[derive(Clone)]
pub struct StatusReconciler {
    store: Arc<dyn TransactionStore>,
    client: MpesaClient,
    config: SharedMpesaConfig,
}

impl StatusReconciler {
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

    pub async fn get_status(&self, correlation_id: &str) -> Result<TransactionRecord, AppError> {
        let record = self
            .store
            .get(correlation_id)
            .ok_or_else(|| AppError::NotFound(format!("transaction {} not found", correlation_id)))?;

        // Terminal records never change; once a callback has been applied
        // the stored state is authoritative and neither simulation nor a
        // gateway query may override it.
        if record.is_terminal() || record.callback_received {
            return Ok(record);
        }

        if record.is_simulated() {
            Ok(self.advance_simulation(record))
        } else {
            Ok(self.refresh_from_gateway(record).await)
        }
    }

    fn advance_simulation(&self, record: TransactionRecord) -> TransactionRecord {
        let elapsed = (Utc::now() - record.created_at)
            .to_std()
            .unwrap_or_default();
        let stage = stage_for_elapsed(elapsed);

        let update = match stage {
            SimulationStage::Timeout => TransactionUpdate {
                status: Some(TransactionStatus::TimedOut),
                result_code: Some(TIMEOUT_RESULT_CODE.to_string()),
                result_description: Some("Payment request timed out".to_string()),
                stage_message: Some(stage.message().to_string()),
                ..Default::default()
            },
            SimulationStage::Resolve => {
                // One-time draw. The terminal guard in the store makes the
                // first resolution stick if two polls race here.
                let mut rng = rand::thread_rng();
                if simulation::draw_success(&mut rng) {
                    TransactionUpdate {
                        status: Some(TransactionStatus::Completed),
                        result_code: Some("0".to_string()),
                        result_description: Some("Payment completed successfully".to_string()),
                        receipt_reference: Some(simulation::generate_receipt(&mut rng)),
                        transaction_date: Some(Utc::now().to_rfc3339()),
                        stage_message: Some(
                            "Payment completed successfully. Your order is confirmed.".to_string(),
                        ),
                        ..Default::default()
                    }
                } else {
                    TransactionUpdate {
                        status: Some(TransactionStatus::Failed),
                        result_code: Some(CANCELLED_RESULT_CODE.to_string()),
                        result_description: Some("Payment was cancelled by user".to_string()),
                        stage_message: Some(
                            "Payment was cancelled or failed. Please try again.".to_string(),
                        ),
                        ..Default::default()
                    }
                }
            }
            SimulationStage::Processing => TransactionUpdate {
                status: Some(TransactionStatus::Processing),
                stage_message: Some(stage.message().to_string()),
                ..Default::default()
            },
            _ => TransactionUpdate {
                stage_message: Some(stage.message().to_string()),
                ..Default::default()
            },
        };

        self.store
            .update(&record.correlation_id, update)
            .unwrap_or(record)
    }

    async fn refresh_from_gateway(&self, record: TransactionRecord) -> TransactionRecord {
        let config = self.config.load();

        let outcome = async {
            let token = self.client.get_access_token(&config).await?;
            let timestamp = format_timestamp(Utc::now());
            let password =
                compute_password(&config.business_short_code, &config.passkey, &timestamp);
            self.client
                .stk_query(
                    &config,
                    &token,
                    &password,
                    &timestamp,
                    &record.correlation_id,
                )
                .await
        }
        .await;

        let update = match outcome {
            Ok(StkQueryOutcome::Completed {
                result_code,
                result_description,
            }) => TransactionUpdate {
                status: Some(TransactionStatus::Completed),
                result_code: Some(result_code),
                result_description: Some(result_description),
                ..Default::default()
            },
            Ok(StkQueryOutcome::Failed {
                result_code,
                result_description,
            }) => TransactionUpdate {
                status: Some(TransactionStatus::Failed),
                result_code: Some(result_code),
                result_description: Some(result_description),
                ..Default::default()
            },
            Ok(StkQueryOutcome::Pending { description }) => TransactionUpdate {
                diagnostic: Some(description),
                ..Default::default()
            },
            Err(err) => {
                // The callback may still arrive; a transient query failure
                // must not prematurely fail the transaction.
                tracing::warn!(
                    correlation_id = %record.correlation_id,
                    error = %err,
                    "gateway status query failed, keeping transaction pending"
                );
                TransactionUpdate {
                    diagnostic: Some(err.to_string()),
                    ..Default::default()
                }
            }
        };

        self.store
            .update(&record.correlation_id, update)
            .unwrap_or(record)
    }
}
