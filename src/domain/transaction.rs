//! Transaction domain entity.
//! Framework-agnostic representation of one push-payment attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved prefix for locally generated correlation ids. Gateway-issued
/// CheckoutRequestIDs never carry it, so the reconciler can tell a
/// simulated transaction from a real one by the key alone.
pub const SIMULATED_ID_PREFIX: &str = "SIM-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Error,
}

impl TransactionStatus {
    /// Terminal states are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::TimedOut
        )
    }
}

/// One push-payment attempt, keyed by its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub correlation_id: String,
    pub status: TransactionStatus,
    /// Minor-unit amount, 1..=70_000.
    pub amount: u32,
    /// Normalized international-format phone, e.g. 2547XXXXXXXX.
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub receipt_reference: Option<String>,
    pub transaction_date: Option<String>,
    pub stage_message: Option<String>,
    pub callback_received: bool,
    /// Diagnostic from a failed gateway status query; informational only,
    /// never terminal on its own.
    pub diagnostic: Option<String>,
}

impl TransactionRecord {
    pub fn new(correlation_id: String, amount: u32, phone: String) -> Self {
        let now = Utc::now();
        Self {
            correlation_id,
            status: TransactionStatus::Pending,
            amount,
            phone,
            created_at: now,
            updated_at: now,
            result_code: None,
            result_description: None,
            receipt_reference: None,
            transaction_date: None,
            stage_message: None,
            callback_received: false,
            diagnostic: None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.correlation_id.starts_with(SIMULATED_ID_PREFIX)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Generates a locally scoped correlation id for the simulated flow.
pub fn new_simulated_id() -> String {
    format!("{}{}", SIMULATED_ID_PREFIX, Uuid::new_v4())
}

/// Partial mutation applied through the store. Fields left as `None` keep
/// their current value.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub receipt_reference: Option<String>,
    pub transaction_date: Option<String>,
    pub amount: Option<u32>,
    pub phone: Option<String>,
    pub stage_message: Option<String>,
    pub callback_received: Option<bool>,
    pub diagnostic: Option<String>,
}

impl TransactionUpdate {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Applies the mutation in place, refreshing `updated_at`.
    pub fn apply(self, record: &mut TransactionRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(code) = self.result_code {
            record.result_code = Some(code);
        }
        if let Some(desc) = self.result_description {
            record.result_description = Some(desc);
        }
        if let Some(receipt) = self.receipt_reference {
            record.receipt_reference = Some(receipt);
        }
        if let Some(date) = self.transaction_date {
            record.transaction_date = Some(date);
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(phone) = self.phone {
            record.phone = phone;
        }
        if let Some(message) = self.stage_message {
            record.stage_message = Some(message);
        }
        if let Some(received) = self.callback_received {
            record.callback_received = received;
        }
        if let Some(diagnostic) = self.diagnostic {
            record.diagnostic = Some(diagnostic);
        }
        record.updated_at = Utc::now();
    }
}
