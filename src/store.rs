//! Process-wide keyed state for in-flight and completed transactions.
//!
//! The in-memory backing is suitable for a single instance only: records
//! are never evicted and do not survive a restart. A production deployment
//! needs a durable store behind the same trait, with compare-and-swap
//! update semantics to keep the terminal-state invariant.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::domain::{TransactionRecord, TransactionUpdate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("transaction {0} already exists")]
    DuplicateKey(String),
}

pub trait TransactionStore: Send + Sync {
    /// Inserts a new record; fails if the correlation id is already taken.
    fn create(&self, record: TransactionRecord) -> Result<(), StoreError>;

    fn get(&self, correlation_id: &str) -> Option<TransactionRecord>;

    /// Applies a partial update atomically for the key and returns the
    /// resulting snapshot, or `None` if the key is absent. An update onto
    /// a record already in a terminal state is a no-op: duplicate
    /// callbacks and racing polls can never regress or double-apply a
    /// terminal transition.
    fn update(
        &self,
        correlation_id: &str,
        update: TransactionUpdate,
    ) -> Option<TransactionRecord>;
}

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, TransactionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryStore {
    fn create(&self, record: TransactionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("store lock poisoned");
        if records.contains_key(&record.correlation_id) {
            return Err(StoreError::DuplicateKey(record.correlation_id));
        }
        records.insert(record.correlation_id.clone(), record);
        Ok(())
    }

    fn get(&self, correlation_id: &str) -> Option<TransactionRecord> {
        let records = self.records.read().expect("store lock poisoned");
        records.get(correlation_id).cloned()
    }

    fn update(
        &self,
        correlation_id: &str,
        update: TransactionUpdate,
    ) -> Option<TransactionRecord> {
        let mut records = self.records.write().expect("store lock poisoned");
        let record = records.get_mut(correlation_id)?;
        if !record.is_terminal() {
            update.apply(record);
        }
        Some(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionStatus;
    use std::sync::Arc;

    fn pending_record(id: &str) -> TransactionRecord {
        TransactionRecord::new(id.to_string(), 65, "254712345678".to_string())
    }

    #[test]
    fn create_then_get() {
        let store = InMemoryStore::new();
        store.create(pending_record("ABC123")).unwrap();

        let record = store.get("ABC123").unwrap();
        assert_eq!(record.status, TransactionStatus::Pending);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn create_rejects_duplicate_key() {
        let store = InMemoryStore::new();
        store.create(pending_record("ABC123")).unwrap();

        let err = store.create(pending_record("ABC123")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn update_absent_key_returns_none() {
        let store = InMemoryStore::new();
        let result = store.update("missing", TransactionUpdate::status(TransactionStatus::Failed));
        assert!(result.is_none());
    }

    #[test]
    fn terminal_record_is_immutable() {
        let store = InMemoryStore::new();
        store.create(pending_record("ABC123")).unwrap();
        store.update(
            "ABC123",
            TransactionUpdate {
                status: Some(TransactionStatus::Completed),
                receipt_reference: Some("QK1ABC".to_string()),
                callback_received: Some(true),
                ..Default::default()
            },
        );

        // A later conflicting update must not change anything.
        let after = store
            .update(
                "ABC123",
                TransactionUpdate {
                    status: Some(TransactionStatus::Failed),
                    result_code: Some("1032".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(after.status, TransactionStatus::Completed);
        assert_eq!(after.receipt_reference.as_deref(), Some("QK1ABC"));
        assert!(after.result_code.is_none());
    }

    #[test]
    fn duplicate_terminal_update_is_a_noop() {
        let store = InMemoryStore::new();
        store.create(pending_record("ABC123")).unwrap();
        let terminal = TransactionUpdate {
            status: Some(TransactionStatus::Completed),
            result_code: Some("0".to_string()),
            receipt_reference: Some("QK1ABC".to_string()),
            ..Default::default()
        };
        let first = store.update("ABC123", terminal.clone()).unwrap();
        let second = store.update("ABC123", terminal).unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.receipt_reference, second.receipt_reference);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[test]
    fn racing_terminal_updates_keep_first_outcome() {
        let store = Arc::new(InMemoryStore::new());
        store.create(pending_record("RACE1")).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                let update = if i % 2 == 0 {
                    TransactionUpdate {
                        status: Some(TransactionStatus::Completed),
                        receipt_reference: Some("QK1ABC".to_string()),
                        ..Default::default()
                    }
                } else {
                    TransactionUpdate {
                        status: Some(TransactionStatus::Failed),
                        result_code: Some("1".to_string()),
                        ..Default::default()
                    }
                };
                store.update("RACE1", update);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever update won, the record is terminal and internally
        // consistent: a completed record has its receipt, a failed one its
        // result code, never a mix.
        let record = store.get("RACE1").unwrap();
        assert!(record.is_terminal());
        match record.status {
            TransactionStatus::Completed => {
                assert_eq!(record.receipt_reference.as_deref(), Some("QK1ABC"));
                assert!(record.result_code.is_none());
            }
            TransactionStatus::Failed => {
                assert_eq!(record.result_code.as_deref(), Some("1"));
                assert!(record.receipt_reference.is_none());
            }
            other => panic!("unexpected status {:?}", other),
        }
    }
}
