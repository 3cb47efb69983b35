pub mod transaction;

pub use transaction::{
    TransactionRecord, TransactionStatus, TransactionUpdate, SIMULATED_ID_PREFIX,
};
