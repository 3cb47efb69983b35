pub mod initiator;
pub mod reconciler;
pub mod simulation;

pub use initiator::{InitiateAck, PaymentInitiator, PaymentRequest};
pub use reconciler::StatusReconciler;
