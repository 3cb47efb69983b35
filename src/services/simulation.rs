//! Time-driven progression for simulated transactions.
//!
//! When the gateway is unreachable and fallback is enabled, the initiator
//! records a simulated transaction. Its progression is a pure function of
//! elapsed time since creation, so repeated polls within the same stage
//! window observe identical output. The only nondeterminism is a single
//! success/failure draw made when the resolution threshold is crossed;
//! the drawn outcome is persisted on the record and never re-drawn.

use rand::Rng;
use std::time::Duration;

/// 90% of simulated payments succeed.
pub const SUCCESS_PROBABILITY: f64 = 0.9;

pub const SENDING_AFTER: Duration = Duration::from_secs(3);
pub const USER_ACTION_AFTER: Duration = Duration::from_secs(8);
pub const PROCESSING_AFTER: Duration = Duration::from_secs(15);
pub const RESOLVE_AFTER: Duration = Duration::from_secs(25);
/// Hard timeout: past this an unresolved simulated payment is timed out
/// regardless of the draw.
pub const TIMEOUT_AFTER: Duration = Duration::from_secs(150);

pub const TIMEOUT_RESULT_CODE: &str = "1032";
pub const CANCELLED_RESULT_CODE: &str = "1";

/// Ordered stages of a simulated push payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStage {
    Preparing,
    Sending,
    UserAction,
    Processing,
    Resolve,
    Timeout,
}

impl SimulationStage {
    pub fn message(&self) -> &'static str {
        match self {
            SimulationStage::Preparing => "Preparing payment request...",
            SimulationStage::Sending => "Sending payment request to your phone...",
            SimulationStage::UserAction => {
                "Please check your phone for the payment prompt and enter your PIN"
            }
            SimulationStage::Processing => "Processing payment... Please wait.",
            SimulationStage::Resolve => "Resolving payment...",
            SimulationStage::Timeout => "Payment timed out. Please try again.",
        }
    }
}

/// Maps elapsed time since creation to a stage. Pure; identical input
/// buckets give identical stages.
pub fn stage_for_elapsed(elapsed: Duration) -> SimulationStage {
    if elapsed >= TIMEOUT_AFTER {
        SimulationStage::Timeout
    } else if elapsed >= RESOLVE_AFTER {
        SimulationStage::Resolve
    } else if elapsed >= PROCESSING_AFTER {
        SimulationStage::Processing
    } else if elapsed >= USER_ACTION_AFTER {
        SimulationStage::UserAction
    } else if elapsed >= SENDING_AFTER {
        SimulationStage::Sending
    } else {
        SimulationStage::Preparing
    }
}

/// One-time success/failure draw for a simulated payment.
pub fn draw_success<R: Rng>(rng: &mut R) -> bool {
    rng.gen_bool(SUCCESS_PROBABILITY)
}

/// Generates a receipt reference in the gateway's style, e.g. `QK7A3F9B2C`.
pub fn generate_receipt<R: Rng>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("QK{}", suffix)
}
