pub mod client;

pub use client::{
    compute_password, format_timestamp, MpesaClient, MpesaError, StkPushAck, StkQueryOutcome,
};
