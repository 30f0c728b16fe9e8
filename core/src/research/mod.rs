//! Structured research output: the response schema and the coercion of raw
//! agent output into it

pub mod coerce;
pub mod response;

pub use coerce::{coerce_response, CoercionFailure, FailureReason};
pub use response::{format_instructions, ResearchResponse};
