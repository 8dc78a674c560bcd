//! Client side of the control-plane runtime protocol.

mod client;
mod error;

pub use client::{RuntimeApi, RuntimeApiClient, FUNCTION_ERROR_TYPE_HEADER, UNKNOWN_ERROR_TYPE};
pub use error::ApiError;
