//! Adapts a typed [`Handler`] to the uniform bytes-in/bytes-out contract.

use crate::function::handler::{Handler, HandlerError};
use crate::function::serializer::{RawBytes, SerializationError, Serializer};
use crate::invocation::{ErrorReport, InvocationMetadata};
use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Outcome of running one invocation through a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    /// The handler succeeded; the serialized result.
    Success(Bytes),
    /// User logic failed.
    HandlerError(HandlerError),
    /// The payload could not be decoded, or the result could not be encoded.
    SerializationError(SerializationError),
}

impl InvocationResult {
    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    /// Error report for the control plane, `None` on success.
    pub fn error_report(&self) -> Option<ErrorReport> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::HandlerError(err) => Some(err.clone().into()),
            InvocationResult::SerializationError(err) => Some(err.clone().into()),
        }
    }
}

/// The contract the bootstrap loop drives: raw payload in, classified result out.
#[async_trait]
pub trait Invoke: Send + Sync {
    /// Run one invocation. Never fails; every failure is folded into the result.
    async fn invoke(&self, payload: Bytes, metadata: &InvocationMetadata) -> InvocationResult;
}

/// Error type reported when a handler panics.
pub const PANIC_ERROR_TYPE: &str = "Runtime.HandlerPanic";

/// Wraps a handler and its serializer.
///
/// No retries and no deadline enforcement happen here; the handler can look
/// at [`InvocationMetadata::remaining_time`] itself.
pub struct HandlerInvoker<H, S = RawBytes> {
    handler: H,
    serializer: S,
}

impl<H> HandlerInvoker<H, RawBytes>
where
    H: Handler<Input = Bytes, Output = Bytes>,
{
    /// Invoker for a handler that works on raw bytes.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            serializer: RawBytes,
        }
    }
}

impl<H, S> HandlerInvoker<H, S>
where
    H: Handler,
    S: Serializer<H::Input> + Serializer<H::Output>,
{
    /// Invoker that decodes input and encodes output with `serializer`.
    pub fn with_serializer(handler: H, serializer: S) -> Self {
        Self {
            handler,
            serializer,
        }
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H, S> Invoke for HandlerInvoker<H, S>
where
    H: Handler,
    S: Serializer<H::Input> + Serializer<H::Output>,
{
    async fn invoke(&self, payload: Bytes, metadata: &InvocationMetadata) -> InvocationResult {
        let input: H::Input = match Serializer::<H::Input>::deserialize(&self.serializer, payload) {
            Ok(input) => input,
            Err(e) => return InvocationResult::SerializationError(e),
        };

        let outcome = AssertUnwindSafe(self.handler.handle(input, metadata))
            .catch_unwind()
            .await;

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return InvocationResult::HandlerError(e),
            Err(panic) => {
                return InvocationResult::HandlerError(HandlerError::with_type(
                    PANIC_ERROR_TYPE,
                    panic_message(panic.as_ref()),
                ))
            }
        };

        match Serializer::<H::Output>::serialize(&self.serializer, output) {
            Ok(bytes) => InvocationResult::Success(bytes),
            Err(e) => InvocationResult::SerializationError(e),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
