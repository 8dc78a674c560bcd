//! User handler trait and its error type.

use crate::invocation::{ErrorReport, InvocationMetadata};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

/// Business logic run once per invocation.
///
/// `Input` and `Output` are whatever the configured serializer produces and
/// consumes; a handler without a serializer works on `bytes::Bytes`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Deserialized request type.
    type Input: Send + 'static;
    /// Result type, serialized before it is sent back.
    type Output: Send + 'static;

    /// Handle a single invocation.
    async fn handle(
        &self,
        input: Self::Input,
        metadata: &InvocationMetadata,
    ) -> Result<Self::Output, HandlerError>;
}

/// Error raised by user logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Error type reported to the control plane.
    pub error_type: String,
    /// Error message.
    pub message: String,
    /// Optional stack trace.
    pub stack_trace: Option<String>,
}

impl HandlerError {
    /// Error type used when none is given.
    pub const DEFAULT_TYPE: &'static str = "Function.Error";

    /// Create a new HandlerError with the default type.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_type(Self::DEFAULT_TYPE, message)
    }

    /// Create a HandlerError with a specific type.
    pub fn with_type(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Build from any error, using its Rust type name as the error type.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        Self::with_type(std::any::type_name::<E>(), err.to_string())
    }

    /// Attach a stack trace.
    pub fn stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<HandlerError> for ErrorReport {
    fn from(err: HandlerError) -> Self {
        let report = ErrorReport::new(err.error_type, err.message);
        match err.stack_trace {
            Some(trace) => report.with_stack_trace(&trace),
            None => report,
        }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::from_error(&err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::from_error(&err)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::new(message)
    }
}

/// Handler built from an async closure. See [`handler_fn`].
pub struct FnHandler<F, In, Out> {
    f: F,
    _marker: PhantomData<fn(In) -> Out>,
}

/// Wrap an async closure taking the input and a copy of the metadata.
///
/// ```
/// use lambda_bootstrap::function::{handler_fn, HandlerError};
///
/// let handler = handler_fn(|input: String, _meta| async move {
///     Ok::<_, HandlerError>(input.to_uppercase())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut, In, Out>(f: F) -> FnHandler<F, In, Out>
where
    F: Fn(In, InvocationMetadata) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    FnHandler {
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, In, Out> Handler for FnHandler<F, In, Out>
where
    F: Fn(In, InvocationMetadata) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
    In: Send + 'static,
    Out: Send + 'static,
{
    type Input = In;
    type Output = Out;

    async fn handle(
        &self,
        input: In,
        metadata: &InvocationMetadata,
    ) -> Result<Out, HandlerError> {
        (self.f)(input, metadata.clone()).await
    }
}
