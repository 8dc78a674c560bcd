//! User handlers, serializers and the invoker that ties them together.

pub mod handler;
pub mod invoker;
pub mod serializer;

pub use handler::{handler_fn, FnHandler, Handler, HandlerError};
pub use invoker::{HandlerInvoker, InvocationResult, Invoke, PANIC_ERROR_TYPE};
pub use serializer::{JsonSerializer, RawBytes, SerializationError, Serializer};
