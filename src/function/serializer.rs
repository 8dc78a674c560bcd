//! Conversion between raw payload bytes and handler types.

use crate::invocation::ErrorReport;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failure to turn bytes into a handler input, or a handler output into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationError {
    /// Type name of the underlying error.
    pub error_type: String,
    /// Error message.
    pub message: String,
}

impl SerializationError {
    /// Create a new SerializationError.
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Build from any error, using its Rust type name as the error type.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for SerializationError {}

impl From<SerializationError> for ErrorReport {
    fn from(err: SerializationError) -> Self {
        ErrorReport::new(err.error_type, err.message)
    }
}

/// Converts payloads for one handler type `T`.
pub trait Serializer<T>: Send + Sync {
    /// Decode a request payload.
    fn deserialize(&self, payload: Bytes) -> Result<T, SerializationError>;

    /// Encode a handler result.
    fn serialize(&self, value: T) -> Result<Bytes, SerializationError>;
}

/// JSON serializer backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<T> Serializer<T> for JsonSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn deserialize(&self, payload: Bytes) -> Result<T, SerializationError> {
        serde_json::from_slice(&payload).map_err(|e| SerializationError::from_error(&e))
    }

    fn serialize(&self, value: T) -> Result<Bytes, SerializationError> {
        serde_json::to_vec(&value)
            .map(Bytes::from)
            .map_err(|e| SerializationError::from_error(&e))
    }
}

/// Passthrough used when no serializer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytes;

impl Serializer<Bytes> for RawBytes {
    fn deserialize(&self, payload: Bytes) -> Result<Bytes, SerializationError> {
        Ok(payload)
    }

    fn serialize(&self, value: Bytes) -> Result<Bytes, SerializationError> {
        Ok(value)
    }
}
