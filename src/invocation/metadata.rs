//! Per-invocation metadata read from the control-plane response headers.

use crate::runtime_api::ApiError;
use bytes::Bytes;
use hyper::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Header carrying the request id of the fetched invocation.
pub const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
/// Header carrying the invocation deadline in Unix epoch milliseconds.
pub const DEADLINE_HEADER: &str = "lambda-runtime-deadline-ms";
/// Header carrying the ARN of the invoked function.
pub const FUNCTION_ARN_HEADER: &str = "lambda-runtime-invoked-function-arn";
/// Header carrying the tracing id.
pub const TRACE_ID_HEADER: &str = "lambda-runtime-trace-id";
/// Header carrying the client context blob, if any.
pub const CLIENT_CONTEXT_HEADER: &str = "lambda-runtime-client-context";
/// Header carrying the cognito identity blob, if any.
pub const COGNITO_IDENTITY_HEADER: &str = "lambda-runtime-cognito-identity";

/// Metadata describing a single fetched invocation.
///
/// A fresh value is created for every invocation and dropped once the
/// outcome for that invocation has been reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMetadata {
    /// Request id assigned by the control plane.
    pub request_id: String,
    /// ARN of the function being invoked.
    pub invoked_function_arn: String,
    /// Deadline for this invocation, in Unix epoch milliseconds.
    pub deadline_epoch_millis: i64,
    /// Trace id, empty when the control plane did not send one.
    pub trace_id: String,
    /// Raw client context, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_context: Option<Bytes>,
    /// Raw cognito identity, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito_identity: Option<Bytes>,
}

impl InvocationMetadata {
    /// Create metadata with the required fields set.
    pub fn new(
        request_id: impl Into<String>,
        invoked_function_arn: impl Into<String>,
        deadline_epoch_millis: i64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            invoked_function_arn: invoked_function_arn.into(),
            deadline_epoch_millis,
            ..Self::default()
        }
    }

    /// Set the trace id.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Set the client context.
    pub fn with_client_context(mut self, client_context: impl Into<Bytes>) -> Self {
        self.client_context = Some(client_context.into());
        self
    }

    /// Set the cognito identity.
    pub fn with_cognito_identity(mut self, cognito_identity: impl Into<Bytes>) -> Self {
        self.cognito_identity = Some(cognito_identity.into());
        self
    }

    /// Parse metadata out of a next-invocation response.
    ///
    /// The request id, deadline and function ARN are required; the remaining
    /// headers are optional.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let request_id = required_header(headers, REQUEST_ID_HEADER)?;
        let invoked_function_arn = required_header(headers, FUNCTION_ARN_HEADER)?;
        let deadline = required_header(headers, DEADLINE_HEADER)?;
        let deadline_epoch_millis = deadline.parse::<i64>().map_err(|e| {
            ApiError::InvalidResponse(format!("invalid {} '{}': {}", DEADLINE_HEADER, deadline, e))
        })?;

        let trace_id = headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            request_id,
            invoked_function_arn,
            deadline_epoch_millis,
            trace_id,
            client_context: optional_blob(headers, CLIENT_CONTEXT_HEADER),
            cognito_identity: optional_blob(headers, COGNITO_IDENTITY_HEADER),
        })
    }

    /// The deadline as a `SystemTime`.
    pub fn deadline(&self) -> SystemTime {
        let millis = u64::try_from(self.deadline_epoch_millis).unwrap_or(0);
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    /// Time left before the deadline, saturating at zero.
    pub fn remaining_time(&self) -> Duration {
        self.deadline()
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .ok_or_else(|| ApiError::InvalidResponse(format!("missing header {}", name)))?;
    let value = value
        .to_str()
        .map_err(|e| ApiError::InvalidResponse(format!("non-ascii header {}: {}", name, e)))?;
    if value.is_empty() {
        return Err(ApiError::InvalidResponse(format!("empty header {}", name)));
    }
    Ok(value.to_string())
}

fn optional_blob(headers: &HeaderMap, name: &str) -> Option<Bytes> {
    headers
        .get(name)
        .filter(|v| !v.is_empty())
        .map(|v| Bytes::copy_from_slice(v.as_bytes()))
}

/// A fetched unit of work: its metadata and the raw request body.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Invocation metadata.
    pub metadata: InvocationMetadata,
    /// Raw request payload.
    pub payload: Bytes,
}

impl Invocation {
    /// Create a new invocation.
    pub fn new(metadata: InvocationMetadata, payload: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            payload: payload.into(),
        }
    }
}
