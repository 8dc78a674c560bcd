//! Structured error object sent to the control plane.

use serde::{Deserialize, Serialize};

/// Error body posted to the invocation, init and restore error endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Error type, also sent as the function-error-type header.
    pub error_type: String,
    /// Human readable message.
    pub error_message: String,
    /// Stack trace, one frame per entry.
    #[serde(default)]
    pub stack_trace: Vec<String>,
}

impl ErrorReport {
    /// Create a report without a stack trace.
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: Vec::new(),
        }
    }

    /// Attach a multi-line stack trace, split into frames.
    pub fn with_stack_trace(mut self, stack_trace: &str) -> Self {
        self.stack_trace = stack_trace
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        self
    }
}
