//! Fatal bootstrap outcomes.

use crate::restore::HookFailure;
use crate::runtime_api::ApiError;
use thiserror::Error;

/// Why the bootstrap loop stopped.
///
/// Every variant is process-fatal: the caller is expected to exit with a
/// non-zero status and let the supervisor start a fresh process.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The one-time initializer failed. It has already been reported.
    #[error("initialization failed: [{error_type}] {message}")]
    Initialization {
        /// Error type sent to the control plane.
        error_type: String,
        /// Error message sent to the control plane.
        message: String,
    },

    /// Fetching the next invocation failed.
    #[error("failed to fetch next invocation: {0}")]
    Fetch(#[source] ApiError),

    /// An invocation outcome could not be delivered.
    #[error("failed to report invocation {request_id}: {source}")]
    Report {
        /// Request id of the invocation.
        request_id: String,
        /// The last delivery failure.
        #[source]
        source: ApiError,
    },

    /// A before-snapshot hook failed.
    #[error("before-snapshot checkpoint failed: {0}")]
    BeforeSnapshot(#[source] HookFailure),

    /// Waiting for the restore signal failed.
    #[error("waiting for restore failed: {0}")]
    Restore(#[source] ApiError),

    /// An after-restore hook failed.
    #[error("after-restore checkpoint failed: {0}")]
    AfterRestore(#[source] HookFailure),
}
