//! # lambda-bootstrap - Custom Function Runtime Bootstrap
//!
//! `lambda-bootstrap` is the in-process loop of a custom function runtime. It
//! long-polls a local control plane for invocations, runs one user handler per
//! invocation and reports the outcome back, strictly one invocation at a time.
//! For snapshot-started environments it also drives a snapshot/restore
//! checkpoint through a [`RestoreHooksRegistry`](restore::RestoreHooksRegistry).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Control Plane (Runtime API)                     │
//! │        /runtime/invocation/next  /response  /error  /restore        │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   ▲
//!                                   │ HTTP/1.1
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            Bootstrap                                │
//! │  ┌────────────┐   ┌──────────────────────────┐   ┌──────────────┐  │
//! │  │ RuntimeApi │──▶│ HandlerInvoker           │──▶│ report       │  │
//! │  │  (client)  │   │  Serializer ─▶ Handler   │   │ response/err │  │
//! │  └────────────┘   └──────────────────────────┘   └──────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │   RestoreHooksRegistry (before-snapshot / after-restore)    │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lambda_bootstrap::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BootstrapError> {
//!     let config = BootstrapConfig::from_env()?;
//!
//!     let handler = handler_fn(|name: String, _meta| async move {
//!         Ok::<_, HandlerError>(format!("Hello, {}!", name))
//!     });
//!     let invoker = HandlerInvoker::with_serializer(handler, JsonSerializer);
//!
//!     let mut bootstrap = Bootstrap::from_config(config, invoker)
//!         .with_initializer(|hooks| async move {
//!             hooks.register_before_snapshot(hook_fn(|| async { Ok::<(), BoxError>(()) }));
//!             Ok::<(), BoxError>(())
//!         });
//!
//!     bootstrap.run().await
//! }
//! ```
//!
//! ## Invocation Lifecycle
//!
//! 1. **Initialize**: the initializer runs once; a failure is reported to
//!    `/runtime/init/error` and the process exits.
//! 2. **Fetch**: `GET /runtime/invocation/next` blocks until work arrives.
//! 3. **Invoke**: the payload is decoded, the handler runs, the result is
//!    encoded. Handler errors and panics never escape the invoker.
//! 4. **Report**: success goes to `/response`, any failure to `/error`.
//!
//! A fetch failure is fatal; the supervisor is expected to start a fresh
//! process.

pub mod function;
pub mod invocation;
pub mod restore;
pub mod runtime;
pub mod runtime_api;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::function::{
        handler_fn, Handler, HandlerError, HandlerInvoker, InvocationResult, Invoke,
        JsonSerializer, RawBytes, SerializationError, Serializer,
    };
    pub use crate::invocation::{ErrorReport, Invocation, InvocationMetadata};
    pub use crate::restore::{hook_fn, BoxError, RestoreHook, RestoreHooksRegistry};
    pub use crate::runtime::{Bootstrap, BootstrapConfig, BootstrapError, LoopState, ShutdownHandle};
    pub use crate::runtime_api::{ApiError, RuntimeApi, RuntimeApiClient};
    pub use async_trait::async_trait;
    pub use bootstrap_macro::bootstrap_handler;
}

// Re-export for convenience
pub use function::{Handler, HandlerError, HandlerInvoker};
pub use invocation::{Invocation, InvocationMetadata};
pub use restore::RestoreHooksRegistry;
pub use runtime::{Bootstrap, BootstrapConfig, BootstrapError};
