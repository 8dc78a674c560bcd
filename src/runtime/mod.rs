//! The bootstrap loop and everything it needs to run: configuration, fatal
//! errors and graceful shutdown.

mod bootstrap;
mod config;
mod error;
mod shutdown;

pub use bootstrap::{
    Bootstrap, Initializer, LoopState, AFTER_RESTORE_ERROR_TYPE, BEFORE_SNAPSHOT_ERROR_TYPE,
    INIT_ERROR_TYPE, RESPONSE_REPORT_ERROR_TYPE,
};
pub use config::{
    BootstrapConfig, InitializationType, INITIALIZATION_TYPE_ENV, RUNTIME_API_ENV, TRACE_ID_ENV,
};
pub use error::BootstrapError;
pub use shutdown::ShutdownHandle;
