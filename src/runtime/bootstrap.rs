//! The bootstrap loop: initialize once, then fetch, invoke and report forever.

use crate::function::{InvocationResult, Invoke};
use crate::invocation::{ErrorReport, Invocation};
use crate::restore::{BoxError, RestoreHooksRegistry};
use crate::runtime::config::TRACE_ID_ENV;
use crate::runtime::shutdown::{self, ShutdownHandle};
use crate::runtime::{BootstrapConfig, BootstrapError};
use crate::runtime_api::{ApiError, RuntimeApi, RuntimeApiClient};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Error type reported when the initializer fails.
pub const INIT_ERROR_TYPE: &str = "Runtime.InitError";
/// Error type reported when a before-snapshot hook fails.
pub const BEFORE_SNAPSHOT_ERROR_TYPE: &str = "Runtime.BeforeSnapshotError";
/// Error type reported when an after-restore hook fails.
pub const AFTER_RESTORE_ERROR_TYPE: &str = "Runtime.AfterRestoreError";
/// Error type reported when a successful result could not be delivered.
pub const RESPONSE_REPORT_ERROR_TYPE: &str = "Runtime.ResponseReportFailed";

/// One-time initializer run before the first fetch.
pub type Initializer =
    Box<dyn FnOnce(Arc<RestoreHooksRegistry>) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// States of the bootstrap loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started yet.
    Uninitialized,
    /// Running the initializer, and the snapshot checkpoint if any.
    Initializing,
    /// Waiting for the next invocation.
    Idle,
    /// Running the handler.
    Invoking,
    /// Delivering the outcome of the current invocation.
    Reporting,
    /// Stopped; the loop will not run again.
    Terminated,
}

/// The invocation loop.
///
/// Exactly one invocation is in flight at a time: the next fetch only
/// happens once the previous outcome has been reported.
pub struct Bootstrap {
    api: Arc<dyn RuntimeApi>,
    invoker: Box<dyn Invoke>,
    hooks: Arc<RestoreHooksRegistry>,
    initializer: Option<Initializer>,
    config: BootstrapConfig,
    state: LoopState,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl Bootstrap {
    /// Create a loop talking to `api` and running `invoker`.
    pub fn new(api: Arc<dyn RuntimeApi>, invoker: impl Invoke + 'static) -> Self {
        let (shutdown, shutdown_rx) = ShutdownHandle::new();
        Self {
            api,
            invoker: Box::new(invoker),
            hooks: Arc::new(RestoreHooksRegistry::new()),
            initializer: None,
            config: BootstrapConfig::default(),
            state: LoopState::Uninitialized,
            shutdown,
            shutdown_rx,
        }
    }

    /// Create a loop using the HTTP client described by `config`.
    pub fn from_config(config: BootstrapConfig, invoker: impl Invoke + 'static) -> Self {
        let api = Arc::new(RuntimeApiClient::new(&config));
        Self::new(api, invoker).with_config(config)
    }

    /// Use `config` for loop behaviour.
    pub fn with_config(mut self, config: BootstrapConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing hook registry.
    pub fn with_hooks(mut self, hooks: Arc<RestoreHooksRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run `init` once before the first invocation is fetched.
    pub fn with_initializer<F, Fut>(mut self, init: F) -> Self
    where
        F: FnOnce(Arc<RestoreHooksRegistry>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.initializer = Some(Box::new(move |hooks| Box::pin(init(hooks))));
        self
    }

    /// The hook registry shared with the initializer.
    pub fn hooks(&self) -> Arc<RestoreHooksRegistry> {
        self.hooks.clone()
    }

    /// A handle that stops the loop gracefully.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until terminated.
    ///
    /// Returns `Ok(())` after a requested shutdown and an error for every
    /// fatal failure.
    pub async fn run(&mut self) -> Result<(), BootstrapError> {
        let result = self.run_inner().await;
        self.transition(LoopState::Terminated);
        match &result {
            Ok(()) => info!("Bootstrap loop stopped"),
            Err(e) => error!("Bootstrap loop terminated: {}", e),
        }
        result
    }

    async fn run_inner(&mut self) -> Result<(), BootstrapError> {
        self.initialize().await?;

        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }

            self.transition(LoopState::Idle);
            let invocation = {
                let next = self.api.next_invocation();
                tokio::select! {
                    biased;
                    _ = shutdown::requested(&mut self.shutdown_rx) => return Ok(()),
                    next = next => next.map_err(BootstrapError::Fetch)?,
                }
            };

            self.process(invocation).await?;
        }
    }

    async fn initialize(&mut self) -> Result<(), BootstrapError> {
        self.transition(LoopState::Initializing);

        if let Some(init) = self.initializer.take() {
            if let Err(e) = init(self.hooks.clone()).await {
                let report = ErrorReport::new(INIT_ERROR_TYPE, e.to_string());
                error!("Initializer failed: {}", e);
                if let Err(report_err) = self.api.report_initialization_error(&report).await {
                    error!("Failed to report initialization error: {}", report_err);
                }
                return Err(BootstrapError::Initialization {
                    error_type: report.error_type,
                    message: report.error_message,
                });
            }
        }

        if self.config.is_snap_start() {
            self.checkpoint().await?;
        }

        info!("Initialization complete");
        Ok(())
    }

    /// Drive one snapshot/restore cycle.
    async fn checkpoint(&mut self) -> Result<(), BootstrapError> {
        if let Err(failure) = self.hooks.invoke_before_snapshot_callbacks().await {
            let report = ErrorReport::new(BEFORE_SNAPSHOT_ERROR_TYPE, failure.to_string());
            if let Err(e) = self.api.report_initialization_error(&report).await {
                error!("Failed to report before-snapshot error: {}", e);
            }
            return Err(BootstrapError::BeforeSnapshot(failure));
        }

        info!("Waiting for restore");
        self.api
            .restore_next()
            .await
            .map_err(BootstrapError::Restore)?;
        info!("Restored");

        if let Err(failure) = self.hooks.invoke_after_restore_callbacks().await {
            let report = ErrorReport::new(AFTER_RESTORE_ERROR_TYPE, failure.to_string());
            if let Err(e) = self.api.report_restore_error(&report).await {
                error!("Failed to report after-restore error: {}", e);
            }
            return Err(BootstrapError::AfterRestore(failure));
        }
        Ok(())
    }

    async fn process(&mut self, invocation: Invocation) -> Result<(), BootstrapError> {
        let Invocation { metadata, payload } = invocation;
        let span = info_span!("invocation", request_id = %metadata.request_id);

        async {
            self.transition(LoopState::Invoking);
            if self.config.propagate_trace_id {
                if metadata.trace_id.is_empty() {
                    std::env::remove_var(TRACE_ID_ENV);
                } else {
                    std::env::set_var(TRACE_ID_ENV, &metadata.trace_id);
                }
            }
            let result = self.invoker.invoke(payload, &metadata).await;

            self.transition(LoopState::Reporting);
            self.report(&metadata.request_id, result).await
        }
        .instrument(span)
        .await
    }

    async fn report(
        &mut self,
        request_id: &str,
        result: InvocationResult,
    ) -> Result<(), BootstrapError> {
        let report = match result {
            InvocationResult::Success(body) => {
                let err = match self.api.send_response(request_id, body).await {
                    Ok(()) => {
                        debug!("Response delivered");
                        return Ok(());
                    }
                    Err(err) => err,
                };
                warn!("Failed to deliver response: {}", err);
                let report = ErrorReport::new(
                    RESPONSE_REPORT_ERROR_TYPE,
                    format!("failed to report response: {}", err),
                );
                return self.escalate(request_id, &report).await;
            }
            InvocationResult::HandlerError(err) => {
                warn!("Handler failed: {}", err);
                ErrorReport::from(err)
            }
            InvocationResult::SerializationError(err) => {
                warn!("Payload serialization failed: {}", err);
                ErrorReport::from(err)
            }
        };

        // Best effort: a broken transport surfaces on the next fetch.
        if let Err(e) = self.api.report_invocation_error(request_id, &report).await {
            error!("Failed to report invocation error: {}", e);
        }
        Ok(())
    }

    async fn escalate(
        &mut self,
        request_id: &str,
        report: &ErrorReport,
    ) -> Result<(), BootstrapError> {
        self.api
            .report_invocation_error(request_id, report)
            .await
            .map_err(|source: ApiError| BootstrapError::Report {
                request_id: request_id.to_string(),
                source,
            })
    }

    fn transition(&mut self, next: LoopState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
