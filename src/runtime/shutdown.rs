//! Graceful shutdown signalling.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Requests a graceful stop of the bootstrap loop.
///
/// The loop only honours the request while idle or between invocations; an
/// invocation that is already running is reported first.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Ask the loop to stop.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Spawn a task that triggers this handle on SIGTERM or Ctrl-C.
    pub fn listen_for_signals(&self) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            handle.trigger();
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Resolve once shutdown has been requested.
///
/// Never resolves if every handle is dropped without triggering.
pub(crate) async fn requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
