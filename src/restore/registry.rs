//! Before-snapshot and after-restore hook registry.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info};

/// Boxed error returned by a failing hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A zero-argument async callback run at a checkpoint.
#[async_trait]
pub trait RestoreHook: Send + Sync {
    /// Run the hook.
    async fn run(&self) -> Result<(), BoxError>;
}

/// Hook built from an async closure. See [`hook_fn`].
pub struct FnHook<F> {
    f: F,
}

/// Wrap an async closure as a [`RestoreHook`].
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    FnHook { f }
}

#[async_trait]
impl<F, Fut> RestoreHook for FnHook<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn run(&self) -> Result<(), BoxError> {
        (self.f)().await
    }
}

/// The two checkpoints hooks can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Just before the process is frozen.
    BeforeSnapshot,
    /// Just after the process has been resumed.
    AfterRestore,
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Checkpoint::BeforeSnapshot => write!(f, "before-snapshot"),
            Checkpoint::AfterRestore => write!(f, "after-restore"),
        }
    }
}

/// A hook failed; the remaining hooks of that pass were skipped.
#[derive(Debug, Error)]
#[error("{checkpoint} hook #{sequence} failed: {source}")]
pub struct HookFailure {
    /// Checkpoint being run.
    pub checkpoint: Checkpoint,
    /// Registration sequence number of the failing hook.
    pub sequence: u64,
    /// Number of hooks of the pass that never ran.
    pub skipped: usize,
    /// The hook's error.
    #[source]
    pub source: BoxError,
}

/// A registered hook and its registration order.
struct HookEntry {
    sequence: u64,
    hook: Box<dyn RestoreHook>,
}

/// Ordered hooks around a snapshot/restore cycle.
///
/// Before-snapshot hooks run most-recently-registered first; after-restore
/// hooks run in registration order. Each pass consumes the hooks it runs.
/// Registration may happen concurrently from any task; passes of the same
/// checkpoint must not overlap.
#[derive(Default)]
pub struct RestoreHooksRegistry {
    before_snapshot: Mutex<Vec<HookEntry>>,
    after_restore: Mutex<VecDeque<HookEntry>>,
    next_sequence: AtomicU64,
}

impl RestoreHooksRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook to run before the snapshot is taken.
    pub fn register_before_snapshot(&self, hook: impl RestoreHook + 'static) {
        let entry = self.entry(hook);
        debug!("Registered before-snapshot hook #{}", entry.sequence);
        lock(&self.before_snapshot).push(entry);
    }

    /// Register a hook to run after the process is restored.
    pub fn register_after_restore(&self, hook: impl RestoreHook + 'static) {
        let entry = self.entry(hook);
        debug!("Registered after-restore hook #{}", entry.sequence);
        lock(&self.after_restore).push_back(entry);
    }

    /// Number of pending before-snapshot hooks.
    pub fn before_snapshot_len(&self) -> usize {
        lock(&self.before_snapshot).len()
    }

    /// Number of pending after-restore hooks.
    pub fn after_restore_len(&self) -> usize {
        lock(&self.after_restore).len()
    }

    /// Run every before-snapshot hook, newest first.
    ///
    /// Stops at the first failure. Hooks registered while the pass runs are
    /// kept for the next pass.
    pub async fn invoke_before_snapshot_callbacks(&self) -> Result<(), HookFailure> {
        let mut pass = std::mem::take(&mut *lock(&self.before_snapshot));
        info!("Running {} before-snapshot hooks", pass.len());

        while let Some(entry) = pass.pop() {
            run_entry(Checkpoint::BeforeSnapshot, entry, pass.len()).await?;
        }
        Ok(())
    }

    /// Run every after-restore hook, oldest first.
    ///
    /// Same failure and late-registration behaviour as
    /// [`invoke_before_snapshot_callbacks`](Self::invoke_before_snapshot_callbacks).
    pub async fn invoke_after_restore_callbacks(&self) -> Result<(), HookFailure> {
        let mut pass = std::mem::take(&mut *lock(&self.after_restore));
        info!("Running {} after-restore hooks", pass.len());

        while let Some(entry) = pass.pop_front() {
            run_entry(Checkpoint::AfterRestore, entry, pass.len()).await?;
        }
        Ok(())
    }

    fn entry(&self, hook: impl RestoreHook + 'static) -> HookEntry {
        HookEntry {
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            hook: Box::new(hook),
        }
    }
}

async fn run_entry(
    checkpoint: Checkpoint,
    entry: HookEntry,
    remaining: usize,
) -> Result<(), HookFailure> {
    debug!("Running {} hook #{}", checkpoint, entry.sequence);
    entry.hook.run().await.map_err(|source| {
        error!(
            "{} hook #{} failed, skipping {} remaining: {}",
            checkpoint, entry.sequence, remaining, source
        );
        HookFailure {
            checkpoint,
            sequence: entry.sequence,
            skipped: remaining,
            source,
        }
    })
}

// Poisoning is ignored; a push or take never leaves a container half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
