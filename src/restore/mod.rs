//! Snapshot/restore lifecycle hooks.
//!
//! Application code registers hooks on a shared [`RestoreHooksRegistry`];
//! the bootstrap loop (or any other integration that learns about a
//! checkpoint) drains them at the right moment.

mod registry;

pub use registry::{
    hook_fn, BoxError, Checkpoint, FnHook, HookFailure, RestoreHook, RestoreHooksRegistry,
};
