//! Process-wide engine configuration.
//!
//! The only knob is the soft-delete mode: when enabled, compiled queries
//! implicitly filter out rows whose `deleted_at` timestamp is set, and
//! [`delete`](crate::delete) marks rows instead of removing them.
//!
//! The toggle is plain process-wide state with no synchronization beyond
//! atomic loads; flip it during startup or single-threaded test setup, not
//! while other threads are compiling queries.

use std::sync::atomic::{AtomicBool, Ordering};

static SOFT_DELETE_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable soft-delete mode for the whole process.
pub fn use_soft_delete(enabled: bool) {
    SOFT_DELETE_MODE.store(enabled, Ordering::Relaxed);
}

/// Current soft-delete mode.
pub fn soft_delete_enabled() -> bool {
    SOFT_DELETE_MODE.load(Ordering::Relaxed)
}
