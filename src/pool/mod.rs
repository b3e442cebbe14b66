//! Backend pool subsystem.
//!
//! # Data Flow
//! ```text
//! servers file (JSON / TOML, `servers = [...]`)
//!     → source.rs (read & parse, dedupe)
//!     → ServerPool::load (compare with current set)
//!         - same set      → no-op, no version bump
//!         - different set → ArcSwap store of a new PoolSnapshot
//!                           → watch channel carries the new version
//!
//! watcher.rs: notify event for the exact file → ServerPool::load
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; readers hold an `Arc` and never see a mix
//! - Single writer at a time (reload mutex), lock-free readers
//! - First load failure is fatal; later failures keep the stale snapshot

pub mod snapshot;
pub mod source;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use snapshot::PoolSnapshot;
pub use watcher::{PoolWatcher, ReloadOutcome, ServerPool};

/// Errors raised while loading or watching the pool source.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON pool file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML pool file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}
