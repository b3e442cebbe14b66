//! Pool file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::observability::metrics;
use crate::pool::snapshot::PoolSnapshot;
use crate::pool::source::read_servers;
use crate::pool::PoolError;

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Same set of servers; the installed snapshot was kept.
    Unchanged,
    /// A new snapshot was installed.
    Updated { version: u64 },
}

/// The current backend pool, reloadable from its source file.
///
/// Readers call [`ServerPool::current`] and get an immutable snapshot.
/// Writers go through [`ServerPool::load`] or [`ServerPool::replace`].
pub struct ServerPool {
    path: PathBuf,
    current: ArcSwap<PoolSnapshot>,
    writer: Mutex<()>,
    version_tx: watch::Sender<u64>,
}

impl ServerPool {
    /// Load the pool from `path`. Fails if the first load fails.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PoolError> {
        let path = path.into();
        let servers = read_servers(&path)?;
        let snapshot = PoolSnapshot::new(1, servers);
        metrics::record_pool_size(snapshot.len());
        tracing::info!(path = ?path, servers = snapshot.len(), "Backend pool loaded");

        let (version_tx, _) = watch::channel(snapshot.version());
        Ok(Self {
            path,
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(()),
            version_tx,
        })
    }

    /// Path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The latest installed snapshot.
    pub fn current(&self) -> Arc<PoolSnapshot> {
        self.current.load_full()
    }

    /// Receiver signalled with the new version on every installed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Re-read the source file and install it if the server set changed.
    ///
    /// On error the installed snapshot is left untouched.
    pub fn load(&self) -> Result<ReloadOutcome, PoolError> {
        match read_servers(&self.path) {
            Ok(servers) => Ok(self.replace(servers)),
            Err(e) => {
                metrics::record_pool_reload("error");
                Err(e)
            }
        }
    }

    /// Install `servers` unless they equal the current set.
    pub fn replace(&self, servers: Vec<String>) -> ReloadOutcome {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load();
        if current.same_servers(&servers) {
            tracing::debug!(version = current.version(), "Backend pool unchanged");
            metrics::record_pool_reload("unchanged");
            return ReloadOutcome::Unchanged;
        }

        let version = current.version() + 1;
        let snapshot = PoolSnapshot::new(version, servers);
        tracing::info!(
            version,
            previous = current.len(),
            servers = snapshot.len(),
            "Backend pool updated"
        );
        metrics::record_pool_size(snapshot.len());
        metrics::record_pool_reload("updated");
        self.current.store(Arc::new(snapshot));
        self.version_tx.send_replace(version);
        ReloadOutcome::Updated { version }
    }
}

impl std::fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPool")
            .field("path", &self.path)
            .field("current", &self.current.load())
            .finish()
    }
}

/// Watches the pool file and reloads the pool on modification.
///
/// The parent directory is watched (editors often replace files by rename)
/// and events are filtered down to the exact file. Dropping the watcher
/// stops observation.
pub struct PoolWatcher {
    pool: Arc<ServerPool>,
    watcher: Option<RecommendedWatcher>,
}

impl PoolWatcher {
    /// Start watching the pool's source file.
    pub fn start(pool: Arc<ServerPool>) -> Result<Self, PoolError> {
        let (dir, target) = watch_target(pool.path())?;
        let reload_pool = pool.clone();
        let event_target = target.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    if !event.paths.iter().any(|p| p == &event_target) {
                        return;
                    }
                    tracing::debug!(kind = ?event.kind, "Pool file change detected, reloading...");
                    if let Err(e) = reload_pool.load() {
                        tracing::error!(error = %e, "Failed to reload backend pool. Keeping current snapshot.");
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?target, "Pool watcher started");

        Ok(Self {
            pool,
            watcher: Some(watcher),
        })
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop observing the file. The pool keeps its last snapshot.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            tracing::info!(path = ?self.pool.path(), "Pool watcher stopped");
        }
    }
}

impl Drop for PoolWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolve the directory to watch and the absolute path events will carry.
fn watch_target(path: &Path) -> Result<(PathBuf, PathBuf), PoolError> {
    let io_err = |source| PoolError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io_err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path")))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let dir = parent.canonicalize().map_err(io_err)?;
    let target = dir.join(file_name);
    Ok((dir, target))
}
