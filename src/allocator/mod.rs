//! Credential allocation subsystem.
//!
//! # Data Flow
//! ```text
//! generate_url(label)
//!     → locks.rs (per-label critical section)
//!     → select_backend(label)
//!         → ServerPool::current() snapshot
//!         → probe every backend concurrently (bounded by timeouts)
//!         → placement.rs (existing credential first, else least loaded)
//!     → fresh list on the chosen backend
//!         - credential for label exists → invite.rs
//!         - backend full                → UserLimitReached
//!         - otherwise create, rename, set data limit → invite.rs
//! ```
//!
//! # Design Decisions
//! - Backends are the source of truth; every call re-reads them
//! - Probe failures exclude a backend for this call only, never fail it
//! - Probe results are reassembled in snapshot order before any decision
//! - Capacity is per backend; quota is per user

pub mod error;
pub mod identity;
pub mod invite;
pub mod locks;
pub mod placement;
pub mod usage;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{timeout_at, Instant};

use crate::backend::{BackendClient, BackendConnector, BackendError, BackendResult, Credential};
use crate::config::AllocatorConfig;
use crate::observability::metrics;
use crate::pool::ServerPool;

pub use error::AllocationError;
pub use identity::UserLabel;
pub use invite::InviteUrl;
pub use locks::LabelLocks;
pub use placement::Placement;
pub use usage::UsageReport;

/// Limits and time budgets, fixed at startup.
#[derive(Debug, Clone)]
pub struct AllocatorSettings {
    /// Maximum credentials on one backend.
    pub max_users: usize,
    /// Quota applied to every new credential.
    pub traffic_limit_bytes: u64,
    pub invite_prefix: String,
    /// Bound on each backend call.
    pub probe_timeout: Duration,
    /// Bound on a whole allocation.
    pub allocation_timeout: Duration,
}

impl AllocatorSettings {
    pub fn from_config(config: &AllocatorConfig) -> Self {
        Self {
            max_users: config.allocation.max_users,
            traffic_limit_bytes: config.allocation.traffic_limit_bytes(),
            invite_prefix: config.allocation.invite_prefix.clone(),
            probe_timeout: Duration::from_secs(config.timeouts.probe_secs),
            allocation_timeout: Duration::from_secs(config.timeouts.allocation_secs),
        }
    }
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self::from_config(&AllocatorConfig::default())
    }
}

type Probe = Option<(Arc<dyn BackendClient>, Vec<Credential>)>;

/// Places users' credentials on backends from the pool.
pub struct Allocator {
    pool: Arc<ServerPool>,
    connector: Arc<dyn BackendConnector>,
    settings: AllocatorSettings,
    locks: LabelLocks,
}

impl Allocator {
    pub fn new(
        pool: Arc<ServerPool>,
        connector: Arc<dyn BackendConnector>,
        settings: AllocatorSettings,
    ) -> Self {
        Self {
            pool,
            connector,
            settings,
            locks: LabelLocks::new(),
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }

    /// Find the backend holding `label`, or the least loaded reachable one.
    pub async fn select_backend(&self, label: &str) -> Result<Arc<dyn BackendClient>, AllocationError> {
        self.select(label, self.deadline()).await
    }

    /// Return the invite URL for `label`, creating a credential if needed.
    ///
    /// Repeated calls for the same label return the same URL and never create
    /// a second credential, including when they run concurrently.
    pub async fn generate_url(&self, label: &str) -> Result<InviteUrl, AllocationError> {
        let started = std::time::Instant::now();
        let result = self.allocate(label, self.deadline()).await;
        let outcome = match &result {
            Ok(_) => "issued",
            Err(e) => e.code(),
        };
        metrics::record_allocation(outcome, started);
        result
    }

    /// Report traffic usage for `label`. `None` if the user has no credential.
    pub async fn usage(&self, label: &str) -> Result<Option<UsageReport>, AllocationError> {
        let deadline = self.deadline();
        let backend = self.select(label, deadline).await?;
        let mut credentials = self
            .call(deadline, "list_credentials", backend.list_credentials())
            .await
            .map_err(|e| AllocationError::failed(backend.address(), e))?;

        // Traffic counters are advisory: without them usage reads as zero.
        match self.call(deadline, "transfer_usage", backend.transfer_usage()).await {
            Ok(usage) => {
                for credential in &mut credentials {
                    if let Some(bytes) = usage.get(&credential.id) {
                        credential.used_bytes = Some(*bytes);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(backend = %backend.address(), error = %e, "Transfer usage unavailable");
            }
        }

        Ok(UsageReport::compute(
            label,
            backend.address(),
            &credentials,
            self.settings.traffic_limit_bytes,
        ))
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.settings.allocation_timeout
    }

    async fn select(
        &self,
        label: &str,
        deadline: Instant,
    ) -> Result<Arc<dyn BackendClient>, AllocationError> {
        let snapshot = self.pool.current();
        if snapshot.is_empty() {
            tracing::error!(version = snapshot.version(), "No VPN servers configured");
            return Err(AllocationError::NoBackendsAvailable);
        }

        // All probes finish before precedence is decided, so arrival order
        // never matters.
        let mut probes: Vec<Probe> = join_all(
            snapshot
                .servers()
                .iter()
                .map(|address| self.probe(address, deadline)),
        )
        .await;

        let placement = {
            let listings: Vec<Option<&[Credential]>> = probes
                .iter()
                .map(|probe| probe.as_ref().map(|(_, creds)| creds.as_slice()))
                .collect();
            placement::place(label, &listings)
        };
        let unreachable = AllocationError::AllBackendsUnreachable { probed: snapshot.len() };

        let Some(placement) = placement else {
            tracing::error!(probed = snapshot.len(), label = %label, "No VPN backend responded");
            return Err(unreachable);
        };
        let Some((client, credentials)) = probes.swap_remove(placement.index()) else {
            return Err(unreachable);
        };

        match placement {
            Placement::Existing(_) => {
                tracing::debug!(backend = %client.address(), label = %label, "User already placed");
            }
            Placement::LeastLoaded(_) => {
                tracing::debug!(
                    backend = %client.address(),
                    label = %label,
                    credentials = credentials.len(),
                    "Least loaded backend selected"
                );
            }
        }
        Ok(client)
    }

    async fn probe(&self, address: &str, deadline: Instant) -> Probe {
        let client = match self.connector.connect(address) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(backend = %address, error = %e, "Could not connect to backend");
                metrics::record_probe_failure(address);
                return None;
            }
        };

        let result = self
            .call(deadline, "list_credentials", client.list_credentials())
            .await;
        match result {
            Ok(credentials) => Some((client, credentials)),
            Err(e) => {
                tracing::error!(backend = %address, error = %e, "Backend probe failed");
                metrics::record_probe_failure(address);
                None
            }
        }
    }

    async fn allocate(&self, label: &str, deadline: Instant) -> Result<InviteUrl, AllocationError> {
        let _guard = match timeout_at(deadline, self.locks.acquire(label)).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::warn!(label = %label, "Timed out waiting for a concurrent allocation");
                return Err(AllocationError::AllocationFailed {
                    backend: None,
                    reason: "timed out waiting for a concurrent allocation of the same user".into(),
                });
            }
        };

        let backend = self.select(label, deadline).await?;
        let address = backend.address().to_string();

        // Selection was a separate read; decide on fresh state.
        let credentials = self
            .call(deadline, "list_credentials", backend.list_credentials())
            .await
            .map_err(|e| {
                tracing::error!(backend = %address, error = %e, "Selected backend stopped responding");
                AllocationError::failed(&address, e)
            })?;

        if let Some(existing) = credentials.iter().find(|c| c.label == label) {
            tracing::info!(backend = %address, label = %label, credential_id = %existing.id, "Returning existing credential");
            return Ok(self.invite(&existing.access_url));
        }

        if credentials.len() >= self.settings.max_users {
            tracing::warn!(
                backend = %address,
                label = %label,
                credentials = credentials.len(),
                max_users = self.settings.max_users,
                "User limit reached, no VPN resources left"
            );
            return Err(AllocationError::UserLimitReached {
                backend: address,
                max_users: self.settings.max_users,
            });
        }

        let created = self
            .call(deadline, "create_credential", backend.create_credential())
            .await
            .map_err(|e| {
                tracing::error!(backend = %address, label = %label, error = %e, "Failed to create credential");
                AllocationError::failed(&address, e)
            })?;

        let mut pending = PendingCredential::new(&address, &created.id, label);
        if let Err(e) = self.configure(backend.as_ref(), &created.id, label, deadline).await {
            pending.disarm();
            tracing::error!(
                backend = %address,
                label = %label,
                credential_id = %created.id,
                error = %e,
                "Credential created but not configured; orphaned credential on backend"
            );
            metrics::record_orphan(&address);
            self.discard(backend.as_ref(), &created.id).await;
            return Err(AllocationError::failed(&address, e));
        }
        pending.disarm();

        tracing::info!(backend = %address, label = %label, credential_id = %created.id, "Credential issued");
        Ok(self.invite(&created.access_url))
    }

    async fn configure(
        &self,
        backend: &dyn BackendClient,
        id: &str,
        label: &str,
        deadline: Instant,
    ) -> BackendResult<()> {
        self.call(deadline, "rename_credential", backend.rename_credential(id, label))
            .await?;
        self.call(
            deadline,
            "set_data_limit",
            backend.set_data_limit(id, self.settings.traffic_limit_bytes),
        )
        .await
    }

    /// Best-effort removal of a half-configured credential.
    async fn discard(&self, backend: &dyn BackendClient, id: &str) {
        match tokio::time::timeout(self.settings.probe_timeout, backend.delete_credential(id)).await {
            Ok(Ok(())) => {
                tracing::info!(backend = %backend.address(), credential_id = %id, "Orphaned credential removed");
            }
            Ok(Err(e)) => {
                tracing::warn!(backend = %backend.address(), credential_id = %id, error = %e, "Could not remove orphaned credential");
            }
            Err(_) => {
                tracing::warn!(backend = %backend.address(), credential_id = %id, "Timed out removing orphaned credential");
            }
        }
    }

    /// Run one backend call within the probe timeout and the call deadline.
    async fn call<T>(
        &self,
        deadline: Instant,
        operation: &'static str,
        fut: impl Future<Output = BackendResult<T>>,
    ) -> BackendResult<T> {
        let now = Instant::now();
        let until = std::cmp::min(now + self.settings.probe_timeout, deadline);
        match timeout_at(until, fut).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                operation,
                millis: until.saturating_duration_since(now).as_millis(),
            }),
        }
    }

    fn invite(&self, access_url: &str) -> InviteUrl {
        InviteUrl::new(&self.settings.invite_prefix, access_url)
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("pool", &self.pool)
            .field("settings", &self.settings)
            .field("labels_in_flight", &self.locks.in_flight())
            .finish_non_exhaustive()
    }
}

/// Flags a created credential until it is fully configured.
///
/// If the allocation future is dropped in between, the orphan is logged.
struct PendingCredential<'a> {
    backend: &'a str,
    id: &'a str,
    label: &'a str,
    armed: bool,
}

impl<'a> PendingCredential<'a> {
    fn new(backend: &'a str, id: &'a str, label: &'a str) -> Self {
        Self { backend, id, label, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingCredential<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(
                backend = %self.backend,
                label = %self.label,
                credential_id = %self.id,
                "Allocation cancelled after credential creation; orphaned credential on backend"
            );
            metrics::record_orphan(self.backend);
        }
    }
}
