//! In-process backend.
//!
//! Keeps credentials in a mutex-guarded vector and supports failure injection
//! per operation, so allocation behaviour can be exercised without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{BackendClient, BackendConnector, BackendError, BackendResult, Credential};

/// Operations that can be made to fail on a [`MemoryBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Rename,
    SetDataLimit,
    Delete,
    TransferUsage,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::List => "list_credentials",
            Operation::Create => "create_credential",
            Operation::Rename => "rename_credential",
            Operation::SetDataLimit => "set_data_limit",
            Operation::Delete => "delete_credential",
            Operation::TransferUsage => "transfer_usage",
        }
    }
}

#[derive(Debug, Default)]
struct State {
    credentials: Vec<Credential>,
    limits: HashMap<String, u64>,
    usage: HashMap<String, u64>,
}

/// A backend living in process memory.
#[derive(Debug)]
pub struct MemoryBackend {
    address: String,
    state: Mutex<State>,
    next_id: AtomicU64,
    failing: Mutex<Vec<Operation>>,
    unreachable: AtomicBool,
    delay_ms: AtomicU64,
    op_delays: Mutex<HashMap<Operation, Duration>>,
    create_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(0),
            failing: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            op_delays: Mutex::new(HashMap::new()),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Create a backend pre-populated with one credential per label.
    pub fn with_labels<I, S>(address: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new(address);
        for label in labels {
            backend.insert(label.into());
        }
        backend
    }

    /// Create a backend holding `count` credentials with generated labels.
    pub fn with_load(address: impl Into<String>, count: usize) -> Self {
        let address = address.into();
        let labels: Vec<String> = (0..count).map(|i| format!("seed_{}_{}", address, i)).collect();
        Self::with_labels(address, labels)
    }

    fn insert(&self, label: String) -> Credential {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let credential = Credential {
            access_url: format!("ss://key-{}@{}/?outline=1", id, self.address),
            id,
            label,
            used_bytes: None,
        };
        self.lock().credentials.push(credential.clone());
        credential
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory backend mutex poisoned")
    }

    /// Make every call fail as if the backend were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }

    /// Make a single operation fail.
    pub fn fail(&self, op: Operation) {
        let mut failing = self.failing.lock().expect("memory backend mutex poisoned");
        if !failing.contains(&op) {
            failing.push(op);
        }
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        self.failing.lock().expect("memory backend mutex poisoned").clear();
        self.unreachable.store(false, Ordering::Relaxed);
    }

    /// Delay every call, to widen race windows in tests.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Delay one operation only. A zero delay clears it.
    pub fn set_op_delay(&self, op: Operation, delay: Duration) {
        let mut delays = self.op_delays.lock().expect("memory backend mutex poisoned");
        if delay.is_zero() {
            delays.remove(&op);
        } else {
            delays.insert(op, delay);
        }
    }

    /// Record transferred bytes for a credential. Reported by
    /// `transfer_usage`, not by the credential list.
    pub fn set_usage(&self, id: &str, bytes: u64) {
        self.lock().usage.insert(id.to_string(), bytes);
    }

    pub fn credentials(&self) -> Vec<Credential> {
        self.lock().credentials.clone()
    }

    pub fn credential_count(&self) -> usize {
        self.lock().credentials.len()
    }

    /// Number of credentials carrying `label`.
    pub fn count_label(&self, label: &str) -> usize {
        self.lock().credentials.iter().filter(|c| c.label == label).count()
    }

    /// Quota recorded for a credential, if any.
    pub fn data_limit(&self, id: &str) -> Option<u64> {
        self.lock().limits.get(id).copied()
    }

    /// How many times `create_credential` succeeded.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    async fn enter(&self, op: Operation) -> BackendResult<()> {
        let op_delay = self
            .op_delays
            .lock()
            .expect("memory backend mutex poisoned")
            .get(&op)
            .copied()
            .unwrap_or_default();
        let delay = Duration::from_millis(self.delay_ms.load(Ordering::Relaxed)).max(op_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(BackendError::Transport(format!("{} is unreachable", self.address)));
        }
        let failing = self.failing.lock().expect("memory backend mutex poisoned");
        if failing.contains(&op) {
            return Err(BackendError::Status { operation: op.name(), status: 500 });
        }
        Ok(())
    }
}

#[async_trait]
impl BackendClient for MemoryBackend {
    fn address(&self) -> &str {
        &self.address
    }

    async fn list_credentials(&self) -> BackendResult<Vec<Credential>> {
        self.enter(Operation::List).await?;
        Ok(self.credentials())
    }

    async fn create_credential(&self) -> BackendResult<Credential> {
        self.enter(Operation::Create).await?;
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.insert(String::new()))
    }

    async fn rename_credential(&self, id: &str, label: &str) -> BackendResult<()> {
        self.enter(Operation::Rename).await?;
        let mut state = self.lock();
        let credential = state
            .credentials
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        credential.label = label.to_string();
        Ok(())
    }

    async fn set_data_limit(&self, id: &str, bytes: u64) -> BackendResult<()> {
        self.enter(Operation::SetDataLimit).await?;
        let mut state = self.lock();
        if !state.credentials.iter().any(|c| c.id == id) {
            return Err(BackendError::NotFound(id.to_string()));
        }
        state.limits.insert(id.to_string(), bytes);
        Ok(())
    }

    async fn delete_credential(&self, id: &str) -> BackendResult<()> {
        self.enter(Operation::Delete).await?;
        let mut state = self.lock();
        let before = state.credentials.len();
        state.credentials.retain(|c| c.id != id);
        if state.credentials.len() == before {
            return Err(BackendError::NotFound(id.to_string()));
        }
        state.limits.remove(id);
        state.usage.remove(id);
        Ok(())
    }

    async fn transfer_usage(&self) -> BackendResult<HashMap<String, u64>> {
        self.enter(Operation::TransferUsage).await?;
        Ok(self.lock().usage.clone())
    }
}

/// Resolves pool addresses to registered in-memory backends.
///
/// Addresses without a registered backend fail to connect, which the
/// allocator treats like any other unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    backends: Mutex<HashMap<String, Arc<MemoryBackend>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own address and return it.
    pub fn register(&self, backend: MemoryBackend) -> Arc<MemoryBackend> {
        let backend = Arc::new(backend);
        self.backends
            .lock()
            .expect("memory connector mutex poisoned")
            .insert(backend.address.clone(), backend.clone());
        backend
    }

    pub fn get(&self, address: &str) -> Option<Arc<MemoryBackend>> {
        self.backends
            .lock()
            .expect("memory connector mutex poisoned")
            .get(address)
            .cloned()
    }
}

impl BackendConnector for MemoryConnector {
    fn connect(&self, address: &str) -> BackendResult<Arc<dyn BackendClient>> {
        match self.get(address) {
            Some(backend) => Ok(backend as Arc<dyn BackendClient>),
            None => Err(BackendError::InvalidAddress {
                address: address.to_string(),
                reason: "no such backend".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rename_limit() {
        let backend = MemoryBackend::new("mem://a");
        let key = backend.create_credential().await.unwrap();
        assert_eq!(key.label, "");

        backend.rename_credential(&key.id, "Ann_Lee_1").await.unwrap();
        backend.set_data_limit(&key.id, 1024).await.unwrap();

        let keys = backend.list_credentials().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].label, "Ann_Lee_1");
        assert_eq!(backend.data_limit(&key.id), Some(1024));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::with_load("mem://a", 2);
        backend.fail(Operation::Rename);
        assert!(backend.list_credentials().await.is_ok());
        assert!(backend.rename_credential("0", "x").await.is_err());

        backend.set_unreachable(true);
        assert!(matches!(
            backend.list_credentials().await,
            Err(BackendError::Transport(_))
        ));

        backend.heal();
        backend.rename_credential("0", "x").await.unwrap();
        assert_eq!(backend.count_label("x"), 1);
    }

    #[tokio::test]
    async fn test_usage_reported_separately() {
        let backend = MemoryBackend::with_load("mem://a", 2);
        backend.set_usage("1", 300);

        let keys = backend.list_credentials().await.unwrap();
        assert!(keys.iter().all(|k| k.used_bytes.is_none()));
        assert_eq!(backend.transfer_usage().await.unwrap().get("1"), Some(&300));

        backend.fail(Operation::TransferUsage);
        assert!(backend.transfer_usage().await.is_err());
        assert!(backend.list_credentials().await.is_ok());
    }

    #[tokio::test]
    async fn test_op_delay_applies_to_one_operation() {
        let backend = MemoryBackend::with_load("mem://a", 1);
        backend.set_op_delay(Operation::Rename, Duration::from_secs(5));

        let list = tokio::time::timeout(Duration::from_millis(100), backend.list_credentials()).await;
        assert!(list.is_ok());
        let rename = tokio::time::timeout(Duration::from_millis(100), backend.rename_credential("0", "x")).await;
        assert!(rename.is_err());

        backend.set_op_delay(Operation::Rename, Duration::ZERO);
        backend.rename_credential("0", "x").await.unwrap();
    }

    #[test]
    fn test_connector_unknown_address() {
        let connector = MemoryConnector::new();
        connector.register(MemoryBackend::new("mem://a"));
        assert!(connector.connect("mem://a").is_ok());
        assert!(connector.connect("mem://b").is_err());
    }
}
