//! Backend management capability.
//!
//! # Data Flow
//! ```text
//! Allocator
//!     → BackendConnector::connect(address)
//!     → BackendClient (one per backend address)
//!         - outline.rs (HTTP management API via reqwest)
//!         - memory.rs  (in-process backend for tests and dry runs)
//! ```
//!
//! # Design Decisions
//! - The allocator only sees the `BackendClient` trait, never a transport
//! - Backends own credential state; clients hold no cache between calls
//! - Every client error carries enough context to log with the backend address

pub mod memory;
pub mod outline;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryBackend, MemoryConnector};
pub use outline::{OutlineClient, OutlineConnector};

/// One access key issued by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Backend-scoped identifier.
    pub id: String,
    /// Display label; the allocator stores the user label here.
    pub label: String,
    /// Access descriptor used to build the invite URL.
    pub access_url: String,
    /// Bytes transferred, when the backend reports it.
    pub used_bytes: Option<u64>,
}

/// Errors raised by a backend client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The address could not be turned into a client.
    #[error("invalid backend address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Transport failure (connect, TLS, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status} for {operation}")]
    Status { operation: &'static str, status: u16 },

    /// The response body did not match the expected shape.
    #[error("malformed response for {operation}: {reason}")]
    Decode { operation: &'static str, reason: String },

    /// The call did not finish within its time budget.
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u128 },

    /// Credential id unknown to the backend.
    #[error("credential {0} not found")]
    NotFound(String),
}

impl BackendError {
    /// Create a transport error from any error type.
    #[inline]
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Management operations the allocator needs from one backend.
///
/// Implementations must be `Send + Sync`: probes for different backends run
/// concurrently and a client may be shared across allocation calls.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Address this client talks to, as written in the pool file.
    fn address(&self) -> &str;

    /// List every credential on the backend.
    async fn list_credentials(&self) -> BackendResult<Vec<Credential>>;

    /// Create a credential with the backend's default label and no quota.
    async fn create_credential(&self) -> BackendResult<Credential>;

    /// Set the display label of a credential.
    async fn rename_credential(&self, id: &str, label: &str) -> BackendResult<()>;

    /// Set the traffic quota of a credential, in bytes.
    async fn set_data_limit(&self, id: &str, bytes: u64) -> BackendResult<()>;

    /// Remove a credential. Only used to clean up half-configured keys.
    async fn delete_credential(&self, id: &str) -> BackendResult<()>;

    /// Bytes transferred per credential id. Ids without traffic may be absent.
    ///
    /// Kept apart from `list_credentials` so that probes never wait on it.
    async fn transfer_usage(&self) -> BackendResult<HashMap<String, u64>>;
}

/// Builds clients for pool addresses.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, address: &str) -> BackendResult<Arc<dyn BackendClient>>;
}
