//! Allocation failures visible to callers.

use thiserror::Error;

/// Everything that can go wrong in an allocation, as seen by the caller.
///
/// Transport and protocol errors from single backends are logged and folded
/// into one of these; nothing lower-level crosses this boundary.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The pool snapshot is empty.
    #[error("no VPN backends are configured")]
    NoBackendsAvailable,

    /// Every backend in the snapshot failed its probe.
    #[error("none of the {probed} VPN backends responded")]
    AllBackendsUnreachable { probed: usize },

    /// The least loaded backend is full, so the whole pool is.
    #[error("backend {backend} already holds {max_users} credentials")]
    UserLimitReached { backend: String, max_users: usize },

    /// A backend call after selection failed or the deadline ran out.
    #[error("allocation failed on {}: {reason}", backend.as_deref().unwrap_or("<no backend>"))]
    AllocationFailed {
        backend: Option<String>,
        reason: String,
    },
}

impl AllocationError {
    pub(crate) fn failed(backend: &str, reason: impl std::fmt::Display) -> Self {
        Self::AllocationFailed {
            backend: Some(backend.to_string()),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::NoBackendsAvailable => "no_backends_available",
            AllocationError::AllBackendsUnreachable { .. } => "all_backends_unreachable",
            AllocationError::UserLimitReached { .. } => "user_limit_reached",
            AllocationError::AllocationFailed { .. } => "allocation_failed",
        }
    }
}
