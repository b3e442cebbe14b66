//! VPN credential allocator library.

// Core subsystems
pub mod allocator;
pub mod backend;
pub mod pool;

// Outer surface
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use allocator::{AllocationError, Allocator, AllocatorSettings, InviteUrl, UsageReport, UserLabel};
pub use backend::{BackendClient, BackendConnector, Credential};
pub use config::AllocatorConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pool::{PoolWatcher, ServerPool};
