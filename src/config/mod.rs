//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AllocatorConfig (validated, immutable)
//!     → shared by value/Arc with all subsystems
//! ```
//!
//! The backend pool is NOT part of this config: it lives in its own file and
//! is hot-reloaded by `crate::pool`. Everything here is fixed at startup.
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::AllocatorConfig;
pub use schema::{AllocationConfig, BackendConfig, ListenerConfig, ObservabilityConfig, PoolConfig, TimeoutConfig};
