//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → handlers.rs (identity → UserLabel → Allocator)
//!     → response.rs (AllocationError → status + JSON body)
//! ```
//!
//! | Method | Path                     | Result                         |
//! |--------|--------------------------|--------------------------------|
//! | POST   | `/api/v1/invites`        | `{label, url}`                 |
//! | GET    | `/api/v1/usage/{label}`  | usage report or 404            |
//! | GET    | `/api/v1/servers`        | current pool snapshot          |
//! | GET    | `/health`                | liveness                       |

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use handlers::{InviteRequest, InviteResponse, ServersResponse};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::{ApiError, ErrorBody};
pub use server::{AppState, HttpServer};
