//! HTTP surface for share links.
//!
//! Routes are nested under `/api/`. Patient routes sit behind the session
//! middleware; the clinician resolve route is public and rate-limited.
//!
//! The router is composable: `share_api_router()` returns a `Router` that
//! can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::share_api_router;
pub use server::{start_share_api_server_on, ShareApiServer, ShareApiSession};
pub use types::ApiContext;
