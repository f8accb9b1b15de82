//! Share API middleware.
//!
//! - `session`: patient routes, requires the upstream `X-Patient-Id`
//! - `rate`: public resolve route, per-client sliding windows

pub mod rate;
pub mod session;
