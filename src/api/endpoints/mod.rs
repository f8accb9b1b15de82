//! Share API endpoint handlers.

pub mod health;
pub mod share;
