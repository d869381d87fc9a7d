//! Shared HTTP service plumbing for the Mealdrop workspace.
//!
//! Everything here is framework-facing and domain-free: the JSON error
//! body, health handlers, request-id middleware, timestamp serialization,
//! and tracing bootstrap.

pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
