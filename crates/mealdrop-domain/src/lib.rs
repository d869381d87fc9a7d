//! Domain types shared across the Mealdrop workspace.
//!
//! This crate contains only pure types with no framework dependencies, so
//! every layer of the server may import it, from the handlers down to the
//! repository implementations.

pub mod account;
pub mod geo;
pub mod pagination;
