//! rediz
//!
//! Namespaced accessors for strings, lists, sets, sorted sets and hashes over
//! a single shared Redis connection, with a per-client batch pipe.

#![forbid(unsafe_code)]

pub mod backend;
pub mod core;
pub mod observability;
pub mod prelude;
