//! jsonbox core: the metric-extraction engine.
//!
//! This crate turns declarative metric specs into compiled descriptors and
//! evaluates them against a fetched JSON document. It carries no transport or
//! runtime dependencies; the exporter crate owns HTTP in both directions.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed config and
//! hostile response bodies surface as `ProbeError` or as per-node failures, so
//! a single bad target never takes the exporter down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod coerce;
pub mod compile;
pub mod error;
pub mod extract;
pub mod model;
pub mod path;

/// Shared result type.
pub use error::{ErrorKind, ProbeError, Result};
