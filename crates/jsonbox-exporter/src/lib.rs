//! jsonbox exporter library entry.
//!
//! This crate wires the extraction engine from `jsonbox-core` into an HTTP
//! probe service: config loading, outbound request rendering, fetching,
//! per-probe metric registries, and the axum router. It is consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod probe;
pub mod router;
