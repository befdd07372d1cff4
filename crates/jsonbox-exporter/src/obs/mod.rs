//! Metrics plumbing.
//!
//! - `registry`  : per-probe registry + Prometheus text exposition
//! - `collector` : probe collectors (request diagnostics, extracted samples)
//! - `metrics`   : exporter self-metrics for `/metrics`

pub mod collector;
pub mod metrics;
pub mod registry;
