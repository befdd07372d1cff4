//! Top-level facade crate for jsonbox.
//!
//! Re-exports the extraction engine and the exporter library so users can depend on a single crate.

pub mod core {
    pub use jsonbox_core::*;
}

pub mod exporter {
    pub use jsonbox_exporter::*;
}
