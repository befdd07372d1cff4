//! Probe pipeline: render -> fetch -> extract -> expose.

pub mod fetch;
pub mod handler;
pub mod render;
pub mod template;
