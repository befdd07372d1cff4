//! Exporter config loader (strict parsing).

pub mod schema;

use std::fs;

use jsonbox_core::error::{ProbeError, Result};

pub use schema::{
    BasicAuth, BodyConfig, ClientConfig, ExporterConfig, ModuleConfig, RequestConfig, TlsConfig,
};

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ProbeError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg: ExporterConfig = serde_yaml::from_str(s)
        .map_err(|e| ProbeError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
