//! Shared application state for the exporter.
//!
//! The config tree is read-only for the life of the process. Everything a
//! probe builds (descriptors, registry, samples) lives on that probe's task.

use std::sync::Arc;

use jsonbox_core::compile::compile_module;
use jsonbox_core::error::{ProbeError, Result};

use crate::config::{ExporterConfig, ModuleConfig};
use crate::obs::collector::{RequestCollector, SampleCollector};
use crate::obs::metrics::ExporterMetrics;
use crate::obs::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<ExporterConfig>,
    metrics: Arc<ExporterMetrics>,
}

impl AppState {
    /// Build application state.
    ///
    /// Every module is compiled once here so a broken config fails at boot
    /// instead of on the first probe.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        for (name, module) in &cfg.modules {
            let descriptors = compile_module(name, &module.metrics).map_err(|e| {
                ProbeError::Config(format!("module compile failed (module={name}): {e}"))
            })?;

            // Same describe pass a probe runs, so name collisions with the
            // request diagnostics (or between metrics) fail here.
            let mut registry = Registry::new();
            let described = registry
                .register(Box::new(RequestCollector::new(name, 0, 0)))
                .and_then(|()| registry.register(Box::new(SampleCollector::new(&descriptors, &[]))));
            if let Err(e) = described {
                return Err(ProbeError::Config(format!(
                    "module compile failed (module={name}): {e}"
                )));
            }

            if module.request.method.is_some() {
                tracing::warn!(module = %name, "request.method is ignored; the method follows from body presence");
            }
            tracing::debug!(module = %name, descriptors = descriptors.len(), "module compiled");
        }

        Ok(Self {
            cfg: Arc::new(cfg),
            metrics: Arc::new(ExporterMetrics::default()),
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.cfg
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.cfg.module(name)
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }
}
