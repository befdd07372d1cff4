//! Metric configuration model and its compiled forms.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{ProbeError, Result};
use crate::path::Path;

/// One `metrics:` entry of a module, as written in config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    pub name: String,

    /// Keypath selecting the node-set this metric iterates over.
    pub path: String,

    /// Label name -> path relative to each selected node.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// `value` (default) or `object`. Kept raw; the compiler rejects unknowns.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    #[serde(default)]
    pub help: Option<String>,

    /// Object metrics only: suffix -> path relative to each selected node.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl MetricSpec {
    /// Help text, falling back to the metric name.
    pub fn help(&self) -> &str {
        match self.help.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => &self.name,
        }
    }

    /// Resolve the raw `type` string into a closed kind.
    pub fn kind(&self) -> Result<MetricKind> {
        match self.kind.as_deref().unwrap_or("value") {
            "value" | "" => Ok(MetricKind::Value),
            "object" => {
                if self.values.is_empty() {
                    return Err(ProbeError::Config(format!(
                        "object metric '{}' declares no values",
                        self.name
                    )));
                }
                let values = self
                    .values
                    .iter()
                    .map(|(suffix, p)| Ok((suffix.clone(), Path::parse(p)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(MetricKind::Object { values })
            }
            other => Err(ProbeError::Config(format!(
                "unknown metric type: '{other}', for metric: '{}'",
                self.name
            ))),
        }
    }
}

/// How a spec expands into descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    /// The selected node is the value.
    Value,
    /// One descriptor per `(suffix, valuepath)`.
    Object { values: Vec<(String, Path)> },
}

/// Compiled, immutable description of one metric family.
///
/// `label_names` and `label_paths` are aligned by position, and that order
/// is used for every sample of this descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    fq_name: String,
    help: String,
    label_names: Vec<String>,
    label_paths: Vec<Path>,
    keypath: Path,
    valuepath: Option<Path>,
}

impl MetricDescriptor {
    pub(crate) fn new(
        fq_name: String,
        help: String,
        labels: Vec<(String, Path)>,
        keypath: Path,
        valuepath: Option<Path>,
    ) -> Self {
        let (label_names, label_paths) = labels.into_iter().unzip();
        Self { fq_name, help, label_names, label_paths, keypath, valuepath }
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }
    pub fn help(&self) -> &str {
        &self.help
    }
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
    pub fn label_paths(&self) -> &[Path] {
        &self.label_paths
    }
    pub fn keypath(&self) -> &Path {
        &self.keypath
    }
    pub fn valuepath(&self) -> Option<&Path> {
        self.valuepath.as_ref()
    }
}

/// One extracted data point.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSample {
    /// Index into the descriptor list the sample was extracted with.
    pub descriptor: usize,
    /// Aligned with the descriptor's `label_names`.
    pub label_values: Vec<String>,
    pub value: f64,
}
