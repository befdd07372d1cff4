//! Extraction engine: JSON document + descriptors -> samples.
//!
//! The document is parsed once per probe. Every descriptor's keypath is
//! evaluated against the root; each matched node yields at most one sample.
//! A node whose value cannot be coerced is skipped and reported in
//! `Extraction::failures`; it never affects other nodes or descriptors.

use std::fmt;

use serde_json::Value;

use crate::coerce::coerce;
use crate::error::{CoercionError, ProbeError, Result};
use crate::model::{ExtractedSample, MetricDescriptor};

/// A node skipped during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionFailure {
    /// Fully-qualified name of the descriptor being evaluated.
    pub metric: String,
    pub error: CoercionError,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.error)
    }
}

/// Output of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Descriptor declaration order, then document order within a descriptor.
    pub samples: Vec<ExtractedSample>,
    pub failures: Vec<ExtractionFailure>,
}

/// Parse `data` and extract samples for every descriptor.
pub fn extract(data: &[u8], descriptors: &[MetricDescriptor]) -> Result<Extraction> {
    let doc: Value = serde_json::from_slice(data)
        .map_err(|e| ProbeError::Parse(format!("invalid json: {e}")))?;
    Ok(extract_document(&doc, descriptors))
}

/// Extract from an already parsed document.
pub fn extract_document(doc: &Value, descriptors: &[MetricDescriptor]) -> Extraction {
    let mut out = Extraction::default();

    for (idx, desc) in descriptors.iter().enumerate() {
        let nodes = desc.keypath().evaluate(doc);
        if nodes.is_empty() {
            tracing::trace!(metric = desc.fq_name(), path = %desc.keypath(), "keypath matched no nodes");
        }

        for node in nodes {
            let raw = match desc.valuepath() {
                Some(vp) => vp.first(node),
                None => Some(node),
            };

            let value = match coerce(raw) {
                Ok(v) => v,
                Err(error) => {
                    out.failures.push(ExtractionFailure {
                        metric: desc.fq_name().to_string(),
                        error,
                    });
                    continue;
                }
            };

            let label_values = desc
                .label_paths()
                .iter()
                .map(|p| label_value(p.first(node)))
                .collect();

            out.samples.push(ExtractedSample { descriptor: idx, label_values, value });
        }
    }

    out
}

/// Stringify a label node. Missing and non-scalar values become "".
pub fn label_value(node: Option<&Value>) -> String {
    match node {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => number_label(n),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

// Integers print exactly; floats print in shortest form, so `1.0` becomes "1".
fn number_label(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}
