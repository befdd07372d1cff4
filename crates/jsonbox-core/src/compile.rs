//! Metric compiler: module metric specs -> ordered descriptor list.

use crate::error::{ProbeError, Result};
use crate::model::{MetricDescriptor, MetricKind, MetricSpec};
use crate::path::Path;

/// Compile every metric of `module`, in declaration order.
///
/// Any error aborts the whole module: a partially compiled module would
/// silently drop series.
pub fn compile_module(module: &str, specs: &[MetricSpec]) -> Result<Vec<MetricDescriptor>> {
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs {
        compile_metric(module, spec, &mut out)?;
    }
    Ok(out)
}

fn compile_metric(module: &str, spec: &MetricSpec, out: &mut Vec<MetricDescriptor>) -> Result<()> {
    if spec.name.is_empty() {
        return Err(ProbeError::Config(format!("module {module}: metric name must not be empty")));
    }

    let kind = spec.kind()?;
    let keypath = Path::parse(&spec.path)?;

    // BTreeMap iteration fixes label order at compile time.
    let mut labels = Vec::with_capacity(spec.labels.len());
    for (name, p) in &spec.labels {
        if !is_valid_label_name(name) {
            return Err(ProbeError::Config(format!(
                "metric '{}': invalid label name '{name}'",
                spec.name
            )));
        }
        labels.push((name.clone(), Path::parse(p)?));
    }

    match kind {
        MetricKind::Value => {
            let fq_name = fq_name(&[module, &spec.name])?;
            out.push(MetricDescriptor::new(fq_name, spec.help().to_string(), labels, keypath, None));
        }
        MetricKind::Object { values } => {
            for (suffix, valuepath) in values {
                let fq_name = fq_name(&[module, &spec.name, &suffix])?;
                out.push(MetricDescriptor::new(
                    fq_name,
                    spec.help().to_string(),
                    labels.clone(),
                    keypath.clone(),
                    Some(valuepath),
                ));
            }
        }
    }
    Ok(())
}

/// Join name parts with `_` and check the result is a legal metric name.
pub fn fq_name(parts: &[&str]) -> Result<String> {
    let name = parts.join("_");
    if !is_valid_metric_name(&name) {
        return Err(ProbeError::Config(format!("invalid metric name '{name}'")));
    }
    Ok(name)
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, and not reserved (`__` prefix).
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
