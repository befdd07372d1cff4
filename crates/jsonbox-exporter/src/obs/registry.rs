//! Per-probe metrics registry and text exposition.
//!
//! A `Registry` is built on the stack for a single probe and dropped with it.
//! Registration runs the describe pass; `gather` runs the collect pass and
//! checks every collected series against what was described:
//! - fully-qualified names are unique across described metrics
//! - every collected series belongs to a described metric
//! - label values align with the described label names
//! - no two series of one metric share the same label values

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use jsonbox_core::error::{ProbeError, Result};

/// Description of one metric family (independent of any sample).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desc {
    pub fq_name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

/// One collected series.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstMetric {
    pub fq_name: String,
    pub label_values: Vec<String>,
    pub value: f64,
}

/// Something that can describe and then collect metrics.
pub trait Collector {
    fn describe(&self) -> Vec<Desc>;
    fn collect(&self) -> Vec<ConstMetric>;
}

/// A described family with its collected series, in collection order.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    pub desc: Desc,
    pub series: Vec<(Vec<String>, f64)>,
}

#[derive(Default)]
pub struct Registry<'a> {
    collectors: Vec<Box<dyn Collector + 'a>>,
    descs: Vec<Desc>,
    by_name: HashMap<String, usize>,
}

impl<'a> Registry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe `collector` and keep it for the collect pass.
    pub fn register(&mut self, collector: Box<dyn Collector + 'a>) -> Result<()> {
        let descs = collector.describe();

        let mut fresh = HashSet::new();
        for d in &descs {
            if self.by_name.contains_key(&d.fq_name) || !fresh.insert(d.fq_name.as_str()) {
                return Err(ProbeError::Exposition(format!(
                    "descriptor {} already exists with the same fully-qualified name",
                    d.fq_name
                )));
            }
            let mut labels = HashSet::new();
            if let Some(dup) = d.label_names.iter().find(|l| !labels.insert(l.as_str())) {
                return Err(ProbeError::Exposition(format!(
                    "duplicate label name {dup} in descriptor {}",
                    d.fq_name
                )));
            }
        }

        for d in descs {
            self.by_name.insert(d.fq_name.clone(), self.descs.len());
            self.descs.push(d);
        }
        self.collectors.push(collector);
        Ok(())
    }

    /// Collect every registered collector into families (description order).
    pub fn gather(&self) -> Result<Vec<MetricFamily>> {
        let mut families: Vec<MetricFamily> = self
            .descs
            .iter()
            .map(|d| MetricFamily { desc: d.clone(), series: Vec::new() })
            .collect();
        let mut seen: HashSet<(usize, Vec<String>)> = HashSet::new();

        for c in &self.collectors {
            for m in c.collect() {
                let idx = *self.by_name.get(&m.fq_name).ok_or_else(|| {
                    ProbeError::Exposition(format!("collected metric {} was not described", m.fq_name))
                })?;
                let fam = &mut families[idx];

                if m.label_values.len() != fam.desc.label_names.len() {
                    return Err(ProbeError::Exposition(format!(
                        "collected metric {} has {} label values, described {} label names",
                        m.fq_name,
                        m.label_values.len(),
                        fam.desc.label_names.len()
                    )));
                }
                if !seen.insert((idx, m.label_values.clone())) {
                    return Err(ProbeError::Exposition(format!(
                        "collected metric {} {} was collected before with the same name and label values",
                        m.fq_name,
                        label_set(&fam.desc.label_names, &m.label_values)
                    )));
                }
                fam.series.push((m.label_values, m.value));
            }
        }

        Ok(families)
    }
}

/// Render families in Prometheus text exposition format.
///
/// Families without series are omitted. Every family is typed `untyped`.
pub fn encode_text(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for fam in families.iter().filter(|f| !f.series.is_empty()) {
        let name = &fam.desc.fq_name;
        let _ = writeln!(out, "# HELP {} {}", name, escape_help(&fam.desc.help));
        let _ = writeln!(out, "# TYPE {} untyped", name);
        for (values, v) in &fam.series {
            if values.is_empty() {
                let _ = writeln!(out, "{} {}", name, format_value(*v));
            } else {
                let _ = writeln!(
                    out,
                    "{}{} {}",
                    name,
                    label_set(&fam.desc.label_names, values),
                    format_value(*v)
                );
            }
        }
    }
    out
}

/// Sample values always print as floats: `42.0`, `NaN`, `+Inf`.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf".into() } else { "-Inf".into() }
    } else {
        format!("{v:?}")
    }
}

fn label_set(names: &[String], values: &[String]) -> String {
    let pairs = names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{pairs}}}")
}

/// Helper to escape label values.
pub(crate) fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
