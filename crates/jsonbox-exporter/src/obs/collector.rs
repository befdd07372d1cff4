//! Collectors exposed by a single probe.
//!
//! `RequestCollector` carries the two label-less diagnostics every probe
//! reports; `SampleCollector` adapts compiled descriptors and the samples
//! extracted with them.

use jsonbox_core::model::{ExtractedSample, MetricDescriptor};

use crate::obs::registry::{Collector, ConstMetric, Desc};

/// `<module>_request_status` and `<module>_request_duration`.
pub struct RequestCollector {
    status_name: String,
    duration_name: String,
    status: f64,
    duration_ms: f64,
}

impl RequestCollector {
    pub fn new(module: &str, status: u16, duration_ms: u64) -> Self {
        Self {
            status_name: format!("{module}_request_status"),
            duration_name: format!("{module}_request_duration"),
            status: f64::from(status),
            duration_ms: duration_ms as f64,
        }
    }
}

impl Collector for RequestCollector {
    fn describe(&self) -> Vec<Desc> {
        vec![
            Desc {
                fq_name: self.status_name.clone(),
                help: "Request target status".into(),
                label_names: Vec::new(),
            },
            Desc {
                fq_name: self.duration_name.clone(),
                help: "Request target duration by Millisecond".into(),
                label_names: Vec::new(),
            },
        ]
    }

    fn collect(&self) -> Vec<ConstMetric> {
        vec![
            ConstMetric { fq_name: self.status_name.clone(), label_values: Vec::new(), value: self.status },
            ConstMetric {
                fq_name: self.duration_name.clone(),
                label_values: Vec::new(),
                value: self.duration_ms,
            },
        ]
    }
}

/// Every compiled descriptor is described, even those that matched nothing.
pub struct SampleCollector<'a> {
    descriptors: &'a [MetricDescriptor],
    samples: &'a [ExtractedSample],
}

impl<'a> SampleCollector<'a> {
    pub fn new(descriptors: &'a [MetricDescriptor], samples: &'a [ExtractedSample]) -> Self {
        Self { descriptors, samples }
    }
}

impl Collector for SampleCollector<'_> {
    fn describe(&self) -> Vec<Desc> {
        self.descriptors
            .iter()
            .map(|d| Desc {
                fq_name: d.fq_name().to_string(),
                help: d.help().to_string(),
                label_names: d.label_names().to_vec(),
            })
            .collect()
    }

    fn collect(&self) -> Vec<ConstMetric> {
        self.samples
            .iter()
            .filter_map(|s| {
                let d = self.descriptors.get(s.descriptor)?;
                Some(ConstMetric {
                    fq_name: d.fq_name().to_string(),
                    label_values: s.label_values.clone(),
                    value: s.value,
                })
            })
            .collect()
    }
}
