//! `/probe` handler.
//!
//! `GET /probe?module=<name>&target=<url>&<extra>`: compile the module,
//! render and send the outbound request, extract samples from the JSON
//! answer, and expose them together with the request diagnostics. Every
//! probe builds its own descriptors and registry; nothing is shared with
//! concurrent probes except the read-only config.

use std::time::Instant;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use tracing::Instrument;

use jsonbox_core::compile::compile_module;
use jsonbox_core::error::{ErrorKind, ProbeError, Result};
use jsonbox_core::extract::extract;

use crate::app_state::AppState;
use crate::config::ModuleConfig;
use crate::obs::collector::{RequestCollector, SampleCollector};
use crate::obs::metrics::ExporterMetrics;
use crate::obs::registry::{encode_text, Registry};
use crate::ops::EXPOSITION_CONTENT_TYPE;
use crate::probe::{fetch, render};

pub async fn probe(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    let params: Vec<(String, String)> = raw
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let Some(module_name) = first_param(&params, "module") else {
        return (StatusCode::BAD_REQUEST, "Module parameter is missing").into_response();
    };
    let Some(target) = first_param(&params, "target") else {
        return (StatusCode::BAD_REQUEST, "Target parameter is missing").into_response();
    };
    let Some(module) = state.module(module_name) else {
        return (StatusCode::BAD_REQUEST, format!("Unknown module: {module_name}")).into_response();
    };

    let metrics = state.metrics();
    let _in_flight = InFlight::enter(metrics, module_name);
    let started = Instant::now();

    let span = tracing::info_span!("probe", module = %module_name, target = %target);
    let result = run_probe(metrics, module_name, module, target, &params)
        .instrument(span.clone())
        .await;

    metrics.probe_duration.observe(&[("module", module_name)], started.elapsed());
    match result {
        Ok(body) => {
            metrics.probes.inc(&[("module", module_name), ("outcome", "success")]);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            metrics.probes.inc(&[("module", module_name), ("outcome", e.kind().as_str())]);
            span.in_scope(|| tracing::warn!(err = %e, kind = e.kind().as_str(), "probe failed"));
            error_response(target, &e)
        }
    }
}

/// Run one probe and return the exposition text.
pub async fn run_probe(
    metrics: &ExporterMetrics,
    module_name: &str,
    module: &ModuleConfig,
    target: &str,
    params: &[(String, String)],
) -> Result<String> {
    let descriptors = compile_module(module_name, &module.metrics)?;

    let rendered = render::render_request(&module.request, target, params)?;
    if rendered.template_failed {
        metrics.template_errors.inc(&[("module", module_name)]);
    }

    let fetched = fetch::fetch(&module.request.client_config, rendered).await?;
    tracing::debug!(
        duration_ms = fetched.duration_ms,
        bytes = fetched.body.len(),
        data = %String::from_utf8_lossy(&fetched.body),
        "target responded"
    );

    let extraction = extract(&fetched.body, &descriptors)?;
    for f in &extraction.failures {
        tracing::warn!(metric = %f.metric, err = %f.error, "failed to coerce extracted value");
        metrics.coercion_errors.inc(&[("module", module_name), ("metric", &f.metric)]);
    }

    let mut registry = Registry::new();
    registry.register(Box::new(RequestCollector::new(
        module_name,
        fetched.status.as_u16(),
        fetched.duration_ms,
    )))?;
    registry.register(Box::new(SampleCollector::new(&descriptors, &extraction.samples)))?;

    let families = registry.gather()?;
    Ok(encode_text(&families))
}

fn error_response(target: &str, e: &ProbeError) -> Response {
    let (status, body) = match e.kind() {
        ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, e.to_string()),
        ErrorKind::RequestBuild | ErrorKind::Fetch => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Failed to fetch JSON response. TARGET: {target}, ERROR: {e}"),
        ),
        ErrorKind::Parse => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Failed to parse JSON response. TARGET: {target}, ERROR: {e}"),
        ),
        ErrorKind::Config => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to create metrics list from config: {e}"),
        ),
        ErrorKind::Exposition => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("An error has occurred while serving metrics: {e}"),
        ),
    };
    (status, body).into_response()
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Keeps the in-flight gauge honest even when the probe future is dropped
/// mid-fetch (caller disconnected).
struct InFlight<'a> {
    metrics: &'a ExporterMetrics,
    module: &'a str,
}

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a ExporterMetrics, module: &'a str) -> Self {
        metrics.probes_in_flight.inc(&[("module", module)]);
        Self { metrics, module }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.probes_in_flight.dec(&[("module", self.module)]);
    }
}
