//! Outbound request rendering.
//!
//! - empty body content: GET, no body
//! - literal body: POST with the configured content
//! - templatized body: POST with the rendered template; a template failure
//!   is logged and degrades to an empty body
//!
//! Inbound query parameters only feed the template context; they are never
//! forwarded to the target.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Method;
use url::Url;

use jsonbox_core::error::{ProbeError, Result};

use crate::config::RequestConfig;
use crate::probe::template;

/// Fully resolved outbound request, ready for the fetcher.
#[derive(Debug)]
pub struct RenderedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
    /// Set when the body template failed and an empty body was substituted.
    pub template_failed: bool,
}

pub fn render_request(
    req: &RequestConfig,
    target: &str,
    inbound: &[(String, String)],
) -> Result<RenderedRequest> {
    let url = target_url(target, req)?;
    let headers = headers(req)?;

    let mut template_failed = false;
    let (method, body) = if req.body.content.is_empty() {
        (Method::GET, None)
    } else if !req.body.templatize {
        (Method::POST, Some(req.body.content.clone()))
    } else {
        let body = match template::render_body(&req.body.content, inbound) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(err = %e, template = %req.body.content, "failed to render request body template");
                template_failed = true;
                String::new()
            }
        };
        (Method::POST, Some(body))
    };

    Ok(RenderedRequest { method, url, headers, body, template_failed })
}

/// Parse the target and merge module params into its query string.
///
/// Module params replace same-named target params; pairs end up sorted by key.
fn target_url(target: &str, req: &RequestConfig) -> Result<Url> {
    let mut url = Url::parse(target)
        .map_err(|e| ProbeError::RequestBuild(format!("invalid target url {target:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProbeError::RequestBuild(format!(
            "unsupported target scheme: {}",
            url.scheme()
        )));
    }

    if !req.params.is_empty() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .into_owned()
            .filter(|(k, _)| !req.params.contains_key(k))
            .collect();
        pairs.extend(req.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    Ok(url)
}

fn headers(req: &RequestConfig) -> Result<HeaderMap> {
    let mut out = HeaderMap::with_capacity(req.headers.len() + 1);
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|e| ProbeError::RequestBuild(format!("invalid header name {k:?}: {e}")))?;
        let value = HeaderValue::from_str(v)
            .map_err(|e| ProbeError::RequestBuild(format!("invalid value for header {k}: {e}")))?;
        out.append(name, value);
    }
    if !out.contains_key(ACCEPT) {
        out.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }
    Ok(out)
}
