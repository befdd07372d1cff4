//! One HTTP round trip against the probe target.
//!
//! Outcomes:
//! - transport error       -> `ProbeError::Fetch`
//! - non-2xx               -> body drained, `ProbeError::Fetch` with the status line
//! - 2xx                   -> body drained into memory
//!
//! The elapsed time covers the send only (until response headers), never the
//! body read. The response is consumed exactly once on every path.
//!
//! Cancellation is drop-based: if the inbound request goes away, the handler
//! future is dropped together with the in-flight request.

use std::error::Error as _;
use std::time::Instant;

use bytes::Bytes;
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity, Proxy, RequestBuilder, StatusCode};

use jsonbox_core::error::{ProbeError, Result};

use crate::config::ClientConfig;
use crate::probe::render::RenderedRequest;

/// A successful (2xx) fetch.
#[derive(Debug)]
pub struct Fetched {
    pub body: Bytes,
    pub status: StatusCode,
    /// Whole milliseconds spent in the send.
    pub duration_ms: u64,
}

/// Credentials resolved from config (files read at probe time).
#[derive(Debug)]
enum Auth {
    Basic { username: String, password: Option<String> },
    Bearer(String),
}

pub async fn fetch(cfg: &ClientConfig, req: RenderedRequest) -> Result<Fetched> {
    let client = build_client(cfg).await?;
    let auth = resolve_auth(cfg).await?;

    let mut rb = client.request(req.method, req.url).headers(req.headers);
    if let Some(body) = req.body {
        rb = rb.body(body);
    }
    rb = apply_auth(rb, auth);

    let start = Instant::now();
    let resp = rb.send().await.map_err(|e| ProbeError::Fetch(error_chain(&e)))?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let status = resp.status();
    let body = resp.bytes().await;

    if !status.is_success() {
        if let Err(e) = body {
            tracing::debug!(err = %e, "failed to drain error response body");
        }
        return Err(ProbeError::Fetch(status_line(status)));
    }

    let body = body.map_err(|e| ProbeError::Fetch(format!("read body: {}", error_chain(&e))))?;
    Ok(Fetched { body, status, duration_ms })
}

/// Build a client bound to the module's client config.
pub async fn build_client(cfg: &ClientConfig) -> Result<Client> {
    let mut b = Client::builder().user_agent(concat!("jsonbox-exporter/", env!("CARGO_PKG_VERSION")));

    if !cfg.follow_redirects {
        b = b.redirect(Policy::none());
    }
    if let Some(proxy) = &cfg.proxy_url {
        let p = Proxy::all(proxy)
            .map_err(|e| ProbeError::RequestBuild(format!("invalid proxy_url {proxy:?}: {e}")))?;
        b = b.proxy(p);
    }

    let tls = &cfg.tls_config;
    if tls.insecure_skip_verify {
        b = b.danger_accept_invalid_certs(true);
    }
    if let Some(ca) = &tls.ca_file {
        let pem = read_file(ca).await?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| ProbeError::RequestBuild(format!("invalid ca_file {ca}: {e}")))?;
        b = b.add_root_certificate(cert);
    }
    if let (Some(cert), Some(key)) = (&tls.cert_file, &tls.key_file) {
        let mut pem = read_file(cert).await?;
        pem.push(b'\n');
        pem.extend(read_file(key).await?);
        let identity = Identity::from_pem(&pem)
            .map_err(|e| ProbeError::RequestBuild(format!("invalid client certificate {cert}: {e}")))?;
        b = b.identity(identity);
    }

    b.build()
        .map_err(|e| ProbeError::RequestBuild(format!("error generating http client: {e}")))
}

async fn resolve_auth(cfg: &ClientConfig) -> Result<Option<Auth>> {
    if let Some(basic) = &cfg.basic_auth {
        let password = match (&basic.password, &basic.password_file) {
            (Some(p), _) => Some(p.clone()),
            (None, Some(f)) => Some(read_secret(f).await?),
            (None, None) => None,
        };
        return Ok(Some(Auth::Basic { username: basic.username.clone(), password }));
    }
    if let Some(token) = &cfg.bearer_token {
        return Ok(Some(Auth::Bearer(token.clone())));
    }
    if let Some(f) = &cfg.bearer_token_file {
        return Ok(Some(Auth::Bearer(read_secret(f).await?)));
    }
    Ok(None)
}

fn apply_auth(rb: RequestBuilder, auth: Option<Auth>) -> RequestBuilder {
    match auth {
        Some(Auth::Basic { username, password }) => rb.basic_auth(username, password),
        Some(Auth::Bearer(token)) => rb.bearer_auth(token),
        None => rb,
    }
}

async fn read_file(path: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ProbeError::RequestBuild(format!("read {path} failed: {e}")))
}

async fn read_secret(path: &str) -> Result<String> {
    let raw = read_file(path).await?;
    let s = String::from_utf8(raw)
        .map_err(|e| ProbeError::RequestBuild(format!("secret file {path} is not utf-8: {e}")))?;
    Ok(s.trim().to_string())
}

/// `500 Internal Server Error`
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

// reqwest's top-level message hides the interesting part (refused, dns, tls).
fn error_chain(e: &reqwest::Error) -> String {
    let mut out = e.to_string();
    let mut src = e.source();
    while let Some(s) = src {
        out.push_str(": ");
        out.push_str(&s.to_string());
        src = s.source();
    }
    out
}
