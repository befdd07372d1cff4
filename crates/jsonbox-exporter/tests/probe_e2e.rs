//! End-to-end probe tests: axum router driven with `oneshot`, target served by wiremock.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::Write;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use wiremock::matchers::{body_string, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jsonbox_exporter::app_state::AppState;
use jsonbox_exporter::{config, router};

const CONFIG: &str = r#"
modules:
  api:
    metrics:
      - name: count
        path: "{.count}"
        help: "Number of things"
  pools:
    metrics:
      - name: pool
        path: "{.pools[*]}"
        type: object
        labels:
          pool: "{.name}"
        values:
          active: "{.active}"
          idle: "{.idle}"
  search:
    request:
      params:
        format: json
      headers:
        X-Api-Key: secret
      body:
        content: '{"q":"{{ q }}","limit":{{ limit | add(5) }}}'
        templatize: true
    metrics:
      - name: hits
        path: hits
  literal:
    request:
      body:
        content: '{"q":"{{ not rendered }}"}'
    metrics:
      - name: ok
        path: ok
  authed:
    request:
      client_config:
        basic_auth:
          username: user
          password: pass
    metrics:
      - name: ok
        path: ok
  dup:
    metrics:
      - name: v
        path: "{.rows[*]}"
        type: object
        labels:
          k: "{.k}"
        values:
          n: "{.n}"
"#;

fn app() -> Router {
    app_from(CONFIG)
}

fn app_from(yaml: &str) -> Router {
    let cfg = config::load_from_str(yaml).expect("config must parse");
    router::build_router(AppState::new(cfg).expect("config must compile"))
}

/// Single `m` module with the given `client_config` body (already indented).
fn client_module(client_config: &str) -> String {
    format!(
        "modules:\n  m:\n    request:\n      client_config:\n{client_config}    metrics:\n      - {{ name: ok, path: ok }}\n"
    )
}

fn secret_file(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f
}

fn probe_uri(module: &str, target: &str, extra: &str) -> String {
    let target: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("/probe?module={module}&target={target}{extra}")
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn value_metric_from_numeric_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"count":"42"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let uri = probe_uri("api", &format!("{}/stats", server.uri()), "");
    let (status, body) = get(app(), &uri).await;

    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("# HELP api_count Number of things"), "body={body}");
    assert!(body.contains("# TYPE api_count untyped"), "body={body}");
    assert!(body.contains("\napi_count 42.0\n"), "body={body}");
    assert!(body.contains("api_request_status 200.0"), "body={body}");
    assert!(body.contains("api_request_duration "), "body={body}");
}

#[tokio::test]
async fn target_error_status_is_503_without_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"count":1}"#))
        .mount(&server)
        .await;

    let target = format!("{}/stats", server.uri());
    let (status, body) = get(app(), &probe_uri("api", &target, "")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains(&format!("TARGET: {target}")), "body={body}");
    assert!(body.contains("500 Internal Server Error"), "body={body}");
    assert!(!body.contains("api_count"), "body={body}");
    assert!(!body.contains("# TYPE"), "body={body}");
}

#[tokio::test]
async fn unreachable_target_is_503() {
    // Nothing listens on port 1.
    let (status, body) = get(app(), &probe_uri("api", "http://127.0.0.1:1/", "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.starts_with("Failed to fetch JSON response."), "body={body}");
}

#[tokio::test]
async fn invalid_json_is_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("api", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.starts_with("Failed to parse JSON response."), "body={body}");
}

#[tokio::test]
async fn missing_parameters_are_400() {
    let (status, body) = get(app(), "/probe?module=api").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Target"), "body={body}");

    let (status, body) = get(app(), "/probe?target=http://example.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Module"), "body={body}");

    let (status, body) = get(app(), "/probe?module=nope&target=http://example.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Unknown module: nope"), "body={body}");
}

#[tokio::test]
async fn invalid_target_url_is_503() {
    let (status, body) = get(app(), &probe_uri("api", "not a url", "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("invalid target url"), "body={body}");
}

#[tokio::test]
async fn object_metric_emits_labeled_series_per_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"pools":[{"name":"a","active":1,"idle":"2"},{"name":"b","active":3,"idle":null}]}"#,
        ))
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("pools", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");

    let lines: Vec<&str> = body.lines().filter(|l| l.starts_with("pools_pool_")).collect();
    assert_eq!(
        lines,
        [
            r#"pools_pool_active{pool="a"} 1.0"#,
            r#"pools_pool_active{pool="b"} 3.0"#,
            r#"pools_pool_idle{pool="a"} 2.0"#,
            r#"pools_pool_idle{pool="b"} NaN"#,
        ]
    );
}

#[tokio::test]
async fn zero_matches_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"other":1}"#))
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("pools", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("pools_request_status 200.0"), "body={body}");
    assert!(!body.contains("pools_pool_"), "body={body}");
}

#[tokio::test]
async fn templated_body_uses_inbound_params_without_forwarding_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(query_param("format", "json"))
        .and(query_param("page", "2"))
        .and(query_param_is_missing("q"))
        .and(query_param_is_missing("limit"))
        .and(header("x-api-key", "secret"))
        .and(header("accept", "application/json"))
        .and(body_string(r#"{"q":"rust","limit":15}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hits":3}"#))
        .expect(1)
        .mount(&server)
        .await;

    let target = format!("{}/search?page=2&format=xml", server.uri());
    let (status, body) = get(app(), &probe_uri("search", &target, "&q=rust&limit=10")).await;

    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("search_hits 3.0"), "body={body}");
}

#[tokio::test]
async fn broken_template_degrades_to_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hits":0}"#))
        .expect(1)
        .mount(&server)
        .await;

    // `limit` is not numeric, so `add` fails at render time.
    let (status, body) = get(app(), &probe_uri("search", &server.uri(), "&limit=many")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("search_hits 0.0"), "body={body}");
}

#[tokio::test]
async fn literal_body_is_posted_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string(r#"{"q":"{{ not rendered }}"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("literal", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("literal_ok 1.0"), "body={body}");
}

#[tokio::test]
async fn basic_auth_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":"1"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("authed", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("authed_ok 1.0"), "body={body}");
}

#[tokio::test]
async fn duplicate_series_surface_as_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"rows":[{"k":"x","n":1},{"k":"x","n":2}]}"#),
        )
        .mount(&server)
        .await;

    let (status, body) = get(app(), &probe_uri("dup", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("same name and label values"), "body={body}");
}

#[tokio::test]
async fn self_metrics_count_probe_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"count":"nope"}"#))
        .mount(&server)
        .await;

    let app = app();
    let (status, body) = get(app.clone(), &probe_uri("api", &server.uri(), "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(!body.contains("\napi_count "), "body={body}");

    let (status, metrics) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        metrics.contains(r#"jsonbox_probes_total{module="api",outcome="success"} 1"#),
        "metrics={metrics}"
    );
    assert!(
        metrics.contains(r#"jsonbox_coercion_errors_total{metric="api_count",module="api"} 1"#),
        "metrics={metrics}"
    );
    assert!(
        metrics.contains(r#"jsonbox_probes_in_flight{module="api"} 0"#),
        "metrics={metrics}"
    );
}

#[tokio::test]
async fn healthz_is_ok() {
    let (status, body) = get(app(), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn bearer_token_is_read_from_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":1}"#))
        .expect(1)
        .mount(&server)
        .await;

    let token = secret_file("s3cr3t\n");
    let yaml = client_module(&format!("        bearer_token_file: '{}'\n", token.path().display()));
    let (status, body) = get(app_from(&yaml), &probe_uri("m", &server.uri(), "")).await;

    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("m_ok 1.0"), "body={body}");
}

#[tokio::test]
async fn basic_auth_password_is_read_from_file_and_trimmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":1}"#))
        .expect(1)
        .mount(&server)
        .await;

    let password = secret_file("  pass\n");
    let yaml = client_module(&format!(
        "        basic_auth:\n          username: user\n          password_file: '{}'\n",
        password.path().display()
    ));
    let (status, body) = get(app_from(&yaml), &probe_uri("m", &server.uri(), "")).await;

    assert_eq!(status, StatusCode::OK, "body={body}");
}

#[tokio::test]
async fn redirects_are_followed_unless_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":1}"#))
        .mount(&server)
        .await;
    let target = format!("{}/old", server.uri());

    let yaml = client_module("        follow_redirects: true\n");
    let (status, body) = get(app_from(&yaml), &probe_uri("m", &target, "")).await;
    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("m_ok 1.0"), "body={body}");

    let yaml = client_module("        follow_redirects: false\n");
    let (status, body) = get(app_from(&yaml), &probe_uri("m", &target, "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("302 Found"), "body={body}");
}

#[tokio::test]
async fn unreadable_ca_file_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":1}"#))
        .expect(0)
        .mount(&server)
        .await;

    let yaml = client_module("        tls_config:\n          ca_file: /nonexistent/jsonbox/ca.pem\n");
    let (status, body) = get(app_from(&yaml), &probe_uri("m", &server.uri(), "")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.starts_with("Failed to fetch JSON response."), "body={body}");
    assert!(body.contains("/nonexistent/jsonbox/ca.pem"), "body={body}");
}

#[tokio::test]
async fn proxy_url_routes_the_request_through_the_proxy() {
    // Plain-http proxying sends the absolute target URL to the proxy.
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/via-proxy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":1}"#))
        .expect(1)
        .mount(&proxy)
        .await;

    let yaml = client_module(&format!("        proxy_url: '{}'\n", proxy.uri()));
    let target = "http://upstream.invalid/via-proxy";
    let (status, body) = get(app_from(&yaml), &probe_uri("m", target, "")).await;

    assert_eq!(status, StatusCode::OK, "body={body}");
    assert!(body.contains("m_ok 1.0"), "body={body}");
}
