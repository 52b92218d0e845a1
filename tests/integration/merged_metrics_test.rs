// Merged scrape endpoint tests against wiremock backends

use super::test_utils::{admin_target, app_target, dead_target, TestServer};
use axum::body::to_bytes;
use axum::http::StatusCode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_BODY_LIMIT: usize = 1024 * 1024;

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const OPENMETRICS_1_0_0: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

const RANKED_ACCEPT: &str = "application/openmetrics-text;version=1.0.0,\
    application/openmetrics-text;version=0.0.1;q=0.75,\
    text/plain;version=0.0.4;q=0.5,*/*;q=0.1";

fn metrics_response(content_type: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", content_type)
        .set_body_string(body)
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), TEST_BODY_LIMIT)
        .await
        .expect("Failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("Response body must be UTF-8")
}

fn content_type(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .expect("Response must carry a Content-Type")
        .to_string()
}

#[tokio::test]
async fn admin_scrape_is_rewritten_to_prometheus_format() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .and(query_param("format", "prometheus"))
        .and(query_param("text_readouts", ""))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "envoy_stat 1\n"))
        .expect(1)
        .mount(&backend)
        .await;

    let server = TestServer::with_targets(vec![admin_target(&backend)]);
    let response = server
        .call(server.make_request("/metrics", Some("*/*")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), TEXT_CONTENT_TYPE);
    assert_eq!(body_string(response).await, "envoy_stat 1\n");
}

#[tokio::test]
async fn inbound_query_parameters_reach_the_admin_backend() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .and(query_param("format", "prometheus"))
        .and(query_param("filter", "test_.*"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "filtered 1\n"))
        .expect(1)
        .mount(&backend)
        .await;

    let server = TestServer::with_targets(vec![admin_target(&backend)]);
    let response = server
        .call(server.make_request("/metrics?filter=test_.%2A", None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "filtered 1\n");
}

#[tokio::test]
async fn application_scrape_drops_the_inbound_query() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "app_metric 2\n"))
        .expect(1)
        .mount(&backend)
        .await;

    let server = TestServer::with_targets(vec![app_target("app", &backend)]);
    let response = server
        .call(server.make_request("/metrics?one=two&three=four", None))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let requests = backend
        .received_requests()
        .await
        .expect("request recording enabled");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.query().is_none());
    assert_eq!(body_string(response).await, "app_metric 2\n");
}

#[tokio::test]
async fn merges_backends_that_agree_on_the_negotiated_format() {
    let admin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "envoy_stat 1\n"))
        .mount(&admin)
        .await;

    let app = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "app_metric 2\n"))
        .mount(&app)
        .await;

    let server =
        TestServer::with_targets(vec![admin_target(&admin), app_target("app", &app)]);
    let response = server
        .call(server.make_request("/metrics", Some("text/plain;version=0.0.4")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), TEXT_CONTENT_TYPE);
    let body = body_string(response).await;
    assert!(body.contains("envoy_stat 1"));
    assert!(body.contains("app_metric 2"));
}

#[tokio::test]
async fn collector_preference_picks_among_mixed_backend_formats() {
    let admin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "envoy_stat 1\n"))
        .mount(&admin)
        .await;

    let app = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(metrics_response(OPENMETRICS_1_0_0, "app_metric 2\n# EOF\n"))
        .mount(&app)
        .await;

    let server =
        TestServer::with_targets(vec![admin_target(&admin), app_target("app", &app)]);
    let response = server
        .call(server.make_request("/metrics", Some(RANKED_ACCEPT)))
        .await;

    // OpenMetrics 1.0.0 is the collector's top preference and one backend
    // produced it; the text-format body is dropped from the merge.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), OPENMETRICS_1_0_0);
    let body = body_string(response).await;
    assert!(body.contains("app_metric 2"));
    assert!(!body.contains("envoy_stat 1"));
}

#[tokio::test]
async fn dead_backend_does_not_fail_the_scrape() {
    let admin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "envoy_stat 1\n"))
        .mount(&admin)
        .await;

    let server =
        TestServer::with_targets(vec![admin_target(&admin), dead_target("down")]);
    let response = server
        .call(server.make_request("/metrics", Some("*/*")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), TEXT_CONTENT_TYPE);
    assert_eq!(body_string(response).await, "envoy_stat 1\n");
}

#[tokio::test]
async fn all_backends_dead_still_yields_a_negotiated_response() {
    let server = TestServer::with_targets(vec![dead_target("a"), dead_target("b")]);
    let response = server
        .call(server.make_request("/metrics", Some(RANKED_ACCEPT)))
        .await;

    // No backend produced anything; the collector's richest named preference
    // still decides the advertised content type.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), OPENMETRICS_1_0_0);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn wildcard_collector_with_dead_backends_gets_plain_text() {
    let server = TestServer::with_targets(vec![dead_target("a")]);
    let response = server.call(server.make_request("/metrics", Some("*/*"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), TEXT_CONTENT_TYPE);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn backend_with_unrecognized_content_type_is_excluded() {
    let admin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(metrics_response(TEXT_CONTENT_TYPE, "envoy_stat 1\n"))
        .mount(&admin)
        .await;

    let app = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(metrics_response("application/json", "{\"not\":\"metrics\"}"))
        .mount(&app)
        .await;

    let server =
        TestServer::with_targets(vec![admin_target(&admin), app_target("app", &app)]);
    let response = server
        .call(server.make_request("/metrics", Some("*/*")))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), TEXT_CONTENT_TYPE);
    assert_eq!(body_string(response).await, "envoy_stat 1\n");
}

#[tokio::test]
async fn collector_accept_header_is_forwarded_to_backends() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .and(wiremock::matchers::header("Accept", RANKED_ACCEPT))
        .respond_with(metrics_response(OPENMETRICS_1_0_0, "m 1\n# EOF\n"))
        .expect(1)
        .mount(&backend)
        .await;

    let server = TestServer::with_targets(vec![app_target("app", &backend)]);
    let response = server
        .call(server.make_request("/metrics", Some(RANKED_ACCEPT)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), OPENMETRICS_1_0_0);
}
