//! End-to-end relay behaviour against mock upstream registries.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;

use registry_proxy::config::Mode;
use registry_proxy::http::response::MIRROR_LOGIN_DISABLED;
use registry_proxy::HttpServer;

mod common;

use common::{body_json, body_string, get, send, GOOD_TOKEN};

async fn setup() -> (common::MockRegistry, common::MockRegistry, HttpServer) {
    let primary = common::start_mock_registry().await;
    let mirror = common::start_mock_registry().await;
    let server = HttpServer::new(common::proxy_config(&primary, &mirror)).unwrap();
    (primary, mirror, server)
}

#[tokio::test]
async fn test_root_redirects_to_v2() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "https://docker.test/v2/");

    let mut request = get("docker.test:8443", "/");
    request
        .headers_mut()
        .insert("x-forwarded-proto", "http".parse().unwrap());
    let response = send(&server, request).await;
    assert_eq!(response.headers()[header::LOCATION], "http://docker.test:8443/v2/");

    assert!(primary.hits().is_empty());
}

#[tokio::test]
async fn test_root_redirect_ignores_malformed_forwarded_proto() {
    let (_primary, _mirror, server) = setup().await;

    let mut request = get("docker.test", "/");
    request
        .headers_mut()
        .insert("x-forwarded-proto", "https://evil.example/#".parse().unwrap());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "https://docker.test/v2/");
}

#[tokio::test]
async fn test_host_taken_from_absolute_uri_without_host_header() {
    let (primary, _mirror, server) = setup().await;

    let request = Request::builder()
        .uri("http://docker.test/v2/")
        .body(Body::empty())
        .unwrap();
    assert!(request.headers().get(header::HOST).is_none());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Bearer realm="https://docker.test/v2/auth",service="test-proxy""#
    );
    assert_eq!(primary.count("GET /v2/"), 1);

    let request = Request::builder()
        .uri("http://docker.test/")
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.headers()[header::LOCATION], "http://docker.test/v2/");
}

#[tokio::test]
async fn test_unknown_host_lists_routes() {
    let (primary, mirror, server) = setup().await;

    let response = send(&server, get("nowhere.test", "/v2/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({
            "routes": {
                "docker.test": primary.url(),
                "quay.mirrors.test": mirror.url(),
            }
        })
    );
}

#[tokio::test]
async fn test_mirror_rejects_credentials_without_calling_upstream() {
    let (_primary, mirror, server) = setup().await;

    let mut request = get("quay.mirrors.test", "/v2/");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, GOOD_TOKEN.parse().unwrap());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "message": MIRROR_LOGIN_DISABLED }));
    assert!(mirror.hits().is_empty());
}

#[tokio::test]
async fn test_mirror_marker_matches_regardless_of_case() {
    let primary = common::start_mock_registry().await;
    let mirror = common::start_mock_registry().await;
    let mut config = common::proxy_config(&primary, &mirror);
    config.registry.mirror_marker = "Mirrors.".into();
    let server = HttpServer::new(config).unwrap();

    let mut request = get("quay.mirrors.test", "/v2/");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, GOOD_TOKEN.parse().unwrap());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "message": MIRROR_LOGIN_DISABLED }));
    assert!(mirror.hits().is_empty());
}

#[tokio::test]
async fn test_version_check_replaces_upstream_challenge() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Bearer realm="https://docker.test/v2/auth",service="test-proxy""#
    );
    assert_eq!(body_json(response).await, json!({ "message": "UNAUTHORIZED" }));
    assert_eq!(primary.hits(), vec!["GET /v2/".to_string()]);
}

#[tokio::test]
async fn test_version_check_relays_success_with_credentials() {
    let (_primary, _mirror, server) = setup().await;

    let mut request = get("docker.test", "/v2/");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, GOOD_TOKEN.parse().unwrap());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({}));
}

#[tokio::test]
async fn test_debug_mode_challenge_uses_plain_http_and_port() {
    let primary = common::start_mock_registry().await;
    let mirror = common::start_mock_registry().await;
    let mut config = common::proxy_config(&primary, &mirror);
    config.registry.mode = Mode::Debug;
    config.registry.target_upstream = Some(mirror.url());
    let server = HttpServer::new(config).unwrap();

    let response = send(&server, get("localhost:5000", "/v2/")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Bearer realm="http://localhost:5000/v2/auth",service="test-proxy""#
    );
    // Unmapped host fell back to the target upstream.
    assert_eq!(mirror.count("GET /v2/"), 1);
}

#[tokio::test]
async fn test_token_exchange_completes_library_scope() {
    let (primary, _mirror, server) = setup().await;

    let mut request = get("docker.test", "/v2/auth?scope=repository:busybox:pull&service=x");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "token": "good",
            "service": "mock-registry",
            "scope": "repository:library/busybox:pull",
            "authorization": "Basic dXNlcjpwYXNz",
        })
    );
    assert_eq!(primary.count("GET /v2/"), 1);
    assert_eq!(primary.count("GET /token"), 1);
}

#[tokio::test]
async fn test_token_exchange_leaves_mirror_scope_alone() {
    let (_primary, _mirror, server) = setup().await;

    let response = send(
        &server,
        get("quay.mirrors.test", "/v2/auth?scope=repository:busybox:pull"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["scope"], "repository:busybox:pull");
    assert_eq!(body["authorization"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_token_exchange_without_scope() {
    let (_primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/auth")).await;
    let body = body_json(response).await;
    assert_eq!(body["scope"], serde_json::Value::Null);
    assert_eq!(body["service"], "mock-registry");
}

#[tokio::test]
async fn test_token_exchange_relays_challenge_without_header() {
    let primary = common::start_registry_with_challenge("").await;
    let mirror = common::start_mock_registry().await;
    let server = HttpServer::new(common::proxy_config(&primary, &mirror)).unwrap();

    let response = send(
        &server,
        get("docker.test", "/v2/auth?scope=repository:busybox:pull"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(primary.count("GET /token"), 0);
}

#[tokio::test]
async fn test_token_exchange_malformed_challenge_is_bad_gateway() {
    let primary = common::start_registry_with_challenge("Bearer foo").await;
    let mirror = common::start_mock_registry().await;
    let server = HttpServer::new(common::proxy_config(&primary, &mirror)).unwrap();

    let response = send(&server, get("docker.test", "/v2/auth")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("invalid WWW-Authenticate header"));
}

#[tokio::test]
async fn test_unqualified_image_redirects_to_library() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/busybox/manifests/latest")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://docker.test/v2/library/busybox/manifests/latest"
    );
    assert!(primary.hits().is_empty());
}

#[tokio::test]
async fn test_library_redirect_keeps_query() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/busybox/tags/list?n=5")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://docker.test/v2/library/busybox/tags/list?n=5"
    );
    assert!(primary.hits().is_empty());
}

#[tokio::test]
async fn test_forward_with_credentials_and_challenge_replacement() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/library/busybox/manifests/latest")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        r#"Bearer realm="https://docker.test/v2/auth",service="test-proxy""#
    );

    let mut request = get("docker.test", "/v2/library/busybox/manifests/latest");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, GOOD_TOKEN.parse().unwrap());
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.docker.distribution.manifest.v2+json"
    );
    assert_eq!(body_string(response).await, "manifest");
    assert_eq!(primary.count("GET /v2/library/busybox/manifests/latest"), 2);
}

#[tokio::test]
async fn test_primary_blob_redirect_is_replayed_once() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/library/busybox/blobs/sha256:abc")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "layer-bytes");
    assert_eq!(
        primary.hits(),
        vec![
            "GET /v2/library/busybox/blobs/sha256:abc".to_string(),
            "GET /cdn/layer".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_primary_blob_redirect_to_other_host() {
    let (primary, cdn, server) = setup().await;

    let uri = format!("/v2/library/busybox/blobs/sha256:abc?cdn={}", cdn.url());
    let response = send(&server, get("docker.test", &uri)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "layer-bytes");
    assert_eq!(cdn.hits(), vec!["GET /cdn/layer".to_string()]);
    assert_eq!(primary.count("GET /cdn/layer"), 0);
}

#[tokio::test]
async fn test_primary_blob_redirect_without_location_is_bad_gateway() {
    let (primary, _mirror, server) = setup().await;

    let response = send(
        &server,
        get("docker.test", "/v2/library/busybox/blobs/sha256:missing"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(body_json(response).await["message"].is_string());
    assert_eq!(
        primary.hits(),
        vec!["GET /v2/library/busybox/blobs/sha256:missing".to_string()]
    );
}

#[tokio::test]
async fn test_mirror_blob_redirect_followed_by_transport() {
    let (_primary, mirror, server) = setup().await;

    let response = send(
        &server,
        get("quay.mirrors.test", "/v2/coreos/etcd/blobs/sha256:abc"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "layer-bytes");
    assert_eq!(mirror.count("GET /cdn/layer"), 1);
}

#[tokio::test]
async fn test_forward_keeps_query_and_body() {
    let (primary, _mirror, server) = setup().await;

    let request = Request::builder()
        .method("PUT")
        .uri("/v2/library/busybox/blobs/uploads/abc?digest=sha256%3Adef")
        .header(header::HOST, "docker.test")
        .body(Body::from("0123456789"))
        .unwrap();
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_string(response).await, "received 10 bytes");
    assert_eq!(
        primary.hits(),
        vec!["PUT /v2/library/busybox/blobs/uploads/abc?digest=sha256%3Adef".to_string()]
    );
}

#[tokio::test]
async fn test_short_paths_forward_unchanged() {
    let (primary, _mirror, server) = setup().await;

    let response = send(&server, get("docker.test", "/v2/_catalog")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "repositories": ["library/busybox"] })
    );
    assert_eq!(primary.hits(), vec!["GET /v2/_catalog".to_string()]);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let primary = common::start_mock_registry().await;
    let mirror = common::start_mock_registry().await;
    let mut config = common::proxy_config(&primary, &mirror);
    // Port 9 (discard) on loopback is not listening in test environments.
    config.routes.insert("dead.test".into(), "http://127.0.0.1:9".into());
    let server = HttpServer::new(config).unwrap();

    let response = send(&server, get("dead.test", "/v2/")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
