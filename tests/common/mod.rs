//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceExt;

use registry_proxy::config::ProxyConfig;
use registry_proxy::HttpServer;

pub const GOOD_TOKEN: &str = "Bearer good";

/// A scripted upstream registry.
#[derive(Clone)]
pub struct MockRegistry {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockRegistry {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request seen so far, as `METHOD /path?query`.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.hits().iter().filter(|h| h.starts_with(prefix)).count()
    }
}

#[derive(Clone)]
struct MockState {
    realm: String,
    hits: Arc<Mutex<Vec<String>>>,
    challenge: Option<&'static str>,
}

/// Start a mock registry that issues Docker Hub style challenges.
pub async fn start_mock_registry() -> MockRegistry {
    start_registry(None).await
}

/// Start a mock registry whose `/v2/` 401 carries a fixed `WWW-Authenticate`
/// value (or none at all when `challenge` is empty).
pub async fn start_registry_with_challenge(challenge: &'static str) -> MockRegistry {
    start_registry(Some(challenge)).await
}

async fn start_registry(challenge: Option<&'static str>) -> MockRegistry {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(Mutex::new(Vec::new()));

    let state = MockState {
        realm: format!("http://{}/token", addr),
        hits: hits.clone(),
        challenge,
    };
    let app = Router::new().fallback(registry).with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockRegistry { addr, hits }
}

async fn registry(State(state): State<MockState>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    state.hits.lock().unwrap().push(match query.as_str() {
        "" => format!("{} {}", method, path),
        q => format!("{} {}?{}", method, path, q),
    });

    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let authorized = authorization.as_deref() == Some(GOOD_TOKEN);

    let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let param = |key: &str| {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let challenge = || -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "errors": [{ "code": "UNAUTHORIZED" }] })),
        )
            .into_response();
        let value = match state.challenge {
            Some("") => return response,
            Some(fixed) => fixed.to_string(),
            None => format!("Bearer realm=\"{}\",service=\"mock-registry\"", state.realm),
        };
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value.parse().unwrap());
        response
    };

    match path.as_str() {
        "/v2/" if authorized => Json(json!({})).into_response(),
        "/v2/" => challenge(),
        "/token" => Json(json!({
            "token": "good",
            "service": param("service"),
            "scope": param("scope"),
            "authorization": authorization,
        }))
        .into_response(),
        "/v2/library/busybox/manifests/latest" if authorized => {
            let content_type = "application/vnd.docker.distribution.manifest.v2+json";
            ([(header::CONTENT_TYPE, content_type)], "manifest").into_response()
        }
        "/v2/library/busybox/manifests/latest" => challenge(),
        // Storage redirect with its Location header lost.
        p if p.ends_with("/blobs/sha256:missing") => {
            StatusCode::TEMPORARY_REDIRECT.into_response()
        }
        // `?cdn=<base>` points the redirect at another host.
        p if p.contains("/blobs/sha256:") => {
            let location = match param("cdn") {
                Some(cdn) => format!("{}/cdn/layer", cdn),
                None => "/cdn/layer".to_string(),
            };
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        "/cdn/layer" => "layer-bytes".into_response(),
        p if p.contains("/blobs/uploads/") => {
            let body = axum::body::to_bytes(request.into_body(), usize::MAX)
                .await
                .unwrap();
            (StatusCode::CREATED, format!("received {} bytes", body.len())).into_response()
        }
        "/v2/_catalog" => Json(json!({ "repositories": ["library/busybox"] })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Proxy config with `docker.test` on the primary registry and
/// `quay.mirrors.test` on a third-party mirror.
pub fn proxy_config(primary: &MockRegistry, mirror: &MockRegistry) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.registry.primary_upstream = primary.url();
    config.registry.service = "test-proxy".into();
    config.routes.insert("docker.test".into(), primary.url());
    config.routes.insert("quay.mirrors.test".into(), mirror.url());
    config.observability.metrics_enabled = false;
    config
}

/// Send one request through the proxy in-process.
pub async fn send(server: &HttpServer, request: Request<Body>) -> Response {
    server.router().oneshot(request).await.unwrap()
}

pub fn get(host: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
