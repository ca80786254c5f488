//! Response construction.
//!
//! # Responsibilities
//! - Relay upstream responses to the client
//! - Synthesize the proxy's own 301/401/403/404 responses
//!
//! # Design Decisions
//! - Upstream bodies are streamed, never buffered
//! - Hop-by-hop headers stripped from relayed responses
//! - Every synthesized challenge points at this proxy's `/v2/auth`

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::client::is_hop_by_hop;
use crate::http::request::Inbound;
use crate::routing::RouteTable;

pub const MIRROR_LOGIN_DISABLED: &str =
    "Login via this mirror is disabled. Please login to the original registry directly.";

/// `{"message": "<text>"}` with the given status.
pub fn json_message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Relay an upstream response: status, end-to-end headers, streamed body.
pub fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    let hop: Vec<_> = headers.keys().filter(|k| is_hop_by_hop(k)).cloned().collect();
    for name in hop {
        headers.remove(name);
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// 401 directing the client to authenticate against this proxy.
pub fn unauthorized(inbound: &Inbound, debug: bool, service: &str) -> Response {
    let realm = if debug {
        format!("http://{}/v2/auth", inbound.host)
    } else {
        format!("https://{}/v2/auth", inbound.hostname)
    };
    let challenge = format!("Bearer realm=\"{}\",service=\"{}\"", realm, service);

    let mut response = json_message(StatusCode::UNAUTHORIZED, "UNAUTHORIZED");
    match HeaderValue::from_str(&challenge) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        Err(e) => tracing::error!(error = %e, host = %inbound.host, "Unrepresentable challenge"),
    }
    response
}

pub fn mirror_login_forbidden() -> Response {
    json_message(StatusCode::FORBIDDEN, MIRROR_LOGIN_DISABLED)
}

/// 404 listing every configured route.
pub fn unknown_host(table: &RouteTable) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "routes": table }))).into_response()
}

/// 301 to an absolute location.
pub fn moved_permanently(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => json_message(StatusCode::BAD_REQUEST, "invalid redirect target"),
    }
}
