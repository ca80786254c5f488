//! Request handling and inspection.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Extract routing-relevant information (host, path, credentials)
//! - Work out the scheme clients used to reach the proxy
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound request is never mutated; only its parts are read

use std::str::FromStr;

use axum::http::{header, uri::Authority, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Only these end up in redirect and challenge URLs.
fn is_web_scheme(scheme: &str) -> bool {
    matches!(scheme, "http" | "https")
}

/// Produces a fresh UUID v4 for every request lacking an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The parts of an inbound request the relay looks at.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Host as sent by the client, port included.
    pub host: String,
    /// Host without port, used for route lookup.
    pub hostname: String,
    pub scheme: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<HeaderValue>,
    pub request_id: String,
}

impl Inbound {
    /// Inspect a request. `debug` picks the default scheme when the client's
    /// scheme cannot be observed.
    pub fn from_request<B>(request: &Request<B>, debug: bool) -> Self {
        let headers = request.headers();

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| request.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let hostname = Authority::from_str(&host)
            .map(|a| a.host().to_ascii_lowercase())
            .unwrap_or_else(|_| host.to_ascii_lowercase());

        let scheme = headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_ascii_lowercase())
            .filter(|v| is_web_scheme(v))
            .or_else(|| {
                request
                    .uri()
                    .scheme_str()
                    .map(str::to_ascii_lowercase)
                    .filter(|v| is_web_scheme(v))
            })
            .unwrap_or_else(|| if debug { "http" } else { "https" }.to_string());

        let authorization = headers
            .get(header::AUTHORIZATION)
            .filter(|v| !v.is_empty())
            .cloned();

        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            host,
            hostname,
            scheme,
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            authorization,
            request_id,
        }
    }

    /// First `scope` query parameter, if present and non-empty.
    pub fn scope(&self) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    }

    /// Absolute URL on this proxy for `path`, keeping the client's scheme and host.
    pub fn absolute(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, path)
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}
