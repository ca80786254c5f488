//! Outbound HTTP client for upstream registries.
//!
//! # Responsibilities
//! - Hold the two redirect policies the relay needs
//! - Build upstream URLs from a base URL and an inbound path
//! - Stream request bodies through without buffering
//!
//! # Design Decisions
//! - One `reqwest::Client` per policy; both share the connection settings
//! - No retries: a failed call surfaces immediately to the caller

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use reqwest::redirect::Policy;
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::{ProxyError, ProxyResult};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Whether redirects returned by the upstream are followed transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    Follow,
    Manual,
}

#[derive(Clone)]
pub struct UpstreamClient {
    follow: reqwest::Client,
    manual: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let builder = || {
            reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(timeouts.connect_secs))
                .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
        };

        Ok(Self {
            follow: builder().build()?,
            manual: builder().redirect(Policy::none()).build()?,
        })
    }

    fn client(&self, redirects: Redirects) -> &reqwest::Client {
        match redirects {
            Redirects::Follow => &self.follow,
            Redirects::Manual => &self.manual,
        }
    }

    /// GET a URL, following redirects, optionally carrying credentials.
    pub async fn get(
        &self,
        url: Url,
        authorization: Option<&HeaderValue>,
    ) -> ProxyResult<reqwest::Response> {
        let mut request = self.follow.get(url);
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value.clone());
        }
        Ok(request.send().await?)
    }

    /// Re-issue an inbound request against an upstream URL.
    pub async fn forward(
        &self,
        url: Url,
        method: Method,
        headers: &HeaderMap,
        body: Body,
        redirects: Redirects,
    ) -> ProxyResult<reqwest::Response> {
        let mut outbound = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            if name == header::HOST || is_hop_by_hop(name) {
                continue;
            }
            outbound.append(name.clone(), value.clone());
        }

        let carries_body = method != Method::GET && method != Method::HEAD;
        let mut request = self.client(redirects).request(method, url).headers(outbound);
        if carries_body {
            request = request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        Ok(request.send().await?)
    }
}

/// Join an upstream base URL with an inbound path (and query).
pub fn upstream_url(base: &str, path_and_query: &str) -> ProxyResult<Url> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path_and_query);
    Url::parse(&raw).map_err(|e| ProxyError::invalid_url(raw, e))
}
