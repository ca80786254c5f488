//! Request-level failures.
//!
//! Anything that prevents the proxy from producing an upstream-derived
//! response ends up here and is reported to the client as `502 Bad Gateway`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::json_message;
use crate::registry::challenge::ChallengeError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The upstream's bearer challenge could not be parsed.
    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    /// Network or protocol failure talking to an upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("invalid upstream URL '{url}': {source}")]
    InvalidUpstreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A blob redirect carried no usable `Location` header.
    #[error("upstream redirect without a usable Location header")]
    MissingLocation,
}

pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        ProxyError::InvalidUpstreamUrl {
            url: url.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_GATEWAY
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Request failed");
        json_message(self.status(), &self.to_string())
    }
}
