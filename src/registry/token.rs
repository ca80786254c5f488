//! Token exchange against a challenge realm.

use axum::http::HeaderValue;
use url::Url;

use crate::error::{ProxyError, ProxyResult};
use crate::http::client::UpstreamClient;
use crate::registry::challenge::WwwAuthenticate;

/// Build the realm URL with `service` and `scope` set.
///
/// Existing query parameters on the realm are kept unless they collide.
pub fn token_url(challenge: &WwwAuthenticate, scope: Option<&str>) -> ProxyResult<Url> {
    let mut url =
        Url::parse(&challenge.realm).map_err(|e| ProxyError::invalid_url(&challenge.realm, e))?;

    let mut params: Vec<(String, String)> = Vec::new();
    if !challenge.service.is_empty() {
        params.push(("service".into(), challenge.service.clone()));
    }
    if let Some(scope) = scope {
        params.push(("scope".into(), scope.to_string()));
    }
    if params.is_empty() {
        return Ok(url);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(p, _)| p == k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut().clear().extend_pairs(kept).extend_pairs(params);
    Ok(url)
}

/// Ask the realm for a token. The response is returned untouched.
pub async fn fetch_token(
    client: &UpstreamClient,
    challenge: &WwwAuthenticate,
    scope: Option<&str>,
    authorization: Option<&HeaderValue>,
) -> ProxyResult<reqwest::Response> {
    let url = token_url(challenge, scope)?;
    tracing::debug!(realm = %challenge.realm, scope = ?scope, "Fetching token");
    client.get(url, authorization).await
}
