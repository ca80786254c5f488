//! Registry relay: executes the router's dispatch decision.
//!
//! Each request makes at most two sequential upstream calls (version check then token
//! fetch, or forward then blob replay). Nothing is retried.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};

use crate::error::{ProxyError, ProxyResult};
use crate::http::client::{upstream_url, Redirects};
use crate::http::request::Inbound;
use crate::http::response;
use crate::http::server::AppState;
use crate::registry::{fetch_token, normalize_scope, WwwAuthenticate};
use crate::routing::Dispatch;

/// Handle one inbound request end to end.
///
/// Returns the dispatch kind alongside the outcome for logging and metrics.
pub async fn handle(
    state: &AppState,
    request: Request<Body>,
) -> (&'static str, ProxyResult<Response>) {
    let debug = state.config.registry.is_debug();
    let inbound = Inbound::from_request(&request, debug);

    let dispatch = state.router.dispatch(
        &inbound.hostname,
        &inbound.path,
        inbound.authorization.is_some(),
    );
    let kind = dispatch.kind();

    tracing::debug!(
        request_id = %inbound.request_id,
        host = %inbound.hostname,
        path = %inbound.path,
        dispatch = kind,
        "Dispatching request"
    );

    let result = match dispatch {
        Dispatch::RejectMirrorLogin => Ok(response::mirror_login_forbidden()),
        Dispatch::RedirectRoot => Ok(response::moved_permanently(&inbound.absolute("/v2/"))),
        Dispatch::UnknownHost => {
            tracing::warn!(host = %inbound.hostname, "No upstream for host");
            Ok(response::unknown_host(state.router.table()))
        }
        Dispatch::VersionCheck { upstream } => version_check(state, &inbound, upstream).await,
        Dispatch::TokenExchange { upstream, is_primary } => {
            token_exchange(state, &inbound, upstream, is_primary).await
        }
        Dispatch::NamespaceRedirect { path } => {
            let mut location = inbound.absolute(&path);
            if let Some(query) = &inbound.query {
                location.push('?');
                location.push_str(query);
            }
            Ok(response::moved_permanently(&location))
        }
        Dispatch::Forward { upstream, is_primary } => {
            forward(state, &inbound, request, upstream, is_primary).await
        }
    };

    (kind, result)
}

fn unauthorized(state: &AppState, inbound: &Inbound) -> Response {
    let registry = &state.config.registry;
    response::unauthorized(inbound, registry.is_debug(), &registry.service)
}

/// `/v2/`: report reachability, replacing the upstream's challenge with ours.
async fn version_check(
    state: &AppState,
    inbound: &Inbound,
    upstream: &str,
) -> ProxyResult<Response> {
    let url = upstream_url(upstream, "/v2/")?;
    let resp = state.client.get(url, inbound.authorization.as_ref()).await?;

    if resp.status() == StatusCode::UNAUTHORIZED {
        return Ok(unauthorized(state, inbound));
    }
    Ok(response::relay(resp))
}

/// `/v2/auth`: provoke the upstream's challenge, then fetch a token from its realm.
async fn token_exchange(
    state: &AppState,
    inbound: &Inbound,
    upstream: &str,
    is_primary: bool,
) -> ProxyResult<Response> {
    let url = upstream_url(upstream, "/v2/")?;
    let resp = state.client.get(url, None).await?;

    if resp.status() != StatusCode::UNAUTHORIZED {
        return Ok(response::relay(resp));
    }
    let www_authenticate = resp
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
    let Some(www_authenticate) = www_authenticate else {
        return Ok(response::relay(resp));
    };

    let challenge = WwwAuthenticate::parse(&www_authenticate)?;
    let scope = inbound.scope().map(|s| normalize_scope(&s, is_primary));

    let token = fetch_token(
        &state.client,
        &challenge,
        scope.as_deref(),
        inbound.authorization.as_ref(),
    )
    .await?;
    Ok(response::relay(token))
}

/// Everything else under `/v2/`.
async fn forward(
    state: &AppState,
    inbound: &Inbound,
    request: Request<Body>,
    upstream: &str,
    is_primary: bool,
) -> ProxyResult<Response> {
    let url = upstream_url(upstream, &inbound.path_and_query())?;
    // The primary registry's blob storage answers 307; that hop is replayed below.
    let redirects = if is_primary {
        Redirects::Manual
    } else {
        Redirects::Follow
    };

    let (parts, body) = request.into_parts();
    let resp = state
        .client
        .forward(url, parts.method, &parts.headers, body, redirects)
        .await?;

    if resp.status() == StatusCode::UNAUTHORIZED {
        return Ok(unauthorized(state, inbound));
    }

    if is_primary && resp.status() == StatusCode::TEMPORARY_REDIRECT {
        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ProxyError::MissingLocation)?;
        // Location may be relative to the URL that produced it.
        let target = resp
            .url()
            .join(location)
            .map_err(|e| ProxyError::invalid_url(location, e))?;

        tracing::debug!(
            request_id = %inbound.request_id,
            location = %target,
            "Replaying blob redirect"
        );
        let replay = state.client.get(target, None).await?;
        return Ok(response::relay(replay));
    }

    Ok(response::relay(resp))
}
