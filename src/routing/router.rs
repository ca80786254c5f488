//! Request dispatch.
//!
//! # Responsibilities
//! - Resolve the upstream for a request exactly once
//! - Evaluate the dispatch rules in priority order
//! - Return the first terminal decision
//!
//! # Design Decisions
//! - Rules are pure predicates over `RequestFacts`; no I/O happens here
//! - Order is fixed: mirror guard, root, host miss, `/v2/`, `/v2/auth`,
//!   namespace redirect, forward
//! - The blob-redirect replay is decided after the forward response arrives,
//!   so it lives in the handler, not here

use crate::config::ProxyConfig;
use crate::registry::normalize_path;
use crate::routing::table::RouteTable;

/// What the router knows about an inbound request.
#[derive(Debug, Clone)]
pub struct RequestFacts<'a> {
    /// Hostname without port.
    pub host: &'a str,
    pub path: &'a str,
    pub has_authorization: bool,
    pub is_mirror: bool,
    pub upstream: Option<&'a str>,
    pub is_primary: bool,
}

/// The handling path chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<'a> {
    /// Credentials sent to a mirror host.
    RejectMirrorLogin,
    /// `/` → `/v2/`.
    RedirectRoot,
    /// No upstream for this host.
    UnknownHost,
    /// `/v2/` version check.
    VersionCheck { upstream: &'a str },
    /// `/v2/auth` token exchange.
    TokenExchange { upstream: &'a str, is_primary: bool },
    /// Unqualified Docker Hub image; redirect to the `library/` path.
    NamespaceRedirect { path: String },
    /// Everything else.
    Forward { upstream: &'a str, is_primary: bool },
}

impl Dispatch<'_> {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Dispatch::RejectMirrorLogin => "mirror_login",
            Dispatch::RedirectRoot => "root_redirect",
            Dispatch::UnknownHost => "unknown_host",
            Dispatch::VersionCheck { .. } => "version_check",
            Dispatch::TokenExchange { .. } => "token",
            Dispatch::NamespaceRedirect { .. } => "namespace_redirect",
            Dispatch::Forward { .. } => "forward",
        }
    }
}

type Rule = for<'a> fn(&RequestFacts<'a>) -> Option<Dispatch<'a>>;

const RULES: [Rule; 7] = [
    reject_mirror_login,
    redirect_root,
    unknown_host,
    version_check,
    token_exchange,
    namespace_redirect,
    forward,
];

fn reject_mirror_login<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    (facts.is_mirror && facts.has_authorization).then_some(Dispatch::RejectMirrorLogin)
}

fn redirect_root<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    (facts.path == "/").then_some(Dispatch::RedirectRoot)
}

fn unknown_host<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    facts.upstream.is_none().then_some(Dispatch::UnknownHost)
}

fn version_check<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    match (facts.path, facts.upstream) {
        ("/v2/", Some(upstream)) => Some(Dispatch::VersionCheck { upstream }),
        _ => None,
    }
}

fn token_exchange<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    match (facts.path, facts.upstream) {
        ("/v2/auth", Some(upstream)) => Some(Dispatch::TokenExchange {
            upstream,
            is_primary: facts.is_primary,
        }),
        _ => None,
    }
}

fn namespace_redirect<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    normalize_path(facts.path, facts.is_primary).map(|path| Dispatch::NamespaceRedirect { path })
}

fn forward<'a>(facts: &RequestFacts<'a>) -> Option<Dispatch<'a>> {
    facts.upstream.map(|upstream| Dispatch::Forward {
        upstream,
        is_primary: facts.is_primary,
    })
}

/// Immutable dispatcher built once at startup.
#[derive(Debug, Clone)]
pub struct Router {
    table: RouteTable,
    primary_upstream: String,
    mirror_marker: String,
}

impl Router {
    pub fn new(
        table: RouteTable,
        primary_upstream: impl Into<String>,
        mirror_marker: impl Into<String>,
    ) -> Self {
        Self {
            table,
            primary_upstream: primary_upstream.into(),
            mirror_marker: mirror_marker.into().to_ascii_lowercase(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            RouteTable::from_config(config),
            config.registry.primary_upstream.clone(),
            config.registry.mirror_marker.clone(),
        )
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// `host` is expected lowercase; the marker is stored lowercase.
    pub fn is_mirror(&self, host: &str) -> bool {
        !self.mirror_marker.is_empty() && host.contains(self.mirror_marker.as_str())
    }

    /// Gather the facts for a request, resolving its upstream once.
    pub fn facts<'a>(
        &'a self,
        host: &'a str,
        path: &'a str,
        has_authorization: bool,
    ) -> RequestFacts<'a> {
        let upstream = self.table.resolve(host);
        RequestFacts {
            host,
            path,
            has_authorization,
            is_mirror: self.is_mirror(host),
            upstream,
            is_primary: upstream == Some(self.primary_upstream.as_str()),
        }
    }

    /// Pick the handling path for a request.
    pub fn dispatch<'a>(
        &'a self,
        host: &'a str,
        path: &'a str,
        has_authorization: bool,
    ) -> Dispatch<'a> {
        let facts = self.facts(host, path, has_authorization);
        RULES
            .iter()
            .find_map(|rule| rule(&facts))
            .unwrap_or(Dispatch::UnknownHost)
    }
}
