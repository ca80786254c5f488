//! Hostname → upstream registry lookup.
//!
//! # Responsibilities
//! - Hold the hostname → upstream base URL map
//! - Resolve an inbound hostname, with the debug-mode fallback
//! - Seed the standard mirror host set for a custom domain
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc without locks)
//! - BTreeMap so the diagnostic listing is stable
//! - Host matching is case-insensitive (per HTTP spec)

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ProxyConfig;

/// Third-party registries mirrored under `<name>.<mirror_marker><domain>`.
const MIRRORED: [(&str, &str); 7] = [
    ("quay", "https://quay.io"),
    ("gcr", "https://gcr.io"),
    ("k8s-gcr", "https://k8s.gcr.io"),
    ("k8s", "https://registry.k8s.io"),
    ("ghcr", "https://ghcr.io"),
    ("cloudsmith", "https://docker.cloudsmith.io"),
    ("ecr", "https://public.ecr.aws"),
];

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: BTreeMap<String, String>,
    #[serde(skip)]
    fallback: Option<String>,
}

impl RouteTable {
    pub fn new(routes: BTreeMap<String, String>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(host, upstream)| (host.to_ascii_lowercase(), upstream))
            .collect();
        Self {
            routes,
            fallback: None,
        }
    }

    /// Upstream returned for any unmapped host.
    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }

    /// The standard host set for `domain`.
    pub fn standard(domain: &str, primary: &str, mirror_marker: &str) -> BTreeMap<String, String> {
        let mut routes = BTreeMap::new();
        routes.insert(format!("docker.{}", domain), primary.to_string());
        routes.insert(format!("docker-staging.{}", domain), primary.to_string());
        for (name, upstream) in MIRRORED {
            routes.insert(
                format!("{}.{}{}", name, mirror_marker, domain),
                upstream.to_string(),
            );
        }
        routes
    }

    /// Build the table a configuration describes.
    ///
    /// Explicit `[routes]` entries override the seeded standard set.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let registry = &config.registry;
        let mut routes = match &registry.custom_domain {
            Some(domain) => {
                Self::standard(domain, &registry.primary_upstream, &registry.mirror_marker)
            }
            None => BTreeMap::new(),
        };
        routes.extend(config.routes.clone());

        let fallback = if registry.is_debug() {
            registry.target_upstream.clone()
        } else {
            None
        };

        Self::new(routes).with_fallback(fallback)
    }

    /// Look up the upstream for `host` (port already stripped).
    pub fn resolve(&self, host: &str) -> Option<&str> {
        self.routes
            .get(&host.to_ascii_lowercase())
            .or(self.fallback.as_ref())
            .map(String::as_str)
    }

    pub fn routes(&self) -> &BTreeMap<String, String> {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
