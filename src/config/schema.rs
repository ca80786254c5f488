//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Docker Hub's registry endpoint.
pub const DOCKER_HUB: &str = "https://registry-1.docker.io";

/// Root configuration for the registry proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Registry behaviour (mode, primary registry, mirror convention).
    pub registry: RegistryConfig,

    /// Explicit hostname -> upstream base URL mappings.
    pub routes: BTreeMap<String, String>,

    /// Outbound connection timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    /// Plain-HTTP challenges and a fallback upstream for unmapped hosts.
    Debug,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "debug" => Ok(Mode::Debug),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Registry relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub mode: Mode,

    /// Upstream used for any unmapped host in debug mode.
    pub target_upstream: Option<String>,

    /// The registry whose implicit `library/` namespace rule applies.
    pub primary_upstream: String,

    /// Hostname fragment marking read-only mirror hosts.
    pub mirror_marker: String,

    /// Identifier advertised as `service` in synthesized challenges.
    pub service: String,

    /// Seeds the standard route table under this domain when set.
    pub custom_domain: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            target_upstream: None,
            primary_upstream: DOCKER_HUB.to_string(),
            mirror_marker: "mirrors.".to_string(),
            service: "docker-registry-proxy".to_string(),
            custom_domain: None,
        }
    }
}

impl RegistryConfig {
    pub fn is_debug(&self) -> bool {
        self.mode == Mode::Debug
    }
}

/// Timeout configuration for outbound calls.
///
/// No total request deadline: blob downloads stream for as long as the
/// client keeps reading.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            idle_secs: 90,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
