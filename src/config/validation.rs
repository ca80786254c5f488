//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Every upstream is a bare `scheme://host[:port]` base URL
//! - Debug mode has a usable fallback upstream
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("{field}: '{value}' is not a base URL ({reason})")]
    UpstreamUrl {
        field: String,
        value: String,
        reason: String,
    },

    #[error("route hostname '{0}' must be non-empty and lowercase")]
    Hostname(String),

    #[error("debug mode requires registry.target_upstream")]
    MissingTargetUpstream,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Validate a loaded configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    check_upstream("registry.primary_upstream", &config.registry.primary_upstream, &mut errors);

    for (host, upstream) in &config.routes {
        if host.is_empty() || *host != host.to_lowercase() {
            errors.push(ValidationError::Hostname(host.clone()));
        }
        check_upstream(&format!("routes.\"{}\"", host), upstream, &mut errors);
    }

    match (&config.registry.target_upstream, config.registry.is_debug()) {
        (Some(target), _) => check_upstream("registry.target_upstream", target, &mut errors),
        (None, true) => errors.push(ValidationError::MissingTargetUpstream),
        (None, false) => {}
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    if let Err(reason) = check_base_url(value) {
        errors.push(ValidationError::UpstreamUrl {
            field: field.to_string(),
            value: value.to_string(),
            reason,
        });
    }
}

fn check_base_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    // Url normalizes an empty path to "/", so the raw string is the authority.
    if url.path() != "/" || value.ends_with('/') {
        return Err("must not carry a path".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}
