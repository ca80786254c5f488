//! Docker Registry v2 relay library.
//!
//! Fronts several upstream container registries behind one set of
//! hostnames, relaying the bearer-token handshake through this proxy.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
