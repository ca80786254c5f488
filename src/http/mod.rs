//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → request.rs (host, scheme, credentials)
//!     → [routing layer picks a dispatch path]
//!     → proxy.rs (version check / token exchange / forward / blob replay)
//!     → client.rs (outbound calls to the upstream registry)
//!     → response.rs (relay or synthesize)
//!     → Send to client
//! ```

pub mod client;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use client::UpstreamClient;
pub use request::{Inbound, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
