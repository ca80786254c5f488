//! Docker Registry HTTP API v2 protocol helpers.
//!
//! # Data Flow
//! ```text
//! GET /v2/auth?scope=...
//!     → upstream /v2/ answers 401
//!     → challenge.rs (realm + service from WWW-Authenticate)
//!     → namespace.rs (library/ completion, primary registry only)
//!     → token.rs (GET realm?service=..&scope=..)
//!     → token response relayed verbatim
//! ```

pub mod challenge;
pub mod namespace;
pub mod token;

pub use challenge::{ChallengeError, WwwAuthenticate};
pub use namespace::{normalize_path, normalize_scope};
pub use token::fetch_token;
