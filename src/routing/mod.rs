//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, Authorization present?)
//!     → table.rs (host → upstream, once)
//!     → router.rs (ordered dispatch rules)
//!     → Return: Dispatch decision
//!
//! Table Compilation (at startup):
//!     custom_domain seed + [routes]
//!     → lowercase hostnames
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always yields the same decision
//! - First matching rule wins

pub mod router;
pub mod table;

pub use router::{Dispatch, RequestFacts, Router};
pub use table::RouteTable;
