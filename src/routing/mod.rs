//! Route name table.
//!
//! # Data Flow
//! ```text
//! ServerConfig.routes / App::routes (at startup)
//!     → table.rs (name → path pattern)
//!     → consumed by RequestContext::redirect_to and the `route` template func
//! ```
//!
//! # Design Decisions
//! - Path matching is not done here; the table only builds URLs
//! - Immutable once the App is frozen (thread-safe without locks)
//! - Unknown names are an explicit Fatal error, never a silent default

pub mod table;

pub use table::RouteTable;
