//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! template document (YAML)            server file (TOML)
//!     → loader.rs (parse)                 → loader.rs (parse)
//!     → validation.rs (semantic checks)   → validation.rs
//!     → TemplateConfig                    → ServerConfig
//!     → TemplateRegistry::configure       → binary bootstrap
//! ```
//!
//! # Design Decisions
//! - Malformed documents fail at load time, never lazily at first use
//! - All fields have defaults to allow minimal documents
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_template_config, parse_template_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ServerConfig, TemplateConfig};
pub use validation::ValidationError;
