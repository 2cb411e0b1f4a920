//! Template engine subsystem.
//!
//! # Data Flow
//! ```text
//! source text / files / YAML document
//!     → lexer.rs (text runs + action tokens)
//!     → parse.rs (node tree, functions resolved)
//!     → registry.rs (named sets, preload, root selection)
//!     → Templates::freeze
//!     → exec.rs (render; components via component.rs)
//!     → minify.rs (optional rewrite)
//!     → io::Write
//! ```
//!
//! # Design Decisions
//! - Configuration happens on a mutable `TemplateRegistry`; serving only
//!   sees the frozen `Templates`, which has no mutators
//! - Everything a template names statically is checked at parse time
//! - Minification is a registry-wide switch read at render time, so it
//!   does not matter when it is enabled

pub mod component;
pub mod exec;
pub mod funcs;
mod lexer;
pub mod minify;
pub mod parse;
pub mod registry;
pub mod value;

pub use component::Components;
pub use exec::ExecError;
pub use funcs::{CallEnv, Func, FuncMap};
pub use minify::minify_html;
pub use parse::ParseError;
pub use registry::{TemplateRegistry, Templates};
pub use value::Value;
