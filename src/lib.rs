//! Stagehand: deferred HTTP replies and a server-side template engine.
//!
//! A handler receives a [`RequestContext`], makes exactly one builder call
//! and returns the resulting [`Reply`]; the dispatch boundary executes it.
//! Templates are configured once on a [`TemplateRegistry`] and served from
//! the frozen [`Templates`] table.

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod routing;
pub mod template;

pub use app::{App, AppBuilder};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpServer, Param, Reply, RequestContext, UrlPart};
pub use routing::RouteTable;
pub use template::{TemplateRegistry, Templates};
