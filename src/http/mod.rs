//! HTTP response-building subsystem.
//!
//! # Data Flow
//! ```text
//! axum request
//!     → server.rs (middleware, `page` adapter)
//!     → dispatch.rs (RequestContext for the request head)
//!     → handler: context.rs builder call → reply.rs Reply (no I/O yet)
//!     → dispatch.rs executes the Reply into writer.rs ResponseRecorder
//!         ├─ hook.rs wraps content and view replies
//!         └─ redirect.rs computes Location and status
//!     → axum Response
//! ```
//!
//! # Design Decisions
//! - A handler produces exactly one Reply; producing it performs no I/O
//! - The dispatch boundary alone decides what an error means for the
//!   process (see `dispatch`)

pub mod context;
pub mod dispatch;
pub mod hook;
pub mod redirect;
pub mod reply;
pub mod server;
pub mod writer;

pub use context::RequestContext;
pub use dispatch::{finish, serve};
pub use hook::{BeforeRender, Render};
pub use redirect::{Param, UrlPart};
pub use reply::Reply;
pub use server::{page, HttpServer};
pub use writer::{ResponseRecorder, ResponseWriter};
