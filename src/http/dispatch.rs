//! Dispatch boundary: runs a handler, executes its reply and applies the
//! error-severity policy.
//!
//! # Severity policy
//! ```text
//! Ignorable    → debug log, response left as written
//! Recoverable  → warn log, 500 text response if nothing was written yet
//! Fatal        → error log, then panic (programming or configuration defect)
//! ```

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tracing::{debug, error, warn};

use crate::app::App;
use crate::error::ErrorKind;
use crate::http::context::RequestContext;
use crate::http::reply::{Reply, TEXT_PLAIN};
use crate::http::writer::{set_default_content_type, ResponseRecorder, ResponseWriter};
use crate::observability::metrics;

/// Build a context for `request`, run `handler` and return the response.
///
/// The request body is not read; handlers see the request head only.
pub fn serve<F>(app: Arc<App>, request: Request<Body>, handler: F) -> Response
where
    F: FnOnce(&mut RequestContext) -> Reply,
{
    let (parts, _body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    let mut ctx = RequestContext::new(app, parts);
    let reply = handler(&mut ctx);

    let mut recorder = ResponseRecorder::new();
    finish(reply, &mut recorder);
    debug!(
        method = %method,
        path = %path,
        status = recorder.status_code().as_u16(),
        "reply dispatched"
    );
    recorder.into_response()
}

/// Execute `reply` into `w` and handle its failure by severity.
///
/// # Panics
///
/// Panics when the reply fails with a fatal error.
pub fn finish(reply: Reply, w: &mut dyn ResponseWriter) {
    let kind = reply.kind();
    let started = Instant::now();

    if let Err(err) = reply.execute(w) {
        match err.kind() {
            ErrorKind::Ignorable => {
                debug!(reply = kind, error = %err, "client disconnected during reply");
            }
            ErrorKind::Recoverable => {
                warn!(reply = kind, error = %err, "reply failed");
                if w.status().is_none() {
                    set_default_content_type(w, TEXT_PLAIN);
                    w.write_status(StatusCode::INTERNAL_SERVER_ERROR);
                    let _ = w.write_all(b"Internal Server Error\n");
                }
            }
            ErrorKind::Fatal => {
                error!(reply = kind, error = %err, "fatal reply error");
                panic!("stagehand: {err}");
            }
        }
    }

    let status = w.status().unwrap_or(StatusCode::OK);
    metrics::record_reply(kind, status.as_u16(), started);
}
