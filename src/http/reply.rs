//! Deferred replies.
//!
//! # Responsibilities
//! - Hold one complete response description built by a `RequestContext`
//! - Write it to a `ResponseWriter` when the dispatch boundary executes it
//!
//! # Design Decisions
//! - Building a reply never fails and never writes; failures found while
//!   building (unknown route, encoding) are stored and returned by `execute`
//! - Content-Type is only set when absent
//! - The before-render hook wraps content and view replies only

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use axum::http::header::{HeaderValue, LOCATION, X_CONTENT_TYPE_OPTIONS};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};

use crate::app::App;
use crate::error::{Error, Result};
use crate::http::writer::{set_default_content_type, ResponseWriter};
use crate::template::Value;

pub(crate) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub(crate) const TEXT_HTML: &str = "text/html; charset=utf-8";
pub(crate) const APPLICATION_JSON: &str = "application/json; charset=utf-8";
pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

pub(crate) enum Action {
    Content {
        content_type: &'static str,
        body: Vec<u8>,
    },
    Copy(Box<dyn io::Read + Send>),
    View {
        name: String,
        data: Value,
    },
    Redirect {
        location: String,
        status: StatusCode,
    },
    Error(String),
    NotFound,
    NoContent,
    Nothing,
    Fail(Error),
}

impl Action {
    fn kind(&self) -> &'static str {
        match self {
            Action::Content { .. } => "content",
            Action::Copy(_) => "copy",
            Action::View { .. } => "view",
            Action::Redirect { .. } => "redirect",
            Action::Error(_) => "error",
            Action::NotFound => "not_found",
            Action::NoContent => "no_content",
            Action::Nothing => "nothing",
            Action::Fail(_) => "fail",
        }
    }

    fn is_hooked(&self) -> bool {
        matches!(self, Action::Content { .. } | Action::Copy(_) | Action::View { .. })
    }
}

/// A single-use response, executed once by the dispatch boundary.
#[must_use = "a reply does nothing until it is executed"]
pub struct Reply {
    app: Arc<App>,
    request: Arc<Parts>,
    status: Option<StatusCode>,
    action: Action,
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("kind", &self.kind())
            .field("status", &self.status)
            .finish()
    }
}

impl Reply {
    pub(crate) fn new(app: Arc<App>, request: Arc<Parts>, status: Option<StatusCode>, action: Action) -> Self {
        Self {
            app,
            request,
            status,
            action,
        }
    }

    /// Short label of the reply type, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        self.action.kind()
    }

    /// Write the response.
    pub fn execute(self, w: &mut dyn ResponseWriter) -> Result<()> {
        let Reply {
            app,
            request,
            status,
            action,
        } = self;

        match app.hook() {
            Some(hook) if action.is_hooked() => {
                let render_app = app.clone();
                hook.before_render(
                    w,
                    &request,
                    Box::new(move |w: &mut dyn ResponseWriter| write_content(&render_app, status, action, w)),
                )
            }
            _ => match action {
                Action::Redirect { location, status } => write_redirect(&request.method, &location, status, w),
                Action::Error(message) => write_error(w, status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), &message),
                Action::NotFound => write_error(w, StatusCode::NOT_FOUND, "404 page not found"),
                Action::NoContent => {
                    w.write_status(StatusCode::NO_CONTENT);
                    Ok(())
                }
                Action::Nothing => Ok(()),
                Action::Fail(err) => Err(err),
                content => write_content(&app, status, content, w),
            },
        }
    }
}

fn write_content(app: &App, status: Option<StatusCode>, action: Action, w: &mut dyn ResponseWriter) -> Result<()> {
    let status = status.unwrap_or(StatusCode::OK);
    match action {
        Action::Content { content_type, body } => {
            set_default_content_type(w, content_type);
            w.write_status(status);
            w.write_all(&body)?;
            Ok(())
        }
        Action::Copy(mut reader) => {
            set_default_content_type(w, OCTET_STREAM);
            w.write_status(status);
            io::copy(&mut reader, w)?;
            Ok(())
        }
        Action::View { name, data } => {
            let mut body = DeferredStatus {
                w: &mut *w,
                status,
            };
            app.templates().execute_value(&name, &mut body, data)?;
            body.start();
            Ok(())
        }
        // Only content actions reach the hook.
        other => Err(Error::Io(io::Error::other(format!(
            "{} reply is not renderable content",
            other.kind()
        )))),
    }
}

// Writes the HTML content type and the status on the first body byte, so a
// render that fails before producing output leaves both free for an error
// response.
struct DeferredStatus<'a> {
    w: &'a mut dyn ResponseWriter,
    status: StatusCode,
}

impl DeferredStatus<'_> {
    fn start(&mut self) {
        set_default_content_type(&mut *self.w, TEXT_HTML);
        self.w.write_status(self.status);
    }
}

impl Write for DeferredStatus<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.start();
        self.w.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

fn write_redirect(method: &Method, location: &str, status: StatusCode, w: &mut dyn ResponseWriter) -> Result<()> {
    let value = HeaderValue::from_str(&escape_location(location))
        .map_err(|_| Error::InvalidHeader(location.to_string()))?;
    w.headers_mut().insert(LOCATION, value);

    if *method == Method::GET || *method == Method::HEAD {
        set_default_content_type(w, TEXT_HTML);
        w.write_status(status);
        let reason = status.canonical_reason().unwrap_or_default();
        write!(
            w,
            "<a href=\"{}\">{}</a>.\n\n",
            crate::template::value::escape_html(location),
            reason
        )?;
    } else {
        w.write_status(status);
    }
    Ok(())
}

fn write_error(w: &mut dyn ResponseWriter, status: StatusCode, message: &str) -> Result<()> {
    set_default_content_type(w, TEXT_PLAIN);
    w.headers_mut()
        .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    w.write_status(status);
    w.write_all(message.as_bytes())?;
    w.write_all(b"\n")?;
    Ok(())
}

// Percent-encode bytes a header value cannot carry.
fn escape_location(location: &str) -> String {
    let mut out = String::with_capacity(location.len());
    for b in location.bytes() {
        if b < 0x20 || b >= 0x7f {
            out.push_str(&format!("%{:02X}", b));
        } else {
            out.push(b as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_location() {
        assert_eq!(escape_location("/a b?x=1"), "/a b?x=1");
        assert_eq!(escape_location("/caf\u{e9}"), "/caf%C3%A9");
        assert_eq!(escape_location("/x\r\ny"), "/x%0D%0Ay");
    }
}
