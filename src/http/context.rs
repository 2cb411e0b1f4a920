//! Per-request reply builder.
//!
//! # Responsibilities
//! - Carry the application, the request head and the status override
//! - Turn one builder call into a deferred [`Reply`]
//!
//! # Design Decisions
//! - The application is passed in explicitly; nothing is looked up from
//!   ambient state
//! - Builders take `&self`, so `ctx.status(..).view(..)` chains

use std::fmt::Display;
use std::io;
use std::sync::Arc;

use axum::http::header::REFERER;
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, Uri};
use serde::Serialize;

use crate::app::App;
use crate::error::Error;
use crate::http::redirect::{back_target, build_path, redirect_status, safe_redirect_path, Param, UrlPart};
use crate::http::reply::{Action, Reply, APPLICATION_JSON, OCTET_STREAM, TEXT_HTML, TEXT_PLAIN};
use crate::template::Value;

pub struct RequestContext {
    app: Arc<App>,
    request: Arc<Parts>,
    status: Option<StatusCode>,
}

impl RequestContext {
    pub fn new(app: Arc<App>, request: Parts) -> Self {
        Self {
            app,
            request: Arc::new(request),
            status: None,
        }
    }

    /// Override the status of the reply built next.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub fn request(&self) -> &Parts {
        &self.request
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn uri(&self) -> &Uri {
        &self.request.uri
    }

    /// Query parameter for `redirect` and `redirect_to`.
    pub fn param(&self, name: impl Into<String>, value: impl Display) -> Param {
        Param::new(name, value)
    }

    fn reply(&self, action: Action) -> Reply {
        Reply::new(self.app.clone(), self.request.clone(), self.status, action)
    }

    fn content(&self, content_type: &'static str, body: Vec<u8>) -> Reply {
        self.reply(Action::Content { content_type, body })
    }

    /// Raw bytes, `application/octet-stream` unless set.
    pub fn bytes(&self, body: impl Into<Vec<u8>>) -> Reply {
        self.content(OCTET_STREAM, body.into())
    }

    /// Stream a reader into the body.
    pub fn copy_from<R>(&self, reader: R) -> Reply
    where
        R: io::Read + Send + 'static,
    {
        self.reply(Action::Copy(Box::new(reader)))
    }

    pub fn string(&self, body: impl Display) -> Reply {
        self.content(TEXT_PLAIN, body.to_string().into_bytes())
    }

    /// JSON body followed by a newline.
    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> Reply {
        match serde_json::to_vec(data) {
            Ok(mut body) => {
                body.push(b'\n');
                self.content(APPLICATION_JSON, body)
            }
            Err(e) => self.reply(Action::Fail(Error::Encode(e))),
        }
    }

    pub fn html(&self, body: impl Into<Vec<u8>>) -> Reply {
        self.content(TEXT_HTML, body.into())
    }

    /// Reason phrase of the effective status as a plain-text body.
    pub fn status_text(&self) -> Reply {
        let status = self.status.unwrap_or(StatusCode::OK);
        self.string(status.canonical_reason().unwrap_or_default())
    }

    /// Render a registered template.
    pub fn view<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Reply {
        match Value::from_serialize(data) {
            Ok(data) => self.reply(Action::View {
                name: name.to_string(),
                data,
            }),
            Err(e) => self.reply(Action::Fail(Error::Encode(e))),
        }
    }

    fn redirect_with(&self, location: String, status: Option<StatusCode>) -> Reply {
        let status = redirect_status(&self.request.method, status);
        self.reply(Action::Redirect { location, status })
    }

    /// Redirect to `url` plus trailing path segments and query parameters.
    pub fn redirect<I>(&self, url: &str, parts: I) -> Reply
    where
        I: IntoIterator<Item = UrlPart>,
    {
        self.redirect_with(build_path(url, parts), self.status)
    }

    /// `redirect`, with the built URL reduced to a same-origin path.
    pub fn safe_redirect<I>(&self, url: &str, parts: I) -> Reply
    where
        I: IntoIterator<Item = UrlPart>,
    {
        self.redirect_with(safe_redirect_path(&build_path(url, parts)), self.status)
    }

    /// Redirect to a named route.
    pub fn redirect_to<I>(&self, route: &str, parts: I) -> Reply
    where
        I: IntoIterator<Item = UrlPart>,
    {
        match self.app.routes().url(route, parts) {
            Ok(location) => self.redirect_with(location, self.status),
            Err(e) => self.reply(Action::Fail(e)),
        }
    }

    /// 303 to the current request URI.
    pub fn redirect_to_get(&self) -> Reply {
        self.redirect_with(self.request_uri().to_string(), Some(StatusCode::SEE_OTHER))
    }

    /// Redirect to the referer, then `fallback`, then the current URI.
    pub fn redirect_back(&self, fallback: &str) -> Reply {
        self.redirect_with(self.back_target(fallback), self.status)
    }

    /// 303 to the referer, or the current URI.
    pub fn redirect_back_to_get(&self) -> Reply {
        self.redirect_with(self.back_target(""), Some(StatusCode::SEE_OTHER))
    }

    /// `redirect_back` restricted to same-origin paths.
    pub fn safe_redirect_back(&self, fallback: &str) -> Reply {
        self.redirect_with(safe_redirect_path(&self.back_target(fallback)), self.status)
    }

    /// Plain-text error, 500 unless overridden.
    pub fn error(&self, message: impl Display) -> Reply {
        self.reply(Action::Error(message.to_string()))
    }

    pub fn not_found(&self) -> Reply {
        self.reply(Action::NotFound)
    }

    pub fn no_content(&self) -> Reply {
        self.reply(Action::NoContent)
    }

    /// A reply that writes nothing; the handler answered some other way.
    pub fn nothing(&self) -> Reply {
        self.reply(Action::Nothing)
    }

    fn request_uri(&self) -> &str {
        self.request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    fn back_target(&self, fallback: &str) -> String {
        let referer = self
            .request
            .headers
            .get(REFERER)
            .and_then(|v| v.to_str().ok());
        back_target(referer, fallback, self.request_uri())
    }
}
