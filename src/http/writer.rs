//! Response destination used by replies.

use std::io;

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::Response;

/// Where a reply writes its status, headers and body.
///
/// The first `write_status` wins; writing body bytes before any status
/// implies `200 OK`.
pub trait ResponseWriter: io::Write {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_status(&mut self, status: StatusCode);

    /// Status written so far, if any.
    fn status(&self) -> Option<StatusCode>;
}

/// Set `name` only when the response does not carry it yet.
pub(crate) fn set_default_header(w: &mut dyn ResponseWriter, name: HeaderName, value: &'static str) {
    if !w.headers().contains_key(&name) {
        w.headers_mut().insert(name, HeaderValue::from_static(value));
    }
}

pub(crate) fn set_default_content_type(w: &mut dyn ResponseWriter, value: &'static str) {
    set_default_header(w, CONTENT_TYPE, value);
}

/// In-memory response, converted into an axum `Response` once the reply
/// has run.
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective status: the written one, or 200.
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl io::Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_first_status_wins() {
        let mut w = ResponseRecorder::new();
        w.write_status(StatusCode::FOUND);
        w.write_status(StatusCode::OK);
        assert_eq!(w.status_code(), StatusCode::FOUND);
    }

    #[test]
    fn test_body_implies_ok() {
        let mut w = ResponseRecorder::new();
        w.write_all(b"hi").unwrap();
        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.body_string(), "hi");
    }

    #[test]
    fn test_default_content_type_never_overwrites() {
        let mut w = ResponseRecorder::new();
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        set_default_content_type(&mut w, "text/plain; charset=utf-8");
        assert_eq!(w.header("content-type"), Some("text/csv"));
    }

    #[test]
    fn test_into_response() {
        let mut w = ResponseRecorder::new();
        w.write_status(StatusCode::NOT_FOUND);
        set_default_content_type(&mut w, "text/plain; charset=utf-8");
        let response = w.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(CONTENT_TYPE));
    }
}
