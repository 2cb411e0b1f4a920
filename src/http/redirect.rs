//! Redirect target resolution and URL building.
//!
//! # Responsibilities
//! - Join trailing path segments and query parameters onto a base URL
//! - Pick the "back" target (referer, then fallback, then current URI)
//! - Collapse cross-origin targets to same-origin paths (open-redirect guard)
//! - Default the status code by request method
//!
//! # Design Decisions
//! - Pure functions only; the request context feeds them request data
//! - Query parameters keep insertion order
//! - An explicit status always wins over the method default

use std::fmt;

use axum::http::{Method, StatusCode};
use url::{form_urlencoded, Url};

/// A named query parameter appended to a built URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// One trailing argument of a redirect or route URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPart {
    /// Appended as an additional `/`-joined path segment.
    Segment(String),
    /// Appended as a query parameter.
    Query(Param),
}

impl From<Param> for UrlPart {
    fn from(p: Param) -> Self {
        UrlPart::Query(p)
    }
}

impl From<&str> for UrlPart {
    fn from(s: &str) -> Self {
        UrlPart::Segment(s.to_string())
    }
}

impl From<String> for UrlPart {
    fn from(s: String) -> Self {
        UrlPart::Segment(s)
    }
}

macro_rules! segment_from_number {
    ($($t:ty),*) => {
        $(impl From<$t> for UrlPart {
            fn from(n: $t) -> Self {
                UrlPart::Segment(n.to_string())
            }
        })*
    };
}

segment_from_number!(i32, i64, u32, u64, usize);

/// Append `parts` to `base`.
pub fn build_path<I>(base: &str, parts: I) -> String
where
    I: IntoIterator<Item = UrlPart>,
{
    let mut segments = Vec::new();
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut has_query = false;

    for part in parts {
        match part {
            UrlPart::Segment(s) => {
                let s = s.trim_matches('/');
                if !s.is_empty() {
                    segments.push(s.to_string());
                }
            }
            UrlPart::Query(p) => {
                query.append_pair(&p.name, &p.value);
                has_query = true;
            }
        }
    }

    let mut path = base.to_string();
    if !segments.is_empty() {
        let trimmed = path.trim_end_matches('/').len();
        path.truncate(trimmed);
        for segment in segments {
            path.push('/');
            path.push_str(&segment);
        }
    }
    if has_query {
        path.push(if path.contains('?') { '&' } else { '?' });
        path.push_str(&query.finish());
    }
    path
}

/// Reduce `target` to a same-origin path.
///
/// Absolute and scheme-relative URLs lose their scheme, host and fragment;
/// relative URLs pass through.
pub fn safe_redirect_path(target: &str) -> String {
    if target.is_empty() {
        return "/".to_string();
    }

    let safe = match Url::parse(target) {
        Ok(url) => path_of(&url),
        Err(url::ParseError::RelativeUrlWithoutBase) if is_scheme_relative(target) => {
            match Url::parse(&format!("http:{}", target)) {
                Ok(url) => path_of(&url),
                Err(_) => "/".to_string(),
            }
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => target.to_string(),
        Err(_) => "/".to_string(),
    };

    collapse_leading_slashes(safe)
}

fn is_scheme_relative(target: &str) -> bool {
    let mut chars = target.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

fn path_of(url: &Url) -> String {
    if url.cannot_be_a_base() {
        return "/".to_string();
    }
    let mut path = match url.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    path
}

// "//host" and "/\host" are read as a host by browsers.
fn collapse_leading_slashes(path: String) -> String {
    if !is_scheme_relative(&path) {
        return path;
    }
    let rest = path.trim_start_matches(['/', '\\']);
    format!("/{}", rest)
}

/// Target for "go back": referer, then fallback, then the current URI.
pub fn back_target(referer: Option<&str>, fallback: &str, request_uri: &str) -> String {
    [referer.unwrap_or_default(), fallback, request_uri]
        .into_iter()
        .find(|u| !u.is_empty())
        .unwrap_or("/")
        .to_string()
}

/// Status of a redirect: explicit override, else 303 for POST and 302 otherwise.
pub fn redirect_status(method: &Method, explicit: Option<StatusCode>) -> StatusCode {
    explicit.unwrap_or(if method == Method::POST {
        StatusCode::SEE_OTHER
    } else {
        StatusCode::FOUND
    })
}
