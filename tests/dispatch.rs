//! End-to-end dispatch through the layered router and the severity policy.

use std::io;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE, LOCATION, REFERER};
use axum::http::request::Parts;
use axum::http::{Method, Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use stagehand::config::ListenerConfig;
use stagehand::http::{finish, page, ResponseRecorder, ResponseWriter};
use stagehand::{App, HttpServer};
use tower::ServiceExt;

fn app() -> Arc<App> {
    let mut builder = App::builder();
    builder.route("home", "/");
    builder
        .template()
        .dir("tests/testdata/template")
        .parse_files("hello", ["hello.tmpl"])
        .unwrap()
        .parse("broken", r#"<div class="{{.}}"#)
        .unwrap()
        .minify(true);
    builder.build()
}

fn router(app: Arc<App>) -> Router {
    let routes = Router::new()
        .route("/", get(page(app.clone(), |ctx| ctx.view("hello", &json!({"Name": "Ann"})))))
        .route("/broken", get(page(app.clone(), |ctx| ctx.view("broken", "x"))))
        .route("/submit", post(page(app.clone(), |ctx| ctx.redirect_back_to_get())))
        .route("/home", get(page(app.clone(), |ctx| ctx.redirect_to("home", []))))
        .fallback(page(app, |ctx| ctx.not_found()));
    HttpServer::new(routes, &ListenerConfig::default()).router()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_view_through_router() {
    let response = router(app())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");
    assert_eq!(body_string(response).await, "<p>Hello, Ann!</p>");
}

#[tokio::test]
async fn test_fallback_not_found() {
    let response = router(app())
        .oneshot(Request::builder().uri("/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "404 page not found\n");
}

#[tokio::test]
async fn test_post_redirects_back_with_see_other() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/submit")
        .header(REFERER, "/form")
        .body(Body::empty())
        .unwrap();
    let response = router(app()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/form");
    assert_eq!(body_string(response).await, "");
}

#[tokio::test]
async fn test_named_route_redirect() {
    let response = router(app())
        .oneshot(Request::builder().uri("/home").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[LOCATION], "/");
}

#[tokio::test]
async fn test_minify_failure_becomes_internal_error() {
    let response = router(app())
        .oneshot(Request::builder().uri("/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(body_string(response).await, "Internal Server Error\n");
}

#[test]
fn test_internal_error_keeps_hook_content_type() {
    let mut builder = App::builder();
    builder
        .template()
        .minify(true)
        .parse("broken", r#"<div class="{{.}}"#)
        .unwrap();
    builder.before_render(|w: &mut dyn ResponseWriter, _request: &Parts, render| {
        w.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/xhtml+xml"));
        render(w)
    });
    let ctx = builder.build().context(request_parts());

    let mut w = ResponseRecorder::new();
    finish(ctx.view("broken", "x"), &mut w);
    assert_eq!(w.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(w.header("content-type"), Some("application/xhtml+xml"));
    assert_eq!(w.body_string(), "Internal Server Error\n");
}

fn request_parts() -> Parts {
    Request::builder().uri("/").body(()).unwrap().into_parts().0
}

#[test]
#[should_panic(expected = "template missing not found")]
fn test_fatal_error_panics() {
    let ctx = app().context(request_parts());
    let mut w = ResponseRecorder::new();
    finish(ctx.view("missing", &json!(null)), &mut w);
}

#[test]
#[should_panic(expected = "route nowhere not found")]
fn test_unknown_route_panics() {
    let ctx = app().context(request_parts());
    let mut w = ResponseRecorder::new();
    finish(ctx.redirect_to("nowhere", []), &mut w);
}

// Accepts headers and status, then fails every body write like a closed socket.
#[derive(Default)]
struct HungUp {
    headers: HeaderMap,
    status: Option<StatusCode>,
}

impl io::Write for HungUp {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for HungUp {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

#[test]
fn test_disconnect_is_ignored() {
    let app = app();
    let ctx = app.context(request_parts());

    let mut w = HungUp::default();
    finish(ctx.string("lost"), &mut w);
    assert_eq!(w.status, Some(StatusCode::OK));

    let mut w = HungUp::default();
    finish(ctx.view("hello", &json!({"Name": "Ann"})), &mut w);
    assert_eq!(w.status, Some(StatusCode::OK));
}
