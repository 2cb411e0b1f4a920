//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the application router with middleware (trace, request ID, timeout)
//! - Bind to a listener and serve until ctrl-c
//! - Provide `page`, the axum adapter from a reply handler to a route

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::App;
use crate::config::ListenerConfig;
use crate::http::context::RequestContext;
use crate::http::dispatch::serve;
use crate::http::reply::Reply;

/// HTTP server for a stagehand application.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Wrap `routes` with the standard middleware stack.
    pub fn new(routes: Router, config: &ListenerConfig) -> Self {
        Self {
            router: Self::build_router(routes, config),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(routes: Router, config: &ListenerConfig) -> Router {
        routes
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

type PageFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Adapt a reply handler into an axum handler bound to `app`.
///
/// ```ignore
/// Router::new().route("/", get(page(app.clone(), |ctx| ctx.view("index", &data))))
/// ```
pub fn page<F>(app: Arc<App>, handler: F) -> impl Fn(Request<Body>) -> PageFuture + Clone + Send + Sync + 'static
where
    F: Fn(&mut RequestContext) -> Reply + Clone + Send + Sync + 'static,
{
    move |request: Request<Body>| {
        let app = app.clone();
        let handler = handler.clone();
        Box::pin(async move { serve(app, request, handler) }) as PageFuture
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}
