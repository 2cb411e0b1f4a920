//! Stagehand demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ HttpServer (trace, request id, timeout)
//!                         │
//!                         ▼
//!                     page(app, handler) ──▶ RequestContext ──▶ Reply
//!                                                                 │
//!                                 Templates ◀── view ─────────────┤
//!                                 RouteTable ◀── redirect_to ─────┤
//!                                                                 ▼
//!     Client Response ◀───────────────────────────── dispatch::finish
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use stagehand::config::{load_config, ServerConfig};
use stagehand::http::page;
use stagehand::observability::{logging, metrics};
use stagehand::{App, HttpServer};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Demo server for stagehand replies and templates", long_about = None)]
struct Args {
    /// Server configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("stagehand v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = build_app(&config)?;
    tracing::info!(
        routes = app.routes().len(),
        templates = ?app.templates().names(),
        "Application configured"
    );

    let server = HttpServer::new(demo_routes(app), &config.listener);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_app(config: &ServerConfig) -> stagehand::Result<Arc<App>> {
    let mut builder = App::builder();
    builder.routes(config.routes.iter().collect());
    if !config.templates.config_path.is_empty() {
        builder
            .template()
            .parse_config_file(&config.templates.config_path)?;
    }
    Ok(builder.build())
}

fn demo_routes(app: Arc<App>) -> Router {
    let has_index = app.templates().contains("index");

    Router::new()
        .route(
            "/",
            get(page(app.clone(), move |ctx| {
                if has_index {
                    ctx.view("index", &json!({ "Title": "stagehand", "Items": ["replies", "templates"] }))
                } else {
                    ctx.string("stagehand")
                }
            })),
        )
        .route("/json", get(page(app.clone(), |ctx| ctx.json(&json!({ "ok": true })))))
        .route(
            "/back",
            get(page(app.clone(), |ctx| ctx.safe_redirect_back("/"))),
        )
        .route("/submit", post(page(app.clone(), |ctx| ctx.redirect_back_to_get())))
        .route("/empty", get(page(app.clone(), |ctx| ctx.no_content())))
        .fallback(page(app, |ctx| ctx.not_found()))
}
