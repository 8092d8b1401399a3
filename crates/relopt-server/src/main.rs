//! # relopt-server: HTTP Service for the Query Planner
//!
//! This binary crate exposes the planning pipeline (analysis, fixed-point
//! logical optimization, physical planning) as a JSON service.
//!
//! ## Architecture
//!
//! ```text
//! client
//!   |
//!   | HTTP POST /explain or /plan (raw logical plan JSON, optional catalog)
//!   v
//! relopt-server (this binary)
//!   |
//!   +-> Analyzer (resolve names and types against the catalog)
//!   +-> Optimizer (rule batch to a fixed point)
//!   +-> Physical planner (scan / join / aggregate selection)
//!   |
//!   | HTTP response (explain text or physical plan JSON)
//!   v
//! client
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`   - Health check
//! - `GET  /rules`    - List the optimization rules in application order
//! - `POST /explain`  - Parsed, analyzed, optimized and physical plans as text
//! - `POST /plan`     - Optimized logical plan and physical plan as JSON
//!
//! ## Configuration
//!
//! See [`state::ServerConfig`] for the environment variables. Logging is
//! controlled by the `RUST_LOG` environment variable (defaults to
//! `relopt=debug`).

mod error;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "relopt=debug";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = state::ServerConfig::from_env();
    let addr = config.addr.clone();
    let state = Arc::new(state::AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/rules", get(routes::list_rules))
        .route("/explain", post(routes::explain))
        .route("/plan", post(routes::plan))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("relopt-server listening on http://{addr}");
    axum::serve(listener, app).await
}
