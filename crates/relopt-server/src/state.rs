//! # Application State
//!
//! This module defines the shared state that is available to all HTTP request handlers.
//! The state is created once at server startup and shared via `Arc` across all
//! concurrent requests.
//!
//! ## Components
//!
//! - **Optimizer**: The default rule batch with the configured iteration limit.
//!   Shared (not rebuilt per request) because rules are stateless.
//! - **Catalog**: Table schemas and row counts used when a request does not
//!   bring its own. Populated with the demo tables `ventas`, `empleados` and
//!   `tiendas`.
//! - **Server Config**: Listen address and planner settings, read from the
//!   environment.

use relopt_core::catalog::InMemoryCatalog;
use relopt_core::expr::DataType;
use relopt_core::optimizer::Optimizer;
use relopt_rules::execution::PlannerConfig;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Server settings.
///
/// | variable | setting |
/// |---|---|
/// | `RELOPT_ADDR` | listen address |
/// | `RELOPT_MAX_ITERATIONS` | optimizer iteration limit |
/// | `RELOPT_BROADCAST_THRESHOLD` | broadcast join threshold, in rows |
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: String,
    pub planner: PlannerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            planner: PlannerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup. Unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup("RELOPT_ADDR") {
            config.addr = addr;
        }
        if let Some(raw) = lookup("RELOPT_MAX_ITERATIONS") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => config.planner.optimizer.max_iterations = n,
                _ => warn!(value = %raw, "ignoring invalid RELOPT_MAX_ITERATIONS"),
            }
        }
        if let Some(raw) = lookup("RELOPT_BROADCAST_THRESHOLD") {
            match raw.parse::<f64>() {
                Ok(rows) if rows.is_finite() && rows >= 0.0 => {
                    config.planner.physical.broadcast_threshold_rows = rows;
                }
                _ => warn!(value = %raw, "ignoring invalid RELOPT_BROADCAST_THRESHOLD"),
            }
        }
        config
    }
}

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    pub optimizer: Optimizer,
    /// Catalog and statistics for requests without their own.
    pub catalog: Arc<InMemoryCatalog>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let optimizer = Optimizer::with_config(relopt_rules::default_rule_set(), config.planner.optimizer.clone());
        Self {
            optimizer,
            catalog: Arc::new(demo_catalog()),
            config,
        }
    }
}

fn demo_catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog
        .add_table(
            "ventas",
            &[
                ("MONTO", DataType::Int64),
                ("FECHA", DataType::Date),
                ("TIENDA", DataType::Utf8),
                ("PRODUCTO", DataType::Utf8),
            ],
        )
        .add_table(
            "empleados",
            &[
                ("id", DataType::Int64),
                ("nombre", DataType::Utf8),
                ("salario", DataType::Float64),
                ("depto", DataType::Utf8),
            ],
        )
        .add_table("tiendas", &[("TIENDA", DataType::Utf8), ("CIUDAD", DataType::Utf8)])
        .set_row_count("ventas", 1_000_000.0)
        .set_row_count("empleados", 200.0)
        .set_row_count("tiendas", 50.0);
    catalog
}
