//! # HTTP Route Handlers
//!
//! This module defines the Axum route handlers for the planner service.
//!
//! ## Planning Pipeline
//!
//! `POST /explain` and `POST /plan` share `run_pipeline`:
//!
//! 1. **Catalog**: Use the catalog sent with the request, or the server's demo
//!    catalog when none is sent.
//! 2. **Analyze**: Resolve the raw plan against the catalog.
//! 3. **Optimize**: Run the shared rule batch to a fixed point.
//! 4. **Plan**: Translate to a physical plan.
//!
//! ## Error Handling
//!
//! Failures are [`ApiError`]s, rendered as a status code and a JSON body:
//! - 400 Bad Request: the plan does not analyze (unknown table or column, type
//!   mismatch, ambiguity, misplaced aggregate)
//! - 500 Internal Server Error: a malformed tree found after analysis

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use relopt_core::catalog::InMemoryCatalog;
use relopt_core::expr::DataType;
use relopt_core::physical::PhysicalPlan;
use relopt_core::plan::LogicalPlan;
use relopt_rules::execution::QueryExecution;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /rules - list the rule batch in application order.
pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules: Vec<RuleInfo> = state
        .optimizer
        .rules()
        .map(|r| RuleInfo {
            name: r.name().to_string(),
            description: r.description().to_string(),
        })
        .collect();

    Json(RulesResponse {
        rules,
        max_iterations: state.optimizer.config().max_iterations,
    })
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleInfo>,
    pub max_iterations: usize,
}

#[derive(Serialize)]
pub struct RuleInfo {
    pub name: String,
    pub description: String,
}

/// Request body for `POST /explain` and `POST /plan`.
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    /// Tables to plan against. Defaults to the server's demo catalog.
    #[serde(default)]
    pub catalog: Option<Vec<TableSpec>>,
    /// Raw logical plan.
    pub plan: LogicalPlan,
}

#[derive(Debug, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    /// Row-count estimate. Tables without one disable join reordering.
    #[serde(default)]
    pub row_count: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
}

/// POST /explain - every planning stage rendered as text.
pub async fn explain(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let qe = run_pipeline(&state, req)?;
    Ok(Json(ExplainResponse {
        explain: qe.explain_extended(),
        parsed: qe.parsed.display_indent(),
        analyzed: qe.analyzed.plan.display_indent(),
        optimized: qe.optimized.plan.display_indent(),
        physical: qe.physical.display_indent(),
        iterations: qe.optimized.iterations,
        rules_applied: qe.optimized.rules_applied,
        reached_fixpoint: qe.optimized.reached_fixpoint,
    }))
}

#[derive(Serialize)]
pub struct ExplainResponse {
    pub explain: String,
    pub parsed: String,
    pub analyzed: String,
    pub optimized: String,
    pub physical: String,
    pub iterations: usize,
    pub rules_applied: usize,
    pub reached_fixpoint: bool,
}

/// POST /plan - the physical plan as JSON, for an executor.
pub async fn plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let qe = run_pipeline(&state, req)?;
    Ok(Json(PlanResponse {
        physical: qe.physical,
        optimized: qe.optimized.plan,
    }))
}

#[derive(Serialize)]
pub struct PlanResponse {
    pub physical: PhysicalPlan,
    pub optimized: LogicalPlan,
}

fn build_catalog(tables: &[TableSpec]) -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    for table in tables {
        let columns: Vec<(&str, DataType)> = table.columns.iter().map(|c| (c.name.as_str(), c.data_type)).collect();
        catalog.add_table(table.name.clone(), &columns);
        if let Some(rows) = table.row_count {
            catalog.set_row_count(table.name.clone(), rows);
        }
    }
    catalog
}

/// Core planning logic shared between the explain and plan endpoints.
fn run_pipeline(state: &AppState, req: PlanRequest) -> Result<QueryExecution, ApiError> {
    let request_catalog = req.catalog.as_deref().map(build_catalog);
    let catalog = request_catalog.as_ref().unwrap_or(state.catalog.as_ref());
    debug!(tables = catalog.table_names().len(), "planning request");

    let qe = QueryExecution::with_optimizer(
        req.plan,
        catalog,
        Some(catalog),
        &state.optimizer,
        &state.config.planner.physical,
    )?;
    Ok(qe)
}
