//! # Physical Planner
//!
//! Translates an optimized logical plan into the physical plan handed to an
//! external executor. The translation is structural, one physical node per
//! logical node, with these exceptions:
//!
//! - A filter directly above a scan keeps only its residual predicate (see
//!   [`residual_predicate`]) and disappears when nothing is left.
//! - `SubqueryAlias` produces no node.
//!
//! Every expression is bound to column ordinals of the logical schema its
//! node reads. Physical nodes keep the column order of their logical
//! counterparts, so the ordinals are valid for the physical inputs too.
//!
//! Planning is deterministic and fails only for a plan that would not pass
//! [`LogicalPlan::check_references`].

use crate::impl_agg::implement_aggregate;
use crate::impl_join::choose_join_strategy;
use crate::impl_scan::{implement_scan, residual_predicate};
use relopt_core::catalog::StatisticsProvider;
use relopt_core::error::SchemaError;
use relopt_core::physical::{bind_expr, PhysicalPlan};
use relopt_core::plan::LogicalPlan;
use relopt_core::stats::estimate_plan_statistics;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalPlannerConfig {
    /// A join side below this estimated row count may be broadcast.
    pub broadcast_threshold_rows: f64,
    /// Treat pushed filters as exact, dropping them from the residual filter.
    pub trust_pushed_filters: bool,
}

impl Default for PhysicalPlannerConfig {
    fn default() -> Self {
        Self {
            broadcast_threshold_rows: 10_000.0,
            trust_pushed_filters: false,
        }
    }
}

pub struct PhysicalPlanner<'a> {
    config: PhysicalPlannerConfig,
    stats: Option<&'a dyn StatisticsProvider>,
}

impl<'a> PhysicalPlanner<'a> {
    pub fn new(config: PhysicalPlannerConfig, stats: Option<&'a dyn StatisticsProvider>) -> Self {
        Self { config, stats }
    }

    pub fn config(&self) -> &PhysicalPlannerConfig {
        &self.config
    }

    pub fn plan(&self, plan: &LogicalPlan) -> Result<PhysicalPlan, SchemaError> {
        match plan {
            LogicalPlan::Scan(scan) => implement_scan(scan),
            LogicalPlan::Filter { input, predicate } => {
                let residual = match input.as_ref() {
                    LogicalPlan::Scan(scan) => {
                        residual_predicate(predicate, &scan.pushed_filters, self.config.trust_pushed_filters)
                    }
                    _ => Some(predicate.clone()),
                };
                let child = self.plan(input)?;
                match residual {
                    Some(residual) => Ok(PhysicalPlan::FilterExec {
                        predicate: bind_expr(&residual, &input.schema()?)?,
                        input: Box::new(child),
                    }),
                    None => Ok(child),
                }
            }
            LogicalPlan::Project { input, exprs } => {
                let input_schema = input.schema()?;
                let exprs = exprs
                    .iter()
                    .map(|e| bind_expr(e, &input_schema))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PhysicalPlan::ProjectExec {
                    input: Box::new(self.plan(input)?),
                    exprs,
                    schema: plan.schema()?,
                })
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let combined = left.schema()?.join(&right.schema()?);
                let condition = condition.as_ref().map(|c| bind_expr(c, &combined)).transpose()?;
                let strategy = choose_join_strategy(
                    *join_type,
                    self.estimate_rows(left),
                    self.estimate_rows(right),
                    self.config.broadcast_threshold_rows,
                );
                debug!(%join_type, ?strategy, "selected join strategy");
                Ok(PhysicalPlan::JoinExec {
                    left: Box::new(self.plan(left)?),
                    right: Box::new(self.plan(right)?),
                    join_type: *join_type,
                    condition,
                    strategy,
                })
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => implement_aggregate(
                self.plan(input)?,
                &input.schema()?,
                group_by,
                aggregates,
                plan.schema()?,
            ),
            LogicalPlan::SubqueryAlias { input, .. } => self.plan(input),
            LogicalPlan::Empty { schema } => Ok(PhysicalPlan::EmptyExec { schema: schema.clone() }),
        }
    }

    fn estimate_rows(&self, plan: &LogicalPlan) -> Option<f64> {
        self.stats
            .and_then(|stats| estimate_plan_statistics(plan, stats))
            .map(|s| s.row_count)
    }
}

/// Plan `plan` with the given statistics and configuration.
pub fn plan_physical(
    plan: &LogicalPlan,
    stats: Option<&dyn StatisticsProvider>,
    config: &PhysicalPlannerConfig,
) -> Result<PhysicalPlan, SchemaError> {
    PhysicalPlanner::new(config.clone(), stats).plan(plan)
}
