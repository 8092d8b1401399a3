//! # Query Execution Pipeline
//!
//! [`QueryExecution`] runs a raw plan through every planning stage and keeps
//! the result of each one:
//!
//! ```text
//! parsed --analyze--> analyzed --optimize--> optimized --plan--> physical
//! ```
//!
//! Analysis errors stop the pipeline before optimization. Reaching the
//! optimizer's iteration limit does not; the best plan so far is planned
//! physically and the limit shows in [`OptimizedPlan::reached_fixpoint`].

use crate::default_rule_set;
use crate::physical_planner::{plan_physical, PhysicalPlannerConfig};
use relopt_core::analyzer::analyze;
use relopt_core::catalog::{Catalog, StatisticsProvider};
use relopt_core::optimizer::{OptimizedPlan, Optimizer, OptimizerConfig};
use relopt_core::physical::PhysicalPlan;
use relopt_core::plan::{AnalyzedPlan, LogicalPlan};
use relopt_core::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings for every planning stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub optimizer: OptimizerConfig,
    pub physical: PhysicalPlannerConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryExecution {
    pub parsed: LogicalPlan,
    pub analyzed: AnalyzedPlan,
    pub optimized: OptimizedPlan,
    pub physical: PhysicalPlan,
}

impl QueryExecution {
    /// Plan `parsed` with the default rule set.
    pub fn new(
        parsed: LogicalPlan,
        catalog: &dyn Catalog,
        stats: Option<&dyn StatisticsProvider>,
        config: &PlannerConfig,
    ) -> Result<Self> {
        let optimizer = Optimizer::with_config(default_rule_set(), config.optimizer.clone());
        Self::with_optimizer(parsed, catalog, stats, &optimizer, &config.physical)
    }

    pub fn with_optimizer(
        parsed: LogicalPlan,
        catalog: &dyn Catalog,
        stats: Option<&dyn StatisticsProvider>,
        optimizer: &Optimizer,
        physical_config: &PhysicalPlannerConfig,
    ) -> Result<Self> {
        let analyzed = analyze(&parsed, catalog)?;
        let optimized = optimizer.optimize(analyzed.plan.clone(), stats)?;
        let physical = plan_physical(&optimized.plan, stats, physical_config)?;
        info!(
            iterations = optimized.iterations,
            rules_applied = optimized.rules_applied,
            fixpoint = optimized.reached_fixpoint,
            "planned query"
        );
        Ok(Self {
            parsed,
            analyzed,
            optimized,
            physical,
        })
    }

    /// The physical plan only.
    pub fn explain(&self) -> String {
        format!("== Physical Plan ==\n{}", self.physical.display_indent())
    }

    /// All four stages.
    pub fn explain_extended(&self) -> String {
        format!(
            "== Parsed Logical Plan ==\n{}\n\
             == Analyzed Logical Plan ==\n{}\n{}\n\
             == Optimized Logical Plan ==\n{}\n\
             == Physical Plan ==\n{}",
            self.parsed.display_indent(),
            self.analyzed.schema,
            self.analyzed.plan.display_indent(),
            self.optimized.plan.display_indent(),
            self.physical.display_indent()
        )
    }
}
