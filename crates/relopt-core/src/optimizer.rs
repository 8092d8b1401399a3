//! # Fixed-Point Optimizer
//!
//! The optimizer owns an ordered batch of rules. One *iteration* applies every
//! rule once, in order, each to the output of the previous one. Iterations
//! repeat until the plan after an iteration is structurally equal to the plan
//! before it (a fixed point).
//!
//! ## Termination
//!
//! Rules are written not to undo each other, but the driver doesn't rely on
//! it. After `max_iterations` passes it stops, logs a warning and returns the
//! current plan. Reaching the cap is not an error: every intermediate plan is
//! equivalent to the input.
//!
//! ## Idempotence
//!
//! The returned plan is a fixed point of the batch whenever
//! `reached_fixpoint` is set, so optimizing it again performs one iteration
//! and returns it unchanged.

use crate::catalog::StatisticsProvider;
use crate::error::SchemaError;
use crate::plan::LogicalPlan;
use crate::rule::{OptContext, OptimizationRule};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on full passes over the rule batch.
    pub max_iterations: usize,
    /// Record the plan after every effective rule application.
    pub enable_trace: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_trace: false,
        }
    }
}

/// One effective rule application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTrace {
    pub iteration: usize,
    pub rule: String,
    /// Plan after the rule, rendered with `display_indent`.
    pub plan: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedPlan {
    pub plan: LogicalPlan,
    /// Number of passes over the rule batch, including the final one that
    /// changed nothing.
    pub iterations: usize,
    /// Number of rule applications that changed the plan.
    pub rules_applied: usize,
    pub reached_fixpoint: bool,
    /// Empty unless `enable_trace` is set.
    pub trace: Vec<RuleTrace>,
}

pub struct Optimizer {
    rules: Vec<Box<dyn OptimizationRule>>,
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self::with_config(rules, OptimizerConfig::default())
    }

    pub fn with_config(rules: Vec<Box<dyn OptimizationRule>>, config: OptimizerConfig) -> Self {
        Self { rules, config }
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn OptimizationRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize `plan` to a fixed point of the rule batch.
    ///
    /// `plan` must be the output of the analyzer. Rules fail only when they
    /// meet a malformed tree, so an `Err` here is an internal invariant
    /// violation, not a problem with the user's query. Hitting the iteration
    /// limit is not an error; see [`OptimizedPlan::reached_fixpoint`].
    pub fn optimize(
        &self,
        plan: LogicalPlan,
        stats: Option<&dyn StatisticsProvider>,
    ) -> Result<OptimizedPlan, SchemaError> {
        let ctx = OptContext::new(stats);
        let mut current = plan;
        let mut iterations = 0;
        let mut rules_applied = 0;
        let mut trace = Vec::new();
        let mut reached_fixpoint = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let before = current.clone();

            for rule in &self.rules {
                let result = rule.apply(current, &ctx)?;
                current = result.plan;
                if result.changed {
                    rules_applied += 1;
                    debug!(rule = rule.name(), iteration = iterations, "rule applied");
                    if self.config.enable_trace {
                        trace.push(RuleTrace {
                            iteration: iterations,
                            rule: rule.name().to_string(),
                            plan: current.display_indent(),
                        });
                    }
                } else {
                    trace!(rule = rule.name(), iteration = iterations, "rule not applicable");
                }
            }

            if current == before {
                reached_fixpoint = true;
                break;
            }
        }

        if reached_fixpoint {
            debug!(iterations, rules_applied, "optimizer reached fixed point");
        } else {
            warn!(
                max_iterations = self.config.max_iterations,
                rules_applied, "optimizer hit the iteration limit before reaching a fixed point"
            );
        }

        Ok(OptimizedPlan {
            plan: current,
            iterations,
            rules_applied,
            reached_fixpoint,
            trace,
        })
    }
}
