//! # Rule System
//!
//! An [`OptimizationRule`] is a stateless rewrite of a whole logical plan. The
//! [`Optimizer`](crate::optimizer::Optimizer) applies an ordered batch of rules
//! repeatedly until a full pass leaves the plan unchanged, so a rule only has
//! to make progress on the patterns it recognizes. It never has to anticipate
//! what other rules will expose later.
//!
//! ## Contract
//!
//! - `apply` must be deterministic and must return the plan unchanged (with
//!   `changed == false`) once its patterns no longer occur.
//! - Rewrites must preserve the plan's result rows and its output field names
//!   and types, in order. Qualifiers may change when an alias is removed.
//! - A rule fails only when the input tree is malformed; the error is the
//!   [`SchemaError`] found while inspecting it.

use crate::catalog::StatisticsProvider;
use crate::error::SchemaError;
use crate::plan::LogicalPlan;

/// Context passed to rules during application.
#[derive(Clone, Copy, Default)]
pub struct OptContext<'a> {
    /// Table estimates. Rules that depend on statistics are no-ops without it.
    pub stats: Option<&'a dyn StatisticsProvider>,
}

impl<'a> OptContext<'a> {
    pub fn new(stats: Option<&'a dyn StatisticsProvider>) -> Self {
        Self { stats }
    }
}

/// Result of applying a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub plan: LogicalPlan,
    pub changed: bool,
}

impl Transformed {
    pub fn yes(plan: LogicalPlan) -> Self {
        Self { plan, changed: true }
    }

    pub fn no(plan: LogicalPlan) -> Self {
        Self { plan, changed: false }
    }

    /// `changed` is set iff `plan` differs structurally from `original`.
    pub fn compare(original: &LogicalPlan, plan: LogicalPlan) -> Self {
        let changed = *original != plan;
        Self { plan, changed }
    }
}

/// A logical rewrite rule.
pub trait OptimizationRule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &'static str;

    /// One-line description, shown by the HTTP service.
    fn description(&self) -> &'static str {
        ""
    }

    fn apply(&self, plan: LogicalPlan, ctx: &OptContext<'_>) -> Result<Transformed, SchemaError>;
}
