//! # Constant Folding Rule
//!
//! Evaluates every column-free subexpression at planning time and uses the
//! results to simplify the plan:
//!
//! - `Filter(c, true)` becomes `c`.
//! - `Filter(c, false)` and `Filter(c, null)` become an empty relation with
//!   the schema of `c`. A null predicate rejects every row.
//! - An inner join whose condition folds to `false` or `null` is empty.
//! - Emptiness propagates upward through filters, projections, aliases,
//!   joins that need rows from the empty side, and grouped aggregates. A
//!   global aggregate over no rows still produces one row, so it stops the
//!   propagation.
//!
//! Folding keeps output names stable: an unnamed projection or aggregate
//! expression that folds is aliased to its original name.

use relopt_core::error::SchemaError;
use relopt_core::expr::{Expr, ScalarValue};
use relopt_core::plan::{JoinType, LogicalPlan};
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use tracing::trace;

pub struct ConstantFoldingRule;

impl OptimizationRule for ConstantFoldingRule {
    fn name(&self) -> &'static str {
        "ConstantFolding"
    }

    fn description(&self) -> &'static str {
        "Fold constant expressions, drop always-true filters and prune always-empty subtrees"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let original = plan.clone();
        let folded = plan.transform_up(&mut fold_node)?;
        Ok(Transformed::compare(&original, folded))
    }
}

/// Fold an expression that names an output column.
fn fold_named(expr: Expr) -> Expr {
    let folded = expr.fold();
    if folded == expr || matches!(expr, Expr::Alias { .. } | Expr::Column(_)) {
        folded
    } else {
        let name = expr.output_name();
        folded.alias(name)
    }
}

fn is_false_or_null(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(ScalarValue::Bool(false) | ScalarValue::Null))
}

fn empty_like(node: &LogicalPlan) -> Result<LogicalPlan, SchemaError> {
    Ok(LogicalPlan::Empty { schema: node.schema()? })
}

fn fold_node(node: LogicalPlan) -> Result<LogicalPlan, SchemaError> {
    let node = match node {
        LogicalPlan::Project { input, exprs } => LogicalPlan::Project {
            input,
            exprs: exprs.into_iter().map(fold_named).collect(),
        },
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } => LogicalPlan::Aggregate {
            input,
            group_by: group_by.into_iter().map(fold_named).collect(),
            aggregates: aggregates.into_iter().map(fold_named).collect(),
        },
        other => other.map_expressions(|e| e.fold()),
    };

    match node {
        LogicalPlan::Filter { input, predicate } => {
            if input.is_empty_relation() {
                return Ok(*input);
            }
            match predicate.as_bool_literal() {
                Some(true) => {
                    trace!("removing always-true filter");
                    Ok(*input)
                }
                _ if is_false_or_null(&predicate) => {
                    trace!(%predicate, "filter rejects every row");
                    Ok(LogicalPlan::Empty { schema: input.schema()? })
                }
                _ => Ok(LogicalPlan::Filter { input, predicate }),
            }
        }
        LogicalPlan::Project { ref input, .. } | LogicalPlan::SubqueryAlias { ref input, .. }
            if input.is_empty_relation() =>
        {
            empty_like(&node)
        }
        LogicalPlan::Aggregate {
            ref input,
            ref group_by,
            ..
        } if input.is_empty_relation() && !group_by.is_empty() => empty_like(&node),
        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let (l, r) = (left.is_empty_relation(), right.is_empty_relation());
            let never_matches = condition.as_ref().is_some_and(is_false_or_null);
            let empty = match join_type {
                JoinType::Inner | JoinType::Semi => l || r || never_matches,
                JoinType::Cross => l || r,
                JoinType::Left | JoinType::Anti => l,
                JoinType::Right => r,
                JoinType::Full => l && r,
            };
            let condition = match (join_type, condition) {
                (JoinType::Inner, Some(c)) if c.as_bool_literal() == Some(true) => None,
                (_, c) => c,
            };
            let join = LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            };
            if empty {
                trace!(%join_type, "join produces no rows");
                empty_like(&join)
            } else {
                Ok(join)
            }
        }
        other => Ok(other),
    }
}
