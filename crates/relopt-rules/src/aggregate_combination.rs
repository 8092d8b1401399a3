//! # Aggregate Combination Rule
//!
//! ```text
//! Aggregate(Aggregate(c, k, a1), k', a2)  ->  Aggregate(c, k, a2')
//! ```
//!
//! Applies when the outer aggregate groups by exactly the inner grouping keys,
//! in order. The inner keys are unique per inner row, so every outer group
//! holds a single inner row and `MIN`, `MAX`, `SUM` and `AVG` of an inner
//! output are that output itself. Each outer aggregate is replaced by the
//! inner expression it reads, renamed to the outer output name.
//!
//! `MIN` and `MAX` may also read a grouping key. The merge is abandoned when
//! the combined node would change the output schema, e.g. `AVG` over an
//! integer inner sum.

use relopt_core::error::SchemaError;
use relopt_core::expr::{AggFunc, Expr};
use relopt_core::plan::LogicalPlan;
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use relopt_core::schema::Schema;
use tracing::trace;

pub struct AggregateCombinationRule;

impl OptimizationRule for AggregateCombinationRule {
    fn name(&self) -> &'static str {
        "AggregateCombination"
    }

    fn description(&self) -> &'static str {
        "Merge an aggregate over another aggregate with the same grouping keys"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let original = plan.clone();
        let combined = plan.transform_up(&mut |node| match node {
            LogicalPlan::Aggregate { ref input, .. } if matches!(input.as_ref(), LogicalPlan::Aggregate { .. }) => {
                Ok::<_, SchemaError>(merge(&node)?.unwrap_or(node))
            }
            other => Ok(other),
        })?;
        Ok(Transformed::compare(&original, combined))
    }
}

fn merge(outer: &LogicalPlan) -> Result<Option<LogicalPlan>, SchemaError> {
    let LogicalPlan::Aggregate {
        input,
        group_by,
        aggregates,
    } = outer
    else {
        return Ok(None);
    };
    let LogicalPlan::Aggregate {
        input: child,
        group_by: keys,
        aggregates: inner_aggregates,
    } = input.as_ref()
    else {
        return Ok(None);
    };

    let inner_schema = input.schema()?;
    let same_keys = group_by.len() == keys.len()
        && group_by
            .iter()
            .zip(&inner_schema.fields)
            .all(|(g, f)| matches!(g, Expr::Column(c) if *c == f.column()));
    if !same_keys {
        return Ok(None);
    }

    let mut merged_aggregates = Vec::with_capacity(aggregates.len());
    for agg in aggregates {
        match merge_expr(agg, &inner_schema, keys, inner_aggregates) {
            Some(e) => merged_aggregates.push(e),
            None => {
                trace!(%agg, "aggregate cannot be merged");
                return Ok(None);
            }
        }
    }

    let merged = LogicalPlan::Aggregate {
        input: child.clone(),
        group_by: keys.clone(),
        aggregates: merged_aggregates,
    };
    match (outer.schema(), merged.schema()) {
        (Ok(before), Ok(after)) if before == after => {
            trace!("combined adjacent aggregates");
            Ok(Some(merged))
        }
        _ => Ok(None),
    }
}

/// Rewrite one outer aggregate expression in terms of the inner node's input.
fn merge_expr(agg: &Expr, inner_schema: &Schema, keys: &[Expr], inner_aggregates: &[Expr]) -> Option<Expr> {
    let name = agg.output_name();
    match agg.unalias() {
        // A bare grouping key passes through.
        Expr::Column(c) => {
            let key = keys.get(inner_schema.index_of(c).ok()?)?;
            if matches!(agg, Expr::Alias { .. }) {
                Some(key.unalias().clone().alias(name))
            } else {
                Some(key.clone())
            }
        }
        Expr::Aggregate {
            func,
            arg,
            distinct: false,
        } => {
            let Expr::Column(c) = arg.as_ref() else {
                return None;
            };
            let i = inner_schema.index_of(c).ok()?;
            let source = if i < keys.len() {
                if !matches!(func, AggFunc::Min | AggFunc::Max) {
                    return None;
                }
                &keys[i]
            } else {
                if !matches!(func, AggFunc::Min | AggFunc::Max | AggFunc::Sum | AggFunc::Avg) {
                    return None;
                }
                inner_aggregates.get(i - keys.len())?
            };
            Some(source.unalias().clone().alias(name))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::analyzed;
    use relopt_core::builder::PlanBuilder;
    use relopt_core::expr::{avg, col, count, max, min, sum};

    fn apply(plan: LogicalPlan) -> Transformed {
        AggregateCombinationRule.apply(plan, &OptContext::default()).unwrap()
    }

    fn per_store_totals() -> PlanBuilder {
        PlanBuilder::scan("ventas").aggregate(vec![col("TIENDA")], vec![sum(col("MONTO")).alias("total")])
    }

    #[test]
    fn test_reaggregation_over_same_keys_merges() {
        let plan = analyzed(
            per_store_totals()
                .aggregate(vec![col("TIENDA")], vec![max(col("total")).alias("mayor")])
                .build(),
        );
        let before = plan.schema().unwrap();
        let result = apply(plan);
        assert!(result.changed);
        assert_eq!(result.plan.schema().unwrap(), before);
        let expected = analyzed(
            PlanBuilder::scan("ventas")
                .aggregate(vec![col("TIENDA")], vec![sum(col("MONTO")).alias("mayor")])
                .build(),
        );
        assert_eq!(result.plan, expected);
        assert!(!apply(result.plan).changed);
    }

    #[test]
    fn test_group_key_under_min_merges() {
        let plan = analyzed(
            per_store_totals()
                .aggregate(
                    vec![col("TIENDA")],
                    vec![min(col("TIENDA")).alias("t"), sum(col("total")).alias("s")],
                )
                .build(),
        );
        let result = apply(plan);
        let LogicalPlan::Aggregate { input, aggregates, .. } = &result.plan else {
            panic!("expected aggregate: {}", result.plan);
        };
        assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
        assert_eq!(aggregates.len(), 2);
    }

    #[test]
    fn test_different_keys_are_not_merged() {
        let plan = analyzed(
            per_store_totals()
                .aggregate(vec![], vec![sum(col("total")).alias("global")])
                .build(),
        );
        assert!(!apply(plan).changed);
    }

    #[test]
    fn test_count_is_not_merged() {
        let plan = analyzed(
            per_store_totals()
                .aggregate(vec![col("TIENDA")], vec![count(col("total")).alias("n")])
                .build(),
        );
        assert!(!apply(plan).changed);
    }

    #[test]
    fn test_type_changing_merge_is_rejected() {
        let plan = analyzed(
            per_store_totals()
                .aggregate(vec![col("TIENDA")], vec![avg(col("total")).alias("media")])
                .build(),
        );
        assert!(!apply(plan).changed);
    }
}
