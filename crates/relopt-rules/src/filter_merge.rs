//! # Filter Merge Rule
//!
//! ```text
//! Filter(Filter(c, p1), p2)  ->  Filter(c, p1 AND p2)
//! ```
//!
//! The merged predicate is flattened and repeated conjuncts are dropped, so
//! chaining the same filter twice leaves a single filter with a single
//! conjunct.

use relopt_core::error::SchemaError;
use relopt_core::expr::Expr;
use relopt_core::plan::LogicalPlan;
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};

pub struct FilterMergeRule;

impl OptimizationRule for FilterMergeRule {
    fn name(&self) -> &'static str {
        "FilterMerge"
    }

    fn description(&self) -> &'static str {
        "Merge adjacent filters into one conjunctive predicate"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let mut changed = false;
        let merged = plan.transform_up(&mut |node| {
            Ok::<_, SchemaError>(match node {
                LogicalPlan::Filter { input, predicate } => match *input {
                    LogicalPlan::Filter {
                        input: inner,
                        predicate: inner_predicate,
                    } => {
                        changed = true;
                        let predicate = match Expr::conjunction([inner_predicate, predicate]) {
                            Some(p) => p,
                            None => Expr::Literal(true.into()),
                        };
                        LogicalPlan::Filter { input: inner, predicate }
                    }
                    other => LogicalPlan::Filter {
                        input: Box::new(other),
                        predicate,
                    },
                },
                other => other,
            })
        })?;
        Ok(Transformed { plan: merged, changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::analyzed;
    use relopt_core::builder::PlanBuilder;
    use relopt_core::expr::{col, lit, qcol};
    use proptest::prelude::*;

    fn pool() -> Vec<Expr> {
        vec![
            qcol("ventas", "MONTO").gt(lit(2i64)),
            qcol("ventas", "TIENDA").eq(lit("A")),
            qcol("ventas", "MONTO").is_null(),
            qcol("ventas", "MONTO").lt(lit(100i64)).or(qcol("ventas", "TIENDA").eq(lit("B"))),
        ]
    }

    #[test]
    fn test_duplicate_filters_collapse() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .filter(col("MONTO").gt(lit(2i64)))
                .filter(col("MONTO").gt(lit(2i64)))
                .build(),
        );
        let result = FilterMergeRule.apply(plan, &OptContext::default()).unwrap();
        assert!(result.changed);
        let LogicalPlan::Filter { input, predicate } = &result.plan else {
            panic!("expected filter: {}", result.plan);
        };
        assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
        assert_eq!(predicate, &qcol("ventas", "MONTO").gt(lit(2i64)));
    }

    #[test]
    fn test_three_filters_merge_in_one_pass() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .filter(col("MONTO").gt(lit(2i64)))
                .filter(col("TIENDA").eq(lit("A")))
                .filter(col("MONTO").lt(lit(100i64)))
                .build(),
        );
        let result = FilterMergeRule.apply(plan, &OptContext::default()).unwrap();
        let LogicalPlan::Filter { input, predicate } = &result.plan else {
            panic!("expected filter");
        };
        assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
        assert_eq!(predicate.conjuncts().len(), 3);
    }

    proptest! {
        #[test]
        fn test_chain_merges_to_distinct_conjuncts(picks in prop::collection::vec(0usize..4, 1..6)) {
            let pool = pool();
            let mut builder = PlanBuilder::scan("ventas");
            let mut expected: Vec<Expr> = Vec::new();
            for &i in &picks {
                builder = builder.filter(pool[i].clone());
                if !expected.contains(&pool[i]) {
                    expected.push(pool[i].clone());
                }
            }
            let result = FilterMergeRule.apply(analyzed(builder.build()), &OptContext::default()).unwrap();
            prop_assert_eq!(result.changed, picks.len() > 1);

            let LogicalPlan::Filter { input, predicate } = &result.plan else {
                panic!("expected filter: {}", result.plan);
            };
            prop_assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
            let conjuncts: Vec<Expr> = predicate.conjuncts().into_iter().cloned().collect();
            prop_assert_eq!(conjuncts, expected);

            let again = FilterMergeRule.apply(result.plan.clone(), &OptContext::default()).unwrap();
            prop_assert!(!again.changed);
        }
    }
}
