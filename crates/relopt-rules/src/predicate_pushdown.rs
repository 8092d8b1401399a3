//! # Predicate Pushdown Rule
//!
//! Moves filter conditions toward the data sources so fewer rows flow through
//! the plan.
//!
//! ```text
//! Filter(Project(c, exprs), p)         -> Project(Filter(c, p[out := expr]), exprs)
//! Filter(SubqueryAlias(c, a), p)       -> SubqueryAlias(Filter(c, p[a.x := c.x]), a)
//! Filter(Join(l, r, Inner, cond), p)   -> Join(Filter(l, pl), Filter(r, pr), Inner, cond AND pmixed)
//! Filter(Scan(t), p)                   -> Filter(Scan(t, pushed = translatable(p)), p)
//! ```
//!
//! Through a projection, output columns are replaced by their defining
//! expressions. Through an alias, alias-qualified columns are rebound by
//! position to the child's own columns. Over an inner join the predicate is
//! split into conjuncts: each goes to the side that resolves all of its
//! columns, and conjuncts spanning both sides join the join condition.
//!
//! Over a scan the filter is kept. The conjuncts a data source can evaluate
//! itself (comparisons between a column and a literal, null checks, and
//! boolean combinations of those) are recorded on the scan as pushed filters,
//! and the physical planner decides whether to keep a residual filter. The
//! pushed filters always mirror the filter directly above the scan; a scan
//! with no filter above it has none.
//!
//! Outer, semi and anti joins are left alone: moving a predicate across the
//! null-supplying side changes the result.

use relopt_core::error::SchemaError;
use relopt_core::expr::{ColumnRef, Expr, UnaryOp};
use relopt_core::plan::{JoinType, LogicalPlan};
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use std::collections::HashMap;
use tracing::trace;

pub struct PredicatePushdownRule;

impl OptimizationRule for PredicatePushdownRule {
    fn name(&self) -> &'static str {
        "PredicatePushdown"
    }

    fn description(&self) -> &'static str {
        "Push filters below projections, aliases and inner joins; record source-evaluable conjuncts on scans"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let original = plan.clone();
        let pushed = plan.transform_down(&mut push_filter)?;
        let synced = sync_pushed_filters(pushed)?;
        Ok(Transformed::compare(&original, synced))
    }
}

fn push_filter(plan: LogicalPlan) -> Result<LogicalPlan, SchemaError> {
    match plan {
        LogicalPlan::Filter { input, predicate } => match *input {
            project @ LogicalPlan::Project { .. } => push_through_project(project, predicate),
            alias @ LogicalPlan::SubqueryAlias { .. } => push_through_alias(alias, predicate),
            LogicalPlan::Join {
                left,
                right,
                join_type: JoinType::Inner,
                condition,
            } => push_into_join(*left, *right, condition, predicate),
            other => Ok(filter(other, predicate)),
        },
        other => Ok(other),
    }
}

fn filter(input: LogicalPlan, predicate: Expr) -> LogicalPlan {
    LogicalPlan::Filter {
        input: Box::new(input),
        predicate,
    }
}

fn push_through_project(project: LogicalPlan, predicate: Expr) -> Result<LogicalPlan, SchemaError> {
    let schema = project.schema()?;
    let (input, exprs) = match project {
        LogicalPlan::Project { input, exprs } => (input, exprs),
        other => return Ok(filter(other, predicate)),
    };

    let mapping: HashMap<ColumnRef, Expr> = schema
        .fields
        .iter()
        .zip(&exprs)
        .map(|(field, expr)| (field.column(), expr.unalias().clone()))
        .collect();
    let rewritten = predicate.substitute(&mapping);

    if !input.schema()?.resolves(&rewritten) {
        trace!(%predicate, "predicate depends on projected-away columns");
        return Ok(filter(LogicalPlan::Project { input, exprs }, predicate));
    }
    Ok(LogicalPlan::Project {
        input: Box::new(filter(*input, rewritten)),
        exprs,
    })
}

fn push_through_alias(node: LogicalPlan, predicate: Expr) -> Result<LogicalPlan, SchemaError> {
    let (input, alias) = match node {
        LogicalPlan::SubqueryAlias { input, alias } => (input, alias),
        other => return Ok(filter(other, predicate)),
    };
    let child_schema = input.schema()?;
    let mapping: HashMap<ColumnRef, Expr> = child_schema
        .requalify(&alias)
        .fields
        .iter()
        .zip(&child_schema.fields)
        .map(|(outer, inner)| (outer.column(), inner.column_expr()))
        .collect();
    let rewritten = predicate.substitute(&mapping);

    if !child_schema.resolves(&rewritten) {
        trace!(%alias, %predicate, "alias child has ambiguous columns; filter stays above");
        return Ok(filter(LogicalPlan::SubqueryAlias { input, alias }, predicate));
    }
    Ok(LogicalPlan::SubqueryAlias {
        input: Box::new(filter(*input, rewritten)),
        alias,
    })
}

fn push_into_join(
    left: LogicalPlan,
    right: LogicalPlan,
    condition: Option<Expr>,
    predicate: Expr,
) -> Result<LogicalPlan, SchemaError> {
    let left_schema = left.schema()?;
    let right_schema = right.schema()?;

    let mut to_left = Vec::new();
    let mut to_right = Vec::new();
    let mut to_join: Vec<Expr> = condition.into_iter().collect();
    for conjunct in predicate.conjuncts() {
        if left_schema.resolves(conjunct) {
            to_left.push(conjunct.clone());
        } else if right_schema.resolves(conjunct) {
            to_right.push(conjunct.clone());
        } else {
            to_join.push(conjunct.clone());
        }
    }
    trace!(
        left = to_left.len(),
        right = to_right.len(),
        join = to_join.len(),
        "split filter over inner join"
    );

    let wrap = |side: LogicalPlan, conjuncts: Vec<Expr>| match Expr::conjunction(conjuncts) {
        Some(p) => filter(side, p),
        None => side,
    };
    Ok(LogicalPlan::Join {
        left: Box::new(wrap(left, to_left)),
        right: Box::new(wrap(right, to_right)),
        join_type: JoinType::Inner,
        condition: Expr::conjunction(to_join),
    })
}

/// Set every scan's pushed filters from the filter directly above it.
fn sync_pushed_filters(plan: LogicalPlan) -> Result<LogicalPlan, SchemaError> {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            let input = match *input {
                LogicalPlan::Scan(mut scan) => {
                    scan.pushed_filters = predicate
                        .conjuncts()
                        .into_iter()
                        .filter(|c| is_source_translatable(c))
                        .cloned()
                        .collect();
                    LogicalPlan::Scan(scan)
                }
                other => sync_pushed_filters(other)?,
            };
            Ok(filter(input, predicate))
        }
        LogicalPlan::Scan(mut scan) => {
            scan.pushed_filters.clear();
            Ok(LogicalPlan::Scan(scan))
        }
        other => other.map_children(sync_pushed_filters),
    }
}

/// Whether a data source can evaluate `expr` without an expression engine.
pub fn is_source_translatable(expr: &Expr) -> bool {
    match expr {
        Expr::BinaryOp { op, left, right } if op.is_comparison() => matches!(
            (left.as_ref(), right.as_ref()),
            (Expr::Column(_), Expr::Literal(_)) | (Expr::Literal(_), Expr::Column(_))
        ),
        Expr::UnaryOp {
            op: UnaryOp::IsNull | UnaryOp::IsNotNull,
            operand,
        } => matches!(operand.as_ref(), Expr::Column(_)),
        Expr::UnaryOp {
            op: UnaryOp::Not,
            operand,
        } => is_source_translatable(operand),
        Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(is_source_translatable),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::analyzed;
    use relopt_core::builder::PlanBuilder;
    use relopt_core::expr::{col, lit, qcol};

    fn apply(plan: LogicalPlan) -> Transformed {
        PredicatePushdownRule.apply(plan, &OptContext::default()).unwrap()
    }

    #[test]
    fn test_filter_over_scan_records_pushed_filters() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .filter(col("MONTO").gt(lit(2i64)).and(col("MONTO").add(lit(1i64)).lt(col("MONTO"))))
                .build(),
        );
        let result = apply(plan);
        assert!(result.changed);
        let LogicalPlan::Filter { input, .. } = &result.plan else {
            panic!("filter must stay: {}", result.plan);
        };
        let LogicalPlan::Scan(scan) = input.as_ref() else {
            panic!("expected scan");
        };
        assert_eq!(scan.pushed_filters, vec![qcol("ventas", "MONTO").gt(lit(2i64))]);

        // Second application is a no-op.
        assert!(!apply(result.plan).changed);
    }

    #[test]
    fn test_push_through_project_substitutes_expressions() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .project(vec![col("MONTO").mul(lit(2i64)).alias("doble"), col("TIENDA")])
                .filter(col("doble").gt(lit(10i64)))
                .build(),
        );
        let result = apply(plan);
        let LogicalPlan::Project { input, .. } = &result.plan else {
            panic!("expected project on top: {}", result.plan);
        };
        let LogicalPlan::Filter { predicate, .. } = input.as_ref() else {
            panic!("expected filter below project");
        };
        assert_eq!(predicate, &qcol("ventas", "MONTO").mul(lit(2i64)).gt(lit(10i64)));
    }

    #[test]
    fn test_push_through_alias_rebinds_qualifiers() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .alias("subconsulta")
                .filter(qcol("subconsulta", "MONTO").gt(lit(2i64)))
                .build(),
        );
        let result = apply(plan);
        let LogicalPlan::SubqueryAlias { input, .. } = &result.plan else {
            panic!("expected alias on top: {}", result.plan);
        };
        let LogicalPlan::Filter { predicate, .. } = input.as_ref() else {
            panic!("expected filter below alias");
        };
        assert_eq!(predicate, &qcol("ventas", "MONTO").gt(lit(2i64)));
        assert!(result.plan.check_references().is_ok());
    }

    #[test]
    fn test_split_conjuncts_over_inner_join() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .cross_join(PlanBuilder::scan("tiendas").build())
                .build(),
        );
        // A cross join is not rewritten; rebuild it as an inner join.
        let LogicalPlan::Join { left, right, .. } = plan else {
            panic!("expected join");
        };
        let join = LogicalPlan::Join {
            left,
            right,
            join_type: JoinType::Inner,
            condition: None,
        };
        let predicate = qcol("ventas", "MONTO")
            .gt(lit(2i64))
            .and(qcol("tiendas", "CIUDAD").eq(lit("Lima")))
            .and(qcol("ventas", "TIENDA").eq(qcol("tiendas", "TIENDA")));
        let result = apply(PlanBuilder::from(join).filter(predicate).build());

        let LogicalPlan::Join {
            left,
            right,
            condition,
            ..
        } = &result.plan
        else {
            panic!("filter should be absorbed: {}", result.plan);
        };
        assert!(matches!(left.as_ref(), LogicalPlan::Filter { .. }));
        assert!(matches!(right.as_ref(), LogicalPlan::Filter { .. }));
        assert_eq!(
            condition.as_ref(),
            Some(&qcol("ventas", "TIENDA").eq(qcol("tiendas", "TIENDA")))
        );
        assert!(result.plan.check_references().is_ok());
    }

    #[test]
    fn test_outer_join_is_untouched() {
        let plan = analyzed(
            PlanBuilder::scan("ventas")
                .join(
                    PlanBuilder::scan("tiendas").build(),
                    JoinType::Left,
                    Some(qcol("ventas", "TIENDA").eq(qcol("tiendas", "TIENDA"))),
                )
                .filter(qcol("tiendas", "CIUDAD").is_null())
                .build(),
        );
        let result = apply(plan.clone());
        assert!(!result.changed);
        assert_eq!(result.plan, plan);
    }

    #[test]
    fn test_stale_pushed_filters_are_cleared() {
        let mut plan = analyzed(PlanBuilder::scan("ventas").build());
        if let LogicalPlan::Scan(ref mut scan) = plan {
            scan.pushed_filters = vec![qcol("ventas", "MONTO").gt(lit(2i64))];
        }
        let result = apply(plan);
        let LogicalPlan::Scan(scan) = &result.plan else {
            panic!("expected scan");
        };
        assert!(scan.pushed_filters.is_empty());
    }

    #[test]
    fn test_translatable_predicates() {
        assert!(is_source_translatable(&col("a").gt(lit(1i64))));
        assert!(is_source_translatable(&lit(1i64).lt_eq(col("a"))));
        assert!(is_source_translatable(&col("a").is_null().or(col("b").eq(lit("x")))));
        assert!(!is_source_translatable(&col("a").add(lit(1i64)).gt(lit(2i64))));
        assert!(!is_source_translatable(&col("a").eq(col("b"))));
    }
}
