//! # Join Reordering Rule
//!
//! Reorders a tree of inner joins so that small relations are joined first.
//!
//! A maximal tree of `Inner` joins is flattened into its leaf relations and
//! the conjuncts of all its conditions. Leaves are ranked by estimated row
//! count (a stable sort, so ties keep their left-to-right order). The join
//! order is then built greedily: at each step the first ranked leaf that a
//! conjunct connects to the leaves already placed is taken, falling back to
//! the first remaining leaf when none is connected. This avoids introducing
//! cross products the original tree did not have.
//!
//! The result is a left-deep tree with every conjunct attached to the lowest
//! join that has all of its columns in scope, wrapped in a projection that
//! restores the original column order.
//!
//! The rule does nothing without a statistics provider, for trees of fewer
//! than three relations, or when any relation lacks an estimate.

use relopt_core::catalog::StatisticsProvider;
use relopt_core::error::SchemaError;
use relopt_core::expr::Expr;
use relopt_core::plan::{JoinType, LogicalPlan};
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use relopt_core::schema::{Field, Schema};
use relopt_core::stats::estimate_plan_statistics;
use std::collections::BTreeSet;
use tracing::debug;

pub struct JoinReorderingRule;

impl OptimizationRule for JoinReorderingRule {
    fn name(&self) -> &'static str {
        "JoinReordering"
    }

    fn description(&self) -> &'static str {
        "Join smaller relations first in chains of three or more inner joins"
    }

    fn apply(&self, plan: LogicalPlan, ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let Some(stats) = ctx.stats else {
            return Ok(Transformed::no(plan));
        };
        let original = plan.clone();
        let reordered = plan.transform_down(&mut |node| {
            if !matches!(node, LogicalPlan::Join { join_type: JoinType::Inner, .. }) {
                return Ok(node);
            }
            Ok::<_, SchemaError>(reorder(&node, stats)?.unwrap_or(node))
        })?;
        Ok(Transformed::compare(&original, reordered))
    }
}

fn flatten<'a>(plan: &'a LogicalPlan, leaves: &mut Vec<&'a LogicalPlan>, conjuncts: &mut Vec<&'a Expr>) {
    match plan {
        LogicalPlan::Join {
            left,
            right,
            join_type: JoinType::Inner,
            condition,
        } => {
            flatten(left, leaves, conjuncts);
            flatten(right, leaves, conjuncts);
            if let Some(c) = condition {
                conjuncts.extend(c.conjuncts());
            }
        }
        other => leaves.push(other),
    }
}

/// Leaves whose columns `expr` reads. `None` when a column does not resolve
/// in exactly one leaf.
fn leaf_set(expr: &Expr, leaf_schemas: &[Schema]) -> Option<BTreeSet<usize>> {
    let mut set = BTreeSet::new();
    for c in expr.columns() {
        let mut hits = leaf_schemas
            .iter()
            .enumerate()
            .filter(|(_, s)| s.index_of(c).is_ok())
            .map(|(i, _)| i);
        match (hits.next(), hits.next()) {
            (Some(i), None) => {
                set.insert(i);
            }
            _ => return None,
        }
    }
    Some(set)
}

/// Whether some conjunct joins `leaf` to the leaves already placed.
fn connects(leaf: usize, placed: &BTreeSet<usize>, sets: &[BTreeSet<usize>]) -> bool {
    sets.iter().any(|s| {
        s.contains(&leaf)
            && s.iter().any(|i| placed.contains(i))
            && s.iter().all(|i| *i == leaf || placed.contains(i))
    })
}

fn greedy_order(estimates: &[f64], sets: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..estimates.len()).collect();
    remaining.sort_by(|&a, &b| estimates[a].total_cmp(&estimates[b]));
    let mut placed = BTreeSet::new();
    let mut order = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let pos = remaining
            .iter()
            .position(|&leaf| connects(leaf, &placed, sets))
            .unwrap_or(0);
        let leaf = remaining.remove(pos);
        placed.insert(leaf);
        order.push(leaf);
    }
    order
}

/// The reordered replacement for `join`, or `None` when it should stay.
fn reorder(join: &LogicalPlan, stats: &dyn StatisticsProvider) -> Result<Option<LogicalPlan>, SchemaError> {
    let mut leaves = Vec::new();
    let mut conjuncts = Vec::new();
    flatten(join, &mut leaves, &mut conjuncts);
    if leaves.len() < 3 {
        return Ok(None);
    }

    let Some(estimates) = leaves
        .iter()
        .map(|l| estimate_plan_statistics(l, stats).map(|s| s.row_count))
        .collect::<Option<Vec<f64>>>()
    else {
        debug!("missing estimates, keeping join order");
        return Ok(None);
    };
    let combined = join.schema()?;
    if !combined.has_unique_qualified_names() {
        return Ok(None);
    }
    let leaf_schemas = leaves.iter().map(|l| l.schema()).collect::<Result<Vec<_>, _>>()?;
    let Some(sets) = conjuncts
        .iter()
        .map(|c| leaf_set(c, &leaf_schemas))
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(None);
    };

    let order = greedy_order(&estimates, &sets);
    if order.iter().copied().eq(0..leaves.len()) {
        return Ok(None);
    }

    let mut used = vec![false; conjuncts.len()];
    let mut placed = BTreeSet::from([order[0]]);
    let mut tree = leaves[order[0]].clone();
    for &leaf in &order[1..] {
        placed.insert(leaf);
        let mut here = Vec::new();
        for (j, set) in sets.iter().enumerate() {
            if !used[j] && set.is_subset(&placed) {
                used[j] = true;
                here.push(conjuncts[j].clone());
            }
        }
        tree = LogicalPlan::Join {
            left: Box::new(tree),
            right: Box::new(leaves[leaf].clone()),
            join_type: JoinType::Inner,
            condition: Expr::conjunction(here),
        };
    }
    let reordered = LogicalPlan::Project {
        input: Box::new(tree),
        exprs: combined.fields.iter().map(Field::column_expr).collect(),
    };
    if reordered.schema().ok().as_ref() != Some(&combined) {
        return Ok(None);
    }
    debug!(
        order = ?order.iter().map(|&i| estimates[i]).collect::<Vec<_>>(),
        "reordered inner joins by estimated rows"
    );
    Ok(Some(reordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{analyzed, catalog};
    use relopt_core::builder::PlanBuilder;
    use relopt_core::catalog::InMemoryCatalog;
    use relopt_core::expr::{qcol, DataType};
    use proptest::prelude::*;

    fn chain() -> LogicalPlan {
        analyzed(
            PlanBuilder::scan("t1")
                .inner_join(PlanBuilder::scan("t2").build(), qcol("t1", "a").eq(qcol("t2", "a")))
                .inner_join(PlanBuilder::scan("t3").build(), qcol("t2", "b").eq(qcol("t3", "b")))
                .build(),
        )
    }

    fn scan_order(plan: &LogicalPlan) -> Vec<String> {
        match plan {
            LogicalPlan::Scan(scan) => vec![scan.table.clone()],
            other => other.children().into_iter().flat_map(scan_order).collect(),
        }
    }

    #[test]
    fn test_smallest_relation_joined_first() {
        let stats = catalog();
        let plan = chain();
        let before = plan.schema().unwrap();
        let result = JoinReorderingRule
            .apply(plan, &OptContext::new(Some(&stats)))
            .unwrap();
        assert!(result.changed);
        assert_eq!(scan_order(&result.plan), vec!["t2", "t3", "t1"]);
        assert_eq!(result.plan.schema().unwrap(), before);
        assert!(result.plan.check_references().is_ok());

        let again = JoinReorderingRule
            .apply(result.plan.clone(), &OptContext::new(Some(&stats)))
            .unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_conjuncts_attach_at_lowest_join() {
        let stats = catalog();
        let result = JoinReorderingRule
            .apply(chain(), &OptContext::new(Some(&stats)))
            .unwrap();
        let LogicalPlan::Project { input, .. } = &result.plan else {
            panic!("expected project: {}", result.plan);
        };
        let LogicalPlan::Join { left, condition, .. } = input.as_ref() else {
            panic!("expected join");
        };
        assert_eq!(condition, &Some(qcol("t1", "a").eq(qcol("t2", "a"))));
        let LogicalPlan::Join { condition, .. } = left.as_ref() else {
            panic!("expected nested join");
        };
        assert_eq!(condition, &Some(qcol("t2", "b").eq(qcol("t3", "b"))));
    }

    #[test]
    fn test_no_statistics_is_noop() {
        let result = JoinReorderingRule.apply(chain(), &OptContext::default()).unwrap();
        assert!(!result.changed);
    }

    #[test]
    fn test_missing_estimate_is_noop() {
        let mut partial = InMemoryCatalog::new();
        partial
            .add_table("t1", &[("a", DataType::Int64), ("x", DataType::Int64)])
            .add_table("t2", &[("a", DataType::Int64), ("b", DataType::Int64)])
            .add_table("t3", &[("b", DataType::Int64), ("y", DataType::Int64)])
            .set_row_count("t1", 1000.0)
            .set_row_count("t2", 10.0);
        let result = JoinReorderingRule
            .apply(chain(), &OptContext::new(Some(&partial)))
            .unwrap();
        assert!(!result.changed);
    }

    #[test]
    fn test_two_relations_are_left_alone() {
        let stats = catalog();
        let plan = analyzed(
            PlanBuilder::scan("t1")
                .inner_join(PlanBuilder::scan("t2").build(), qcol("t1", "a").eq(qcol("t2", "a")))
                .build(),
        );
        let result = JoinReorderingRule.apply(plan, &OptContext::new(Some(&stats))).unwrap();
        assert!(!result.changed);
    }

    #[test]
    fn test_equal_estimates_keep_original_order() {
        let mut stats = catalog();
        stats.set_row_count("t1", 10.0).set_row_count("t3", 10.0);
        let plan = analyzed(
            PlanBuilder::scan("t1")
                .inner_join(PlanBuilder::scan("t2").build(), qcol("t1", "a").eq(qcol("t2", "a")))
                .inner_join(PlanBuilder::scan("t3").build(), qcol("t2", "b").eq(qcol("t3", "b")))
                .build(),
        );
        let result = JoinReorderingRule.apply(plan, &OptContext::new(Some(&stats))).unwrap();
        assert!(!result.changed);
    }

    proptest! {
        #[test]
        fn test_any_estimates_keep_relations_and_schema(r1 in 1u32..5000, r2 in 1u32..5000, r3 in 1u32..5000) {
            let mut stats = catalog();
            stats
                .set_row_count("t1", f64::from(r1))
                .set_row_count("t2", f64::from(r2))
                .set_row_count("t3", f64::from(r3));
            let ctx = OptContext::new(Some(&stats));
            let plan = chain();
            let before = plan.schema().unwrap();

            let result = JoinReorderingRule.apply(plan, &ctx).unwrap();
            prop_assert_eq!(result.plan.schema().unwrap(), before);
            prop_assert!(result.plan.check_references().is_ok());

            // First smallest estimate, earliest table on ties.
            let rows = [("t1", r1), ("t2", r2), ("t3", r3)];
            let smallest = rows.iter().fold(rows[0], |best, &cur| if cur.1 < best.1 { cur } else { best });
            let mut order = scan_order(&result.plan);
            prop_assert_eq!(order[0].as_str(), smallest.0);
            order.sort();
            prop_assert_eq!(order, vec!["t1", "t2", "t3"]);

            let again = JoinReorderingRule.apply(result.plan.clone(), &ctx).unwrap();
            prop_assert!(!again.changed);
        }
    }
}
