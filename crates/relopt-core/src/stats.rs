//! # Statistics for Plan Selection
//!
//! The planner makes exactly two statistics-driven decisions: the order of
//! inner joins and the choice of join strategy. Both need an estimated row
//! count for an arbitrary logical subtree, which [`estimate_plan_statistics`]
//! derives bottom-up from per-table statistics.
//!
//! ## Derivation Formulas
//!
//! - **Filter**: output_rows = input_rows * selectivity. Column NDVs are scaled
//!   proportionally to the row reduction ratio.
//! - **Join**: output_rows = |left| * |right| / max(NDV_left_key, NDV_right_key)
//!   for every equi-join key pair. Without equi keys the join is a cross product.
//! - **Aggregate**: output_rows = product of NDVs of group-by columns, capped by
//!   input rows.
//!
//! ## Selectivity Estimation
//!
//! - **Equality**: 1 / NDV (uniform distribution assumption).
//! - **Range**: fixed 1/3 heuristic.
//! - **AND**: product; **OR**: inclusion-exclusion; **NOT**: complement.
//! - **Default**: 0.1 (10%) when no better estimate is available.
//!
//! These are heuristics only; no cost model is built on top of them.

use crate::catalog::StatisticsProvider;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::plan::{JoinType, LogicalPlan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics for a relation or an intermediate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    /// Keyed by unqualified column name.
    #[serde(default)]
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV).
    pub distinct_count: f64,
    /// Fraction of rows that are NULL, in [0.0, 1.0].
    #[serde(default)]
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

/// Derive statistics for join output.
///
/// ```text
/// |A JOIN B| = |A| * |B| / max(NDV(A.key), NDV(B.key))
/// ```
///
/// Multi-column keys multiply selectivities (independence assumption). A
/// missing NDV falls back to the side's row count.
pub fn derive_join_stats(left: &Statistics, right: &Statistics, join_columns: &[(String, String)]) -> Statistics {
    let mut selectivity = 1.0_f64;
    for (left_col, right_col) in join_columns {
        let left_ndv = left
            .column_stats
            .get(left_col)
            .map(|s| s.distinct_count)
            .unwrap_or(left.row_count);
        let right_ndv = right
            .column_stats
            .get(right_col)
            .map(|s| s.distinct_count)
            .unwrap_or(right.row_count);
        selectivity /= left_ndv.max(right_ndv).max(1.0);
    }

    let row_count = left.row_count * right.row_count * selectivity;

    // NDV can't exceed the output row count.
    let mut column_stats = HashMap::new();
    for (name, stats) in left.column_stats.iter().chain(right.column_stats.iter()) {
        let mut cs = stats.clone();
        cs.distinct_count = cs.distinct_count.min(row_count.max(1.0));
        column_stats.insert(name.clone(), cs);
    }

    Statistics { row_count, column_stats }
}

/// Derive statistics for filter output.
pub fn derive_filter_stats(input: &Statistics, selectivity: f64) -> Statistics {
    let row_count = input.row_count * selectivity.clamp(0.0, 1.0);
    let ratio = if input.row_count > 0.0 {
        row_count / input.row_count
    } else {
        1.0
    };

    let mut column_stats = HashMap::new();
    for (name, stats) in &input.column_stats {
        let mut cs = stats.clone();
        cs.distinct_count = (cs.distinct_count * ratio).max(1.0).min(row_count.max(1.0));
        column_stats.insert(name.clone(), cs);
    }

    Statistics { row_count, column_stats }
}

/// Derive statistics for aggregate output. A global aggregate yields one row.
pub fn derive_aggregate_stats(input: &Statistics, group_by_cols: &[String]) -> Statistics {
    if group_by_cols.is_empty() {
        return Statistics::new(1.0);
    }
    let mut row_count = 1.0_f64;
    for col in group_by_cols {
        let ndv = input
            .column_stats
            .get(col)
            .map(|s| s.distinct_count)
            .unwrap_or(input.row_count);
        row_count *= ndv;
    }
    Statistics::new(row_count.min(input.row_count))
}

/// Default filter selectivity when we can't determine it.
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// Selectivity of a range comparison (`<`, `<=`, `>`, `>=`).
pub const RANGE_SELECTIVITY: f64 = 0.33;

/// Estimate selectivity for an equality predicate: `sel = 1 / NDV`.
pub fn equality_selectivity(stats: &Statistics, col_name: &str) -> f64 {
    stats
        .column_stats
        .get(col_name)
        .map(|cs| 1.0 / cs.distinct_count.max(1.0))
        .unwrap_or(DEFAULT_FILTER_SELECTIVITY)
}

/// Estimate the fraction of rows of `stats` that satisfy `expr`.
pub fn estimate_selectivity(expr: &Expr, stats: &Statistics) -> f64 {
    match expr {
        Expr::Literal(v) => match v {
            crate::expr::ScalarValue::Bool(true) => 1.0,
            _ => 0.0,
        },
        Expr::BinaryOp { op, left, right } => match (op, left.as_ref(), right.as_ref()) {
            (BinaryOp::Eq, Expr::Column(c), Expr::Literal(_)) | (BinaryOp::Eq, Expr::Literal(_), Expr::Column(c)) => {
                equality_selectivity(stats, &c.name)
            }
            (BinaryOp::NotEq, Expr::Column(c), Expr::Literal(_))
            | (BinaryOp::NotEq, Expr::Literal(_), Expr::Column(c)) => 1.0 - equality_selectivity(stats, &c.name),
            (BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq, _, _) => RANGE_SELECTIVITY,
            _ => DEFAULT_FILTER_SELECTIVITY,
        },
        Expr::UnaryOp { op, operand } => match (op, operand.as_ref()) {
            (UnaryOp::Not, inner) => 1.0 - estimate_selectivity(inner, stats),
            (UnaryOp::IsNull, Expr::Column(c)) => stats
                .column_stats
                .get(&c.name)
                .map(|cs| cs.null_fraction)
                .unwrap_or(DEFAULT_FILTER_SELECTIVITY),
            (UnaryOp::IsNotNull, Expr::Column(c)) => stats
                .column_stats
                .get(&c.name)
                .map(|cs| 1.0 - cs.null_fraction)
                .unwrap_or(1.0 - DEFAULT_FILTER_SELECTIVITY),
            _ => DEFAULT_FILTER_SELECTIVITY,
        },
        Expr::And(conjuncts) => conjuncts.iter().map(|c| estimate_selectivity(c, stats)).product(),
        // P(A or B) = 1 - P(!A and !B)
        Expr::Or(disjuncts) => {
            1.0 - disjuncts
                .iter()
                .map(|d| 1.0 - estimate_selectivity(d, stats))
                .product::<f64>()
        }
        _ => DEFAULT_FILTER_SELECTIVITY,
    }
}

/// Extract the `(left, right)` column-name pairs of the `col = col` conjuncts
/// in a join condition.
pub fn extract_equi_join_columns(condition: &Expr) -> Vec<(String, String)> {
    condition
        .conjuncts()
        .into_iter()
        .filter_map(|c| match c {
            Expr::BinaryOp {
                op: BinaryOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(l), Expr::Column(r)) => Some((l.name.clone(), r.name.clone())),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Estimate the statistics of a logical subtree.
///
/// Returns `None` when any table below `plan` has no estimate.
pub fn estimate_plan_statistics(plan: &LogicalPlan, provider: &dyn StatisticsProvider) -> Option<Statistics> {
    match plan {
        LogicalPlan::Scan(scan) => provider.table_statistics(&scan.table),
        LogicalPlan::Filter { input, predicate } => {
            let input_stats = estimate_plan_statistics(input, provider)?;
            let selectivity = estimate_selectivity(predicate, &input_stats);
            Some(derive_filter_stats(&input_stats, selectivity))
        }
        LogicalPlan::Project { input, .. } | LogicalPlan::SubqueryAlias { input, .. } => {
            estimate_plan_statistics(input, provider)
        }
        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let l = estimate_plan_statistics(left, provider)?;
            let r = estimate_plan_statistics(right, provider)?;
            let keys = condition.as_ref().map(extract_equi_join_columns).unwrap_or_default();
            let inner = derive_join_stats(&l, &r, &keys);
            Some(match join_type {
                JoinType::Inner | JoinType::Cross => inner,
                JoinType::Left => Statistics::new(inner.row_count.max(l.row_count)),
                JoinType::Right => Statistics::new(inner.row_count.max(r.row_count)),
                JoinType::Full => Statistics::new(inner.row_count.max(l.row_count.max(r.row_count))),
                // Upper bound: every left row survives.
                JoinType::Semi | JoinType::Anti => l,
            })
        }
        LogicalPlan::Aggregate { input, group_by, .. } => {
            let input_stats = estimate_plan_statistics(input, provider)?;
            let keys: Vec<String> = group_by.iter().map(|g| g.unalias().output_name()).collect();
            Some(derive_aggregate_stats(&input_stats, &keys))
        }
        LogicalPlan::Empty { .. } => Some(Statistics::new(0.0)),
    }
}
