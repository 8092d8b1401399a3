//! # Built-in Optimization Rules and Physical Planning
//!
//! This crate provides the logical rewrite rules run by the fixed-point
//! optimizer, the physical planner, and the pipeline tying all planning stages
//! together.
//!
//! ## Logical Rules (Logical -> Logical)
//!
//! - **`PredicatePushdownRule`**: Moves filters below projections, aliases and
//!   inner joins, and records source-evaluable conjuncts on scans.
//! - **`ConstantFoldingRule`**: Folds column-free expressions, removes
//!   always-true filters and replaces never-true subtrees with an empty
//!   relation.
//! - **`FilterMergeRule`**: Merges adjacent filters into one conjunctive
//!   predicate without repeated conjuncts.
//! - **`ProjectionPruningRule`**: Narrows every scan to the columns some
//!   ancestor uses and drops unused projection outputs.
//! - **`SubqueryEliminationRule`**: Removes aliases that are not needed to
//!   tell relations apart, and passthrough projections.
//! - **`AggregateCombinationRule`**: Merges an aggregate over another
//!   aggregate grouped by the same keys.
//! - **`JoinReorderingRule`**: Joins small relations first in chains of three
//!   or more inner joins. Requires a statistics provider.
//!
//! ## Physical Planning
//!
//! - **`impl_scan`**: Scans become file scans with pruned columns and pushed
//!   filters.
//! - **`impl_join`**: Broadcast-hash or sort-merge join selection.
//! - **`impl_agg`**: Hash aggregation.
//! - **`physical_planner`**: The logical-to-physical translation.
//! - **`execution`**: `QueryExecution`, running analysis, optimization and
//!   physical planning and explaining each stage.

pub mod aggregate_combination;
pub mod constant_folding;
pub mod execution;
pub mod filter_merge;
pub mod impl_agg;
pub mod impl_join;
pub mod impl_scan;
pub mod join_reordering;
pub mod physical_planner;
pub mod predicate_pushdown;
pub mod projection_pruning;
pub mod subquery_elimination;

#[cfg(test)]
mod test_util;

use relopt_core::rule::OptimizationRule;

/// The built-in rules in application order.
pub fn default_rule_set() -> Vec<Box<dyn OptimizationRule>> {
    vec![
        Box::new(predicate_pushdown::PredicatePushdownRule),
        Box::new(constant_folding::ConstantFoldingRule),
        Box::new(filter_merge::FilterMergeRule),
        Box::new(projection_pruning::ProjectionPruningRule),
        Box::new(subquery_elimination::SubqueryEliminationRule),
        Box::new(aggregate_combination::AggregateCombinationRule),
        Box::new(join_reordering::JoinReorderingRule),
    ]
}
