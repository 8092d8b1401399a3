//! # Projection Pruning Rule
//!
//! Computes, top-down, which output columns of every node its ancestors
//! actually use, and stops reading everything else.
//!
//! - The root needs all of its columns.
//! - A filter needs what its parent needs plus the predicate's columns.
//! - A projection below the root keeps only the expressions its parent
//!   uses, and needs the columns of those.
//! - A join splits the requirement between its sides and adds the
//!   condition's columns.
//! - An aggregate needs the columns of its keys and aggregate arguments.
//! - A scan reads exactly the required columns plus those referenced by its
//!   pushed filters. This is recorded as the scan's projection and becomes
//!   the physical scan's column list.
//!
//! No node is narrowed to zero columns; when nothing is required (for
//! example below `count(*)`) the first column is kept.

use relopt_core::error::SchemaError;
use relopt_core::expr::Expr;
use relopt_core::plan::LogicalPlan;
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use relopt_core::schema::Schema;
use std::collections::BTreeSet;
use tracing::trace;

pub struct ProjectionPruningRule;

impl OptimizationRule for ProjectionPruningRule {
    fn name(&self) -> &'static str {
        "ProjectionPruning"
    }

    fn description(&self) -> &'static str {
        "Read and carry only the columns that some ancestor uses"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let original = plan.clone();
        let all: BTreeSet<usize> = (0..plan.schema()?.len()).collect();
        let pruned = prune(plan, &all)?;
        Ok(Transformed::compare(&original, pruned))
    }
}

/// Positions in `schema` of the columns referenced by `exprs`.
fn referenced<'a>(
    exprs: impl IntoIterator<Item = &'a Expr>,
    schema: &Schema,
    out: &mut BTreeSet<usize>,
) -> Result<(), SchemaError> {
    for expr in exprs {
        for c in expr.columns() {
            out.insert(schema.index_of(c)?);
        }
    }
    Ok(())
}

/// Never narrow to nothing.
fn at_least_one(mut keep: BTreeSet<usize>, available: usize) -> BTreeSet<usize> {
    if keep.is_empty() && available > 0 {
        keep.insert(0);
    }
    keep
}

/// Rewrite `plan` so that it still produces the columns at `required`
/// positions of its output, and as few others as possible.
fn prune(plan: LogicalPlan, required: &BTreeSet<usize>) -> Result<LogicalPlan, SchemaError> {
    match plan {
        LogicalPlan::Scan(mut scan) => {
            let output = scan.schema()?;
            let mut keep = required.clone();
            referenced(&scan.pushed_filters, &output, &mut keep)?;
            let keep = at_least_one(keep, output.len());
            if keep.len() < output.len() {
                let indices = scan.output_indices();
                let projection: Vec<usize> = keep.iter().filter_map(|&p| indices.get(p).copied()).collect();
                trace!(table = %scan.table, columns = projection.len(), "narrowing scan");
                scan.projection = Some(projection);
            }
            Ok(LogicalPlan::Scan(scan))
        }
        LogicalPlan::Filter { input, predicate } => {
            let schema = input.schema()?;
            let mut needed = required.clone();
            referenced([&predicate], &schema, &mut needed)?;
            Ok(LogicalPlan::Filter {
                input: Box::new(prune(*input, &needed)?),
                predicate,
            })
        }
        LogicalPlan::Project { input, exprs } => {
            let keep = at_least_one(required.clone(), exprs.len());
            let exprs: Vec<Expr> = exprs
                .into_iter()
                .enumerate()
                .filter(|(i, _)| keep.contains(i))
                .map(|(_, e)| e)
                .collect();
            let schema = input.schema()?;
            let mut needed = BTreeSet::new();
            referenced(&exprs, &schema, &mut needed)?;
            let needed = at_least_one(needed, schema.len());
            Ok(LogicalPlan::Project {
                input: Box::new(prune(*input, &needed)?),
                exprs,
            })
        }
        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let left_len = left.schema()?.len();
            let combined = left.schema()?.join(&right.schema()?);
            let mut needed = required.clone();
            referenced(condition.iter(), &combined, &mut needed)?;
            let left_needed: BTreeSet<usize> = needed.iter().copied().filter(|&i| i < left_len).collect();
            let right_needed: BTreeSet<usize> = needed.iter().filter(|&&i| i >= left_len).map(|&i| i - left_len).collect();
            Ok(LogicalPlan::Join {
                left: Box::new(prune(*left, &left_needed)?),
                right: Box::new(prune(*right, &right_needed)?),
                join_type,
                condition,
            })
        }
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } => {
            let schema = input.schema()?;
            let mut needed = BTreeSet::new();
            referenced(group_by.iter().chain(aggregates.iter()), &schema, &mut needed)?;
            Ok(LogicalPlan::Aggregate {
                input: Box::new(prune(*input, &needed)?),
                group_by,
                aggregates,
            })
        }
        LogicalPlan::SubqueryAlias { input, alias } => Ok(LogicalPlan::SubqueryAlias {
            input: Box::new(prune(*input, required)?),
            alias,
        }),
        empty @ LogicalPlan::Empty { .. } => Ok(empty),
    }
}
