//! # Subquery Elimination Rule
//!
//! Removes plan structure that only renames:
//!
//! - **Aliases.** `SubqueryAlias(c, a)` is replaced by `c`, and every
//!   reference qualified by `a` is rebound, by position, to the column of `c`
//!   it stands for. The alias is kept when it is needed for
//!   disambiguation, i.e. when some rebound reference would become ambiguous
//!   or resolve elsewhere. The rewritten tree is re-validated before it is
//!   accepted.
//! - **Passthrough projections.** A projection that lists exactly its input's
//!   columns, in order, is replaced by its input.
//!
//! Removing an alias changes the qualifier of the affected columns but never
//! their names, types or order.

use relopt_core::error::SchemaError;
use relopt_core::expr::{ColumnRef, Expr};
use relopt_core::plan::LogicalPlan;
use relopt_core::rule::{OptContext, OptimizationRule, Transformed};
use std::collections::HashMap;
use tracing::trace;

pub struct SubqueryEliminationRule;

impl OptimizationRule for SubqueryEliminationRule {
    fn name(&self) -> &'static str {
        "SubqueryElimination"
    }

    fn description(&self) -> &'static str {
        "Remove aliases not needed for disambiguation and passthrough projections"
    }

    fn apply(&self, plan: LogicalPlan, _ctx: &OptContext<'_>) -> Result<Transformed, SchemaError> {
        let original = plan.clone();
        let mut plan = plan.transform_up(&mut inline_passthrough)?;

        // Aliases are numbered in pre-order. A successful removal shifts the
        // numbering, so the same index is retried against the next alias.
        let mut target = 0;
        loop {
            match try_remove_alias(&plan, target)? {
                Attempt::Removed(rewritten) => plan = rewritten,
                Attempt::Kept => target += 1,
                Attempt::NoSuchAlias => break,
            }
        }
        Ok(Transformed::compare(&original, plan))
    }
}

fn inline_passthrough(node: LogicalPlan) -> Result<LogicalPlan, SchemaError> {
    match node {
        LogicalPlan::Project { input, exprs } => {
            let schema = input.schema()?;
            let passthrough = exprs.len() == schema.len()
                && exprs
                    .iter()
                    .zip(&schema.fields)
                    .all(|(e, f)| matches!(e, Expr::Column(c) if *c == f.column()));
            if passthrough {
                trace!("inlining passthrough projection");
                Ok(*input)
            } else {
                Ok(LogicalPlan::Project { input, exprs })
            }
        }
        other => Ok(other),
    }
}

enum Attempt {
    Removed(LogicalPlan),
    Kept,
    NoSuchAlias,
}

struct Removal {
    alias: String,
    /// Alias-qualified column to the child column it stands for.
    rebind: HashMap<ColumnRef, Expr>,
    /// The child already exposes every column under the alias name.
    identity: bool,
}

fn try_remove_alias(plan: &LogicalPlan, target: usize) -> Result<Attempt, SchemaError> {
    let mut seen = 0;
    let mut removal = None;
    let without = remove_nth_alias(plan.clone(), target, &mut seen, &mut removal)?;
    let Some(removal) = removal else {
        return Ok(Attempt::NoSuchAlias);
    };

    if removal.identity {
        return Ok(Attempt::Removed(without));
    }
    // Another relation already uses this name; rebinding would capture its
    // references.
    if qualifier_uses(plan, &removal.alias) > 1 {
        trace!(alias = %removal.alias, "alias name is not unique");
        return Ok(Attempt::Kept);
    }

    let rebound = without.transform_up(&mut |node| {
        Ok::<_, SchemaError>(node.map_expressions(|e| e.substitute(&removal.rebind)))
    })?;
    let names_kept = match (plan.schema(), rebound.schema()) {
        (Ok(before), Ok(after)) => before.names() == after.names(),
        _ => false,
    };
    if names_kept && rebound.check_references().is_ok() {
        trace!(alias = %removal.alias, "removed alias");
        Ok(Attempt::Removed(rebound))
    } else {
        trace!(alias = %removal.alias, "alias needed for disambiguation");
        Ok(Attempt::Kept)
    }
}

/// Replace the `target`-th alias (pre-order) with its child.
fn remove_nth_alias(
    plan: LogicalPlan,
    target: usize,
    seen: &mut usize,
    removal: &mut Option<Removal>,
) -> Result<LogicalPlan, SchemaError> {
    match plan {
        LogicalPlan::SubqueryAlias { input, alias } => {
            let index = *seen;
            *seen += 1;
            if index == target {
                let child_schema = input.schema()?;
                let identity = child_schema
                    .fields
                    .iter()
                    .all(|f| f.relation.as_deref() == Some(alias.as_str()));
                let rebind = child_schema
                    .requalify(&alias)
                    .fields
                    .iter()
                    .zip(&child_schema.fields)
                    .map(|(outer, inner)| (outer.column(), inner.column_expr()))
                    .collect();
                *removal = Some(Removal {
                    alias,
                    rebind,
                    identity,
                });
                return Ok(*input);
            }
            Ok(LogicalPlan::SubqueryAlias {
                input: Box::new(remove_nth_alias(*input, target, seen, removal)?),
                alias,
            })
        }
        other => other.map_children(|child| remove_nth_alias(child, target, seen, removal)),
    }
}

/// Number of aliases and scanned tables named `name`.
fn qualifier_uses(plan: &LogicalPlan, name: &str) -> usize {
    let here = match plan {
        LogicalPlan::SubqueryAlias { alias, .. } => usize::from(alias == name),
        LogicalPlan::Scan(scan) => usize::from(scan.table == name),
        _ => 0,
    };
    here + plan.children().iter().map(|c| qualifier_uses(c, name)).sum::<usize>()
}
