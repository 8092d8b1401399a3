//! # Physical Plans
//!
//! The physical plan is what an external executor runs. Every column reference
//! in it is bound to the ordinal of the column in its operator's input (see
//! [`bind_expr`]), so the executor never resolves names.
//!
//! A logical `SubqueryAlias` has no physical counterpart; the alias only
//! renames columns, and bound ordinals make names irrelevant.

use crate::error::SchemaError;
use crate::expr::Expr;
use crate::plan::{join_exprs, JoinType};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which join input is materialized into the hash table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildSide {
    Left,
    Right,
}

impl fmt::Display for BuildSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSide::Left => f.write_str("BuildLeft"),
            BuildSide::Right => f.write_str("BuildRight"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinStrategy {
    /// The build side is small enough to ship to every task and hash in memory.
    BroadcastHash { build_side: BuildSide },
    /// Both inputs are sorted on the join keys and merged.
    SortMerge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalPlan {
    FileScan {
        table: String,
        /// Names of the columns read, in output order.
        pruned_columns: Vec<String>,
        /// Predicates the reader evaluates itself, bound to file column
        /// ordinals.
        pushed_filters: Vec<Expr>,
        schema: Schema,
    },
    FilterExec {
        input: Box<PhysicalPlan>,
        predicate: Expr,
    },
    ProjectExec {
        input: Box<PhysicalPlan>,
        exprs: Vec<Expr>,
        schema: Schema,
    },
    JoinExec {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        join_type: JoinType,
        condition: Option<Expr>,
        strategy: JoinStrategy,
    },
    HashAggregateExec {
        input: Box<PhysicalPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<Expr>,
        schema: Schema,
    },
    /// Produces no rows.
    EmptyExec { schema: Schema },
}

impl PhysicalPlan {
    pub fn schema(&self) -> Schema {
        match self {
            PhysicalPlan::FileScan { schema, .. }
            | PhysicalPlan::ProjectExec { schema, .. }
            | PhysicalPlan::HashAggregateExec { schema, .. }
            | PhysicalPlan::EmptyExec { schema } => schema.clone(),
            PhysicalPlan::FilterExec { input, .. } => input.schema(),
            PhysicalPlan::JoinExec {
                left, right, join_type, ..
            } => {
                if join_type.outputs_right() {
                    left.schema().join(&right.schema())
                } else {
                    left.schema()
                }
            }
        }
    }

    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::FileScan { .. } | PhysicalPlan::EmptyExec { .. } => vec![],
            PhysicalPlan::FilterExec { input, .. }
            | PhysicalPlan::ProjectExec { input, .. }
            | PhysicalPlan::HashAggregateExec { input, .. } => vec![input.as_ref()],
            PhysicalPlan::JoinExec { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// All nodes in pre-order matching `predicate`.
    pub fn collect<'a>(&'a self, predicate: &dyn Fn(&PhysicalPlan) -> bool) -> Vec<&'a PhysicalPlan> {
        let mut out = Vec::new();
        self.collect_into(predicate, &mut out);
        out
    }

    fn collect_into<'a>(&'a self, predicate: &dyn Fn(&PhysicalPlan) -> bool, out: &mut Vec<&'a PhysicalPlan>) {
        if predicate(self) {
            out.push(self);
        }
        for child in self.children() {
            child.collect_into(predicate, out);
        }
    }

    /// Name of the operator as shown in explain output.
    pub fn operator_name(&self) -> &'static str {
        match self {
            PhysicalPlan::FileScan { .. } => "FileScan",
            PhysicalPlan::FilterExec { .. } => "Filter",
            PhysicalPlan::ProjectExec { .. } => "Project",
            PhysicalPlan::JoinExec { strategy, .. } => match strategy {
                JoinStrategy::BroadcastHash { .. } => "BroadcastHashJoin",
                JoinStrategy::SortMerge => "SortMergeJoin",
            },
            PhysicalPlan::HashAggregateExec { .. } => "HashAggregate",
            PhysicalPlan::EmptyExec { .. } => "LocalTableScan",
        }
    }

    pub fn display_indent(&self) -> String {
        let mut out = String::new();
        self.write_tree("", "", &mut out);
        out
    }

    fn write_tree(&self, first_prefix: &str, rest_prefix: &str, out: &mut String) {
        out.push_str(first_prefix);
        out.push_str(&self.describe());
        out.push('\n');
        let children = self.children();
        let last = children.len().saturating_sub(1);
        for (i, child) in children.into_iter().enumerate() {
            if i == last {
                child.write_tree(&format!("{rest_prefix}+- "), &format!("{rest_prefix}   "), out);
            } else {
                child.write_tree(&format!("{rest_prefix}:- "), &format!("{rest_prefix}:  "), out);
            }
        }
    }

    fn describe(&self) -> String {
        let name = self.operator_name();
        match self {
            PhysicalPlan::FileScan {
                table,
                pruned_columns,
                pushed_filters,
                ..
            } => format!(
                "{name} {table}[{}] PushedFilters: [{}]",
                pruned_columns.join(", "),
                join_exprs(pushed_filters)
            ),
            PhysicalPlan::FilterExec { predicate, .. } => format!("{name} {predicate}"),
            PhysicalPlan::ProjectExec { exprs, .. } => format!("{name} [{}]", join_exprs(exprs)),
            PhysicalPlan::JoinExec {
                join_type,
                condition,
                strategy,
                ..
            } => {
                let mut s = format!("{name} {join_type}");
                if let JoinStrategy::BroadcastHash { build_side } = strategy {
                    s.push_str(&format!(", {build_side}"));
                }
                if let Some(c) = condition {
                    s.push_str(&format!(", {c}"));
                }
                s
            }
            PhysicalPlan::HashAggregateExec {
                group_by, aggregates, ..
            } => format!("{name}(keys=[{}], functions=[{}])", join_exprs(group_by), join_exprs(aggregates)),
            PhysicalPlan::EmptyExec { schema } => format!("{name} <empty>, [{}]", schema.names().join(", ")),
        }
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_indent())
    }
}

/// Bind every column of `expr` to its ordinal in `schema`.
pub fn bind_expr(expr: &Expr, schema: &Schema) -> Result<Expr, SchemaError> {
    for c in expr.columns() {
        let i = schema.index_of(c)?;
        if u32::try_from(i).is_err() {
            return Err(SchemaError::ColumnNotFound(c.to_string()));
        }
    }
    Ok(expr.clone().transform_up(&mut |e| match e {
        Expr::Column(mut c) => {
            c.index = schema.index_of(&c).ok().and_then(|i| u32::try_from(i).ok());
            Expr::Column(c)
        }
        other => other,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{qcol, DataType};
    use crate::schema::Field;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int64).with_relation(Some("t".into())),
            Field::new("name", DataType::Utf8).with_relation(Some("t".into())),
        ])
    }

    #[test]
    fn test_bind_expr_sets_ordinals() {
        let bound = bind_expr(&qcol("t", "name").is_not_null(), &schema()).unwrap();
        assert_eq!(bound.to_string(), "isnotnull(t.name#1)");
        assert!(bind_expr(&qcol("t", "missing"), &schema()).is_err());
    }

    #[test]
    fn test_join_display_and_collect() {
        let scan = |table: &str| PhysicalPlan::FileScan {
            table: table.into(),
            pruned_columns: vec!["id".into()],
            pushed_filters: vec![],
            schema: Schema::new(vec![Field::new("id", DataType::Int64)]),
        };
        let join = PhysicalPlan::JoinExec {
            left: Box::new(scan("a")),
            right: Box::new(scan("b")),
            join_type: JoinType::Inner,
            condition: None,
            strategy: JoinStrategy::BroadcastHash {
                build_side: BuildSide::Right,
            },
        };
        let expected = "\
BroadcastHashJoin Inner, BuildRight
:- FileScan a[id] PushedFilters: []
+- FileScan b[id] PushedFilters: []
";
        assert_eq!(join.display_indent(), expected);
        assert_eq!(join.collect(&|p| matches!(p, PhysicalPlan::FileScan { .. })).len(), 2);
        assert_eq!(join.schema().len(), 2);
    }
}
