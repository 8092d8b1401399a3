//! # Logical Plans
//!
//! A logical plan is an owned tree of relational operators. Children are boxed
//! and never shared, so every rewrite produces a new tree and structural
//! equality (`PartialEq`) is the identity the optimizer compares against.
//!
//! ## Output Schemas
//!
//! [`LogicalPlan::schema`] derives a node's output schema from its children on
//! every call. Nothing is cached, so a rewritten tree can never carry a stale
//! schema.
//!
//! - **Scan**: the table's source schema, narrowed by `projection` if set.
//! - **Filter**: the child's schema.
//! - **Project**: one field per expression. A bare column keeps its qualifier.
//! - **Join**: left fields followed by right fields (`Semi`/`Anti`: left only).
//!   The condition must resolve against both sides and be boolean.
//! - **Aggregate**: grouping keys followed by aggregate results. Every aggregate
//!   expression must be a grouping key or wrapped in an aggregate function.
//! - **SubqueryAlias**: the child's fields requalified by the alias.
//! - **Empty**: the schema it was created with.

use crate::error::SchemaError;
use crate::expr::{DataType, Expr};
use crate::schema::{Field, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Left rows with at least one match. Outputs left columns only.
    Semi,
    /// Left rows with no match. Outputs left columns only.
    Anti,
    Cross,
}

impl JoinType {
    /// Whether the join output contains the right side's columns.
    pub fn outputs_right(&self) -> bool {
        !matches!(self, JoinType::Semi | JoinType::Anti)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinType::Inner => "Inner",
            JoinType::Left => "LeftOuter",
            JoinType::Right => "RightOuter",
            JoinType::Full => "FullOuter",
            JoinType::Semi => "LeftSemi",
            JoinType::Anti => "LeftAnti",
            JoinType::Cross => "Cross",
        };
        f.write_str(name)
    }
}

/// Read of a catalog table.
///
/// `source_schema` is the full table schema, every field qualified by the table
/// name. It is empty in a raw plan and filled in by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableScan {
    pub table: String,
    #[serde(default)]
    pub source_schema: Schema,
    /// Indices into `source_schema` of the columns actually read.
    #[serde(default)]
    pub projection: Option<Vec<usize>>,
    /// Conjuncts of the enclosing filter that the data source can evaluate
    /// itself. The filter stays in the plan.
    #[serde(default)]
    pub pushed_filters: Vec<Expr>,
}

impl TableScan {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            source_schema: Schema::empty(),
            projection: None,
            pushed_filters: Vec::new(),
        }
    }

    pub fn schema(&self) -> Result<Schema, SchemaError> {
        match self.projection {
            None => Ok(self.source_schema.clone()),
            Some(ref indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= self.source_schema.len()) {
                    return Err(SchemaError::ProjectionOutOfBounds {
                        table: self.table.clone(),
                        index: bad,
                    });
                }
                Ok(self.source_schema.project(indices).unwrap_or_default())
            }
        }
    }

    /// Source-schema indices of the columns this scan outputs.
    pub fn output_indices(&self) -> Vec<usize> {
        match self.projection {
            Some(ref indices) => indices.clone(),
            None => (0..self.source_schema.len()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalPlan {
    Scan(TableScan),
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    Project {
        input: Box<LogicalPlan>,
        exprs: Vec<Expr>,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: Option<Expr>,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        group_by: Vec<Expr>,
        aggregates: Vec<Expr>,
    },
    SubqueryAlias {
        input: Box<LogicalPlan>,
        alias: String,
    },
    /// Relation known to produce no rows.
    Empty { schema: Schema },
}

/// Field produced by `expr` in a projection or aggregate over `input`.
fn output_field(expr: &Expr, input: &Schema) -> Result<Field, SchemaError> {
    let data_type = expr.data_type(input)?;
    let relation = match expr {
        Expr::Column(c) => input.field_for(c)?.relation.clone(),
        _ => None,
    };
    Ok(Field::new(expr.output_name(), data_type).with_relation(relation))
}

fn check_predicate(predicate: &Expr, input: &Schema) -> Result<(), SchemaError> {
    match predicate.data_type(input)? {
        DataType::Boolean | DataType::Null => Ok(()),
        other => Err(SchemaError::NonBoolean(predicate.to_string(), other)),
    }
}

/// An aggregate output is valid when it is a grouping key, an aggregate call,
/// or built only from those and literals.
fn check_aggregated(expr: &Expr, group_by: &[Expr]) -> Result<(), SchemaError> {
    let bare = expr.unalias();
    if group_by.iter().any(|g| g.unalias() == bare) {
        return Ok(());
    }
    match bare {
        Expr::Aggregate { .. } | Expr::Literal(_) => Ok(()),
        Expr::Column(_) => Err(SchemaError::NotAggregated(expr.to_string())),
        Expr::BinaryOp { left, right, .. } => {
            check_aggregated(left, group_by)?;
            check_aggregated(right, group_by)
        }
        Expr::UnaryOp { operand, .. } => check_aggregated(operand, group_by),
        Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().try_for_each(|e| check_aggregated(e, group_by)),
        Expr::Alias { expr, .. } => check_aggregated(expr, group_by),
    }
}

impl LogicalPlan {
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        match self {
            LogicalPlan::Scan(scan) => scan.schema(),
            LogicalPlan::Filter { input, .. } => input.schema(),
            LogicalPlan::Project { input, exprs } => {
                let input_schema = input.schema()?;
                let fields = exprs
                    .iter()
                    .map(|e| output_field(e, &input_schema))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schema::new(fields))
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let left_schema = left.schema()?;
                let combined = left_schema.join(&right.schema()?);
                if let Some(cond) = condition {
                    check_predicate(cond, &combined)?;
                }
                if join_type.outputs_right() {
                    Ok(combined)
                } else {
                    Ok(left_schema)
                }
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let input_schema = input.schema()?;
                let mut fields = Vec::with_capacity(group_by.len() + aggregates.len());
                for g in group_by {
                    fields.push(output_field(g, &input_schema)?);
                }
                for a in aggregates {
                    check_aggregated(a, group_by)?;
                    fields.push(output_field(a, &input_schema)?);
                }
                Ok(Schema::new(fields))
            }
            LogicalPlan::SubqueryAlias { input, alias } => Ok(input.schema()?.requalify(alias)),
            LogicalPlan::Empty { schema } => Ok(schema.clone()),
        }
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan(_) | LogicalPlan::Empty { .. } => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::SubqueryAlias { input, .. } => vec![input.as_ref()],
            LogicalPlan::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Rebuild this node with every child passed through `f`.
    pub fn map_children<E>(self, mut f: impl FnMut(LogicalPlan) -> Result<LogicalPlan, E>) -> Result<LogicalPlan, E> {
        Ok(match self {
            LogicalPlan::Scan(_) | LogicalPlan::Empty { .. } => self,
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input: Box::new(f(*input)?),
                predicate,
            },
            LogicalPlan::Project { input, exprs } => LogicalPlan::Project {
                input: Box::new(f(*input)?),
                exprs,
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: Box::new(f(*left)?),
                right: Box::new(f(*right)?),
                join_type,
                condition,
            },
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => LogicalPlan::Aggregate {
                input: Box::new(f(*input)?),
                group_by,
                aggregates,
            },
            LogicalPlan::SubqueryAlias { input, alias } => LogicalPlan::SubqueryAlias {
                input: Box::new(f(*input)?),
                alias,
            },
        })
    }

    /// Post-order rewrite: children first, then `f` on the rebuilt node.
    pub fn transform_up<E, F>(self, f: &mut F) -> Result<LogicalPlan, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        let rebuilt = self.map_children(|child| child.transform_up(&mut *f))?;
        f(rebuilt)
    }

    /// Pre-order rewrite: `f` on this node, then recurse into the children of
    /// whatever `f` returned.
    pub fn transform_down<E, F>(self, f: &mut F) -> Result<LogicalPlan, E>
    where
        F: FnMut(LogicalPlan) -> Result<LogicalPlan, E>,
    {
        let node = f(self)?;
        node.map_children(|child| child.transform_down(&mut *f))
    }

    /// Rewrite every expression held directly by this node, including the
    /// pushed filters of a scan.
    pub fn map_expressions(self, mut f: impl FnMut(Expr) -> Expr) -> LogicalPlan {
        match self {
            LogicalPlan::Scan(mut scan) => {
                scan.pushed_filters = scan.pushed_filters.into_iter().map(&mut f).collect();
                LogicalPlan::Scan(scan)
            }
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input,
                predicate: f(predicate),
            },
            LogicalPlan::Project { input, exprs } => LogicalPlan::Project {
                input,
                exprs: exprs.into_iter().map(f).collect(),
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left,
                right,
                join_type,
                condition: condition.map(f),
            },
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => LogicalPlan::Aggregate {
                input,
                group_by: group_by.into_iter().map(&mut f).collect(),
                aggregates: aggregates.into_iter().map(&mut f).collect(),
            },
            other @ (LogicalPlan::SubqueryAlias { .. } | LogicalPlan::Empty { .. }) => other,
        }
    }

    /// Expressions held directly by this node.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            LogicalPlan::Scan(scan) => scan.pushed_filters.iter().collect(),
            LogicalPlan::Filter { predicate, .. } => vec![predicate],
            LogicalPlan::Project { exprs, .. } => exprs.iter().collect(),
            LogicalPlan::Join { condition, .. } => condition.iter().collect(),
            LogicalPlan::Aggregate {
                group_by, aggregates, ..
            } => group_by.iter().chain(aggregates.iter()).collect(),
            LogicalPlan::SubqueryAlias { .. } | LogicalPlan::Empty { .. } => vec![],
        }
    }

    /// Validate every expression in the tree against the schema it is
    /// evaluated over.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        for child in self.children() {
            child.check_references()?;
        }
        match self {
            LogicalPlan::Scan(scan) => {
                scan.schema()?;
                for f in &scan.pushed_filters {
                    check_predicate(f, &scan.source_schema)?;
                }
            }
            LogicalPlan::Filter { input, predicate } => check_predicate(predicate, &input.schema()?)?,
            LogicalPlan::Project { .. } | LogicalPlan::Join { .. } | LogicalPlan::Aggregate { .. } => {
                self.schema()?;
            }
            LogicalPlan::SubqueryAlias { .. } | LogicalPlan::Empty { .. } => {}
        }
        Ok(())
    }

    pub fn is_empty_relation(&self) -> bool {
        matches!(self, LogicalPlan::Empty { .. })
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Render the tree one node per line, children indented beneath their
    /// parent.
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
        match self {
            LogicalPlan::Scan(scan) if scan.source_schema.is_empty() => format!("UnresolvedRelation {}", scan.table),
            LogicalPlan::Scan(scan) => {
                let names: Vec<String> = scan
                    .output_indices()
                    .iter()
                    .map(|&i| scan.source_schema.field(i).map_or_else(|| format!("#{i}"), |f| f.name.clone()))
                    .collect();
                let mut s = format!("Relation {}[{}]", scan.table, names.join(", "));
                if !scan.pushed_filters.is_empty() {
                    s.push_str(&format!(", PushedFilters: [{}]", join_exprs(&scan.pushed_filters)));
                }
                s
            }
            LogicalPlan::Filter { predicate, .. } => format!("Filter {predicate}"),
            LogicalPlan::Project { exprs, .. } => format!("Project [{}]", join_exprs(exprs)),
            LogicalPlan::Join {
                join_type, condition, ..
            } => match condition {
                Some(c) => format!("Join {join_type}, {c}"),
                None => format!("Join {join_type}"),
            },
            LogicalPlan::Aggregate {
                group_by, aggregates, ..
            } => format!("Aggregate [{}], [{}]", join_exprs(group_by), join_exprs(aggregates)),
            LogicalPlan::SubqueryAlias { alias, .. } => format!("SubqueryAlias {alias}"),
            LogicalPlan::Empty { schema } => format!("LocalRelation <empty>, [{}]", schema.names().join(", ")),
        }
    }
}

pub(crate) fn join_exprs(exprs: &[Expr]) -> String {
    exprs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_indent())
    }
}

/// Output of the analyzer: a plan whose every column reference is resolved
/// and qualified, together with its output schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedPlan {
    pub plan: LogicalPlan,
    pub schema: Schema,
}
