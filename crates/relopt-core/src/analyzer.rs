//! # Analyzer
//!
//! Turns a raw logical plan into an analyzed one. Walking bottom-up, the
//! analyzer:
//!
//! 1. looks up every scanned table in the [`Catalog`] and attaches its schema,
//!    qualified by the table name;
//! 2. resolves every column reference against the schema visible at that node
//!    and rewrites it to its canonical qualified form;
//! 3. type-checks operators, applying the single implicit coercion described
//!    below;
//! 4. rejects aggregate calls outside the aggregate list of an `Aggregate`.
//!
//! ## Coercion
//!
//! Numeric operands widen (`int < bigint < double`). A string literal compared
//! with a `date` operand is parsed as an ISO-8601 `YYYY-MM-DD` date and replaced
//! by a date literal; a string that doesn't parse is a type mismatch. There is
//! no other implicit conversion.
//!
//! The input plan is borrowed and never modified.

use crate::catalog::Catalog;
use crate::error::AnalysisError;
use crate::expr::{DataType, Expr, ScalarValue};
use crate::plan::{AnalyzedPlan, LogicalPlan, TableScan};
use crate::schema::Schema;
use tracing::{debug, trace};

pub struct Analyzer<'a> {
    catalog: &'a dyn Catalog,
}

/// Analyze `plan` against `catalog`.
pub fn analyze(plan: &LogicalPlan, catalog: &dyn Catalog) -> Result<AnalyzedPlan, AnalysisError> {
    Analyzer::new(catalog).analyze(plan)
}

impl<'a> Analyzer<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    pub fn analyze(&self, plan: &LogicalPlan) -> Result<AnalyzedPlan, AnalysisError> {
        let resolved = self.resolve_plan(plan)?;
        resolved.check_references()?;
        let schema = resolved.schema()?;
        debug!(nodes = resolved.node_count(), columns = schema.len(), "analysis complete");
        Ok(AnalyzedPlan { plan: resolved, schema })
    }

    fn resolve_plan(&self, plan: &LogicalPlan) -> Result<LogicalPlan, AnalysisError> {
        match plan {
            LogicalPlan::Scan(scan) => {
                let source_schema = self.catalog.schema_of(&scan.table)?.requalify(&scan.table);
                trace!(table = %scan.table, columns = source_schema.len(), "resolved table");
                let mut resolved = TableScan {
                    table: scan.table.clone(),
                    source_schema,
                    projection: scan.projection.clone(),
                    pushed_filters: Vec::new(),
                };
                resolved.schema()?;
                for f in &scan.pushed_filters {
                    let f = self.resolve_expr(f, &resolved.source_schema, "pushed filter")?;
                    expect_predicate(&f, &resolved.source_schema)?;
                    resolved.pushed_filters.push(f);
                }
                Ok(LogicalPlan::Scan(resolved))
            }
            LogicalPlan::Filter { input, predicate } => {
                let input = self.resolve_plan(input)?;
                let schema = input.schema()?;
                let predicate = self.resolve_expr(predicate, &schema, "WHERE clause")?;
                expect_predicate(&predicate, &schema)?;
                Ok(LogicalPlan::Filter {
                    input: Box::new(input),
                    predicate,
                })
            }
            LogicalPlan::Project { input, exprs } => {
                let input = self.resolve_plan(input)?;
                let schema = input.schema()?;
                let exprs = exprs
                    .iter()
                    .map(|e| self.resolve_expr(e, &schema, "projection"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LogicalPlan::Project {
                    input: Box::new(input),
                    exprs,
                })
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let left = self.resolve_plan(left)?;
                let right = self.resolve_plan(right)?;
                let combined = left.schema()?.join(&right.schema()?);
                let condition = match condition {
                    Some(c) => {
                        let c = self.resolve_expr(c, &combined, "join condition")?;
                        expect_predicate(&c, &combined)?;
                        Some(c)
                    }
                    None => None,
                };
                Ok(LogicalPlan::Join {
                    left: Box::new(left),
                    right: Box::new(right),
                    join_type: *join_type,
                    condition,
                })
            }
            LogicalPlan::Aggregate {
                input,
                group_by,
                aggregates,
            } => {
                let input = self.resolve_plan(input)?;
                let schema = input.schema()?;
                let group_by = group_by
                    .iter()
                    .map(|g| self.resolve_expr(g, &schema, "GROUP BY"))
                    .collect::<Result<Vec<_>, _>>()?;
                let aggregates = aggregates
                    .iter()
                    .map(|a| self.resolve_aggregate(a, &schema))
                    .collect::<Result<Vec<_>, _>>()?;
                let node = LogicalPlan::Aggregate {
                    input: Box::new(input),
                    group_by,
                    aggregates,
                };
                node.schema()?;
                Ok(node)
            }
            LogicalPlan::SubqueryAlias { input, alias } => Ok(LogicalPlan::SubqueryAlias {
                input: Box::new(self.resolve_plan(input)?),
                alias: alias.clone(),
            }),
            LogicalPlan::Empty { schema } => Ok(LogicalPlan::Empty { schema: schema.clone() }),
        }
    }

    /// Resolve an entry of an aggregate list. Aggregate calls are allowed
    /// here, but not nested inside one another.
    fn resolve_aggregate(&self, expr: &Expr, schema: &Schema) -> Result<Expr, AnalysisError> {
        match expr {
            Expr::Aggregate { func, arg, distinct } => {
                if arg.contains_aggregate() {
                    return Err(AnalysisError::MisplacedAggregate(format!("the argument of {expr}")));
                }
                let resolved = Expr::Aggregate {
                    func: *func,
                    arg: Box::new(self.resolve_expr(arg, schema, "aggregate argument")?),
                    distinct: *distinct,
                };
                resolved.data_type(schema)?;
                Ok(resolved)
            }
            Expr::Alias { expr: inner, name } => Ok(Expr::Alias {
                expr: Box::new(self.resolve_aggregate(inner, schema)?),
                name: name.clone(),
            }),
            Expr::BinaryOp { op, left, right } => {
                let left = self.resolve_aggregate(left, schema)?;
                let right = self.resolve_aggregate(right, schema)?;
                let (left, right) = coerce_operands(left, right, schema)?;
                let resolved = Expr::BinaryOp {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                };
                resolved.data_type(schema)?;
                Ok(resolved)
            }
            other => self.resolve_expr(other, schema, "aggregate list"),
        }
    }

    /// Resolve and type-check a scalar expression evaluated over `schema`.
    /// `context` names the clause for error messages.
    fn resolve_expr(&self, expr: &Expr, schema: &Schema, context: &str) -> Result<Expr, AnalysisError> {
        if expr.contains_aggregate() {
            return Err(AnalysisError::MisplacedAggregate(context.to_string()));
        }
        let resolved = self.qualify(expr, schema)?;
        resolved.data_type(schema)?;
        Ok(resolved)
    }

    fn qualify(&self, expr: &Expr, schema: &Schema) -> Result<Expr, AnalysisError> {
        Ok(match expr {
            Expr::Column(c) => Expr::Column(schema.field_for(c)?.column()),
            Expr::Literal(_) => expr.clone(),
            Expr::BinaryOp { op, left, right } => {
                let left = self.qualify(left, schema)?;
                let right = self.qualify(right, schema)?;
                let (left, right) = if op.is_comparison() {
                    coerce_operands(left, right, schema)?
                } else {
                    (left, right)
                };
                Expr::BinaryOp {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op: *op,
                operand: Box::new(self.qualify(operand, schema)?),
            },
            Expr::And(exprs) => Expr::And(exprs.iter().map(|e| self.qualify(e, schema)).collect::<Result<_, _>>()?),
            Expr::Or(exprs) => Expr::Or(exprs.iter().map(|e| self.qualify(e, schema)).collect::<Result<_, _>>()?),
            Expr::Aggregate { func, arg, distinct } => Expr::Aggregate {
                func: *func,
                arg: Box::new(self.qualify(arg, schema)?),
                distinct: *distinct,
            },
            Expr::Alias { expr, name } => Expr::Alias {
                expr: Box::new(self.qualify(expr, schema)?),
                name: name.clone(),
            },
        })
    }
}

fn expect_predicate(expr: &Expr, schema: &Schema) -> Result<(), AnalysisError> {
    match expr.data_type(schema)? {
        DataType::Boolean | DataType::Null => Ok(()),
        other => Err(AnalysisError::TypeMismatch(format!(
            "predicate {expr} must be boolean, found {other}"
        ))),
    }
}

/// Apply the string-to-date coercion to the operands of a comparison.
fn coerce_operands(left: Expr, right: Expr, schema: &Schema) -> Result<(Expr, Expr), AnalysisError> {
    let lt = left.data_type(schema)?;
    let rt = right.data_type(schema)?;
    match (lt, rt) {
        (DataType::Date, DataType::Utf8) => Ok((left, string_to_date(right)?)),
        (DataType::Utf8, DataType::Date) => Ok((string_to_date(left)?, right)),
        _ => Ok((left, right)),
    }
}

fn string_to_date(expr: Expr) -> Result<Expr, AnalysisError> {
    match expr {
        Expr::Literal(ScalarValue::Utf8(ref s)) => ScalarValue::parse_date(s)
            .map(Expr::Literal)
            .ok_or_else(|| AnalysisError::TypeMismatch(format!("cannot cast '{s}' to date"))),
        other => Err(AnalysisError::TypeMismatch(format!(
            "cannot compare string expression {other} with a date"
        ))),
    }
}
