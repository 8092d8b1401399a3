//! # Scalar Expressions
//!
//! This module defines the scalar expression tree that appears inside plan
//! nodes: filter predicates, projection lists, join conditions, grouping keys
//! and aggregate calls.
//!
//! ## Values and Types
//!
//! `ScalarValue` is a typed constant. `DataType` is the static type attached to
//! schema fields and derived for every expression by [`Expr::data_type`]. The
//! only implicit conversion is numeric widening (`int < bigint < double`).
//!
//! ## Constant Folding
//!
//! [`Expr::evaluate_constant`] evaluates a column-free expression at planning
//! time using SQL three-valued logic: comparisons and arithmetic with a NULL
//! operand yield NULL, `AND`/`OR` follow Kleene semantics. Expressions whose
//! evaluation would fail at runtime (division by zero, integer overflow) are
//! left unfolded so the executor reports them.
//!
//! [`Expr::fold`] applies evaluation to every column-free subtree and
//! simplifies boolean connectives that have literal operands.

use crate::error::SchemaError;
use crate::schema::Schema;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Static type of a column or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of an untyped NULL literal; compatible with every other type.
    Null,
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    /// Calendar date, stored as days since 1970-01-01.
    Date,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Int32 => Some(0),
            DataType::Int64 => Some(1),
            DataType::Float64 => Some(2),
            _ => None,
        }
    }

    /// Type both operands are widened to before comparison or arithmetic.
    ///
    /// Integers widen to floating point; there is no coercion between strings,
    /// dates and numbers.
    pub fn common_type(left: DataType, right: DataType) -> Option<DataType> {
        if left == right {
            return Some(left);
        }
        match (left, right) {
            (DataType::Null, other) | (other, DataType::Null) => Some(other),
            _ => match (left.numeric_rank(), right.numeric_rank()) {
                (Some(l), Some(r)) => Some(if l >= r { left } else { right }),
                _ => None,
            },
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "void",
            DataType::Boolean => "boolean",
            DataType::Int32 => "int",
            DataType::Int64 => "bigint",
            DataType::Float64 => "double",
            DataType::Utf8 => "string",
            DataType::Date => "date",
        };
        f.write_str(name)
    }
}

/// Constant value carried by a literal.
///
/// `Float64` is wrapped in `OrderedFloat` so that expressions, and therefore
/// whole plans, can derive `Eq` and `Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
    /// Days since the Unix epoch.
    Date(i32),
}

fn unix_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Boolean,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Date(_) => DataType::Date,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Parse an ISO-8601 calendar date (`YYYY-MM-DD`) into a `Date` value.
    pub fn parse_date(text: &str) -> Option<ScalarValue> {
        let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()?;
        let days = date.signed_duration_since(unix_epoch()?).num_days();
        i32::try_from(days).ok().map(ScalarValue::Date)
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int32(v) => Some(i64::from(*v)),
            ScalarValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int32(v) => Some(f64::from(*v)),
            ScalarValue::Int64(v) => Some(*v as f64),
            ScalarValue::Float64(v) => Some(v.0),
            _ => None,
        }
    }

    /// Compare two non-null values, widening numerics. `None` when the types
    /// are not comparable.
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => Some(a.cmp(b)),
            (ScalarValue::Utf8(a), ScalarValue::Utf8(b)) => Some(a.cmp(b)),
            (ScalarValue::Date(a), ScalarValue::Date(b)) => Some(a.cmp(b)),
            _ => match (self.as_i64(), other.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => {
                    let (a, b) = (self.as_f64()?, other.as_f64()?);
                    OrderedFloat(a).partial_cmp(&OrderedFloat(b))
                }
            },
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("null"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::Int32(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{:?}", v.0),
            ScalarValue::Utf8(v) => write!(f, "'{v}'"),
            ScalarValue::Date(days) => {
                match unix_epoch().and_then(|e| e.checked_add_signed(chrono::Duration::days(i64::from(*days)))) {
                    Some(date) => write!(f, "DATE '{}'", date.format("%Y-%m-%d")),
                    None => write!(f, "DATE({days})"),
                }
            }
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(OrderedFloat(v))
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}

/// Reference to a column, optionally qualified by the relation (table or
/// alias) that exposes it.
///
/// `index` stays `None` in logical plans. The physical planner binds each
/// reference to its ordinal in the operator's input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub relation: Option<String>,
    pub name: String,
    #[serde(default)]
    pub index: Option<u32>,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            relation: None,
            name: name.into(),
            index: None,
        }
    }

    pub fn qualified(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            name: name.into(),
            index: None,
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref r) = self.relation {
            write!(f, "{}.{}", r, self.name)?;
        } else {
            write!(f, "{}", self.name)?;
        }
        if let Some(i) = self.index {
            write!(f, "#{i}")?;
        }
        Ok(())
    }
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    /// Division. Integer operands truncate toward zero.
    Div,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        };
        f.write_str(name)
    }
}

/// Scalar expressions used in predicates, projections, join conditions and
/// aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Column(ColumnRef),
    Literal(ScalarValue),
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Conjunction stored as a flat list so predicates decompose without
    /// walking nested binary trees.
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// Aggregate function call. Only legal in the aggregate list of an
    /// `Aggregate` node.
    Aggregate {
        func: AggFunc,
        arg: Box<Expr>,
        distinct: bool,
    },
    /// Names the output of `expr`.
    Alias {
        expr: Box<Expr>,
        name: String,
    },
}

/// Unqualified column reference.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef::new(name))
}

/// Column reference qualified by a table or alias name.
pub fn qcol(relation: impl Into<String>, name: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef::qualified(relation, name))
}

pub fn lit(value: impl Into<ScalarValue>) -> Expr {
    Expr::Literal(value.into())
}

fn aggregate(func: AggFunc, arg: Expr) -> Expr {
    Expr::Aggregate {
        func,
        arg: Box::new(arg),
        distinct: false,
    }
}

/// `count(1)`, i.e. `COUNT(*)`.
pub fn count_star() -> Expr {
    aggregate(AggFunc::Count, lit(1i32))
}

pub fn count(arg: Expr) -> Expr {
    aggregate(AggFunc::Count, arg)
}

pub fn sum(arg: Expr) -> Expr {
    aggregate(AggFunc::Sum, arg)
}

pub fn avg(arg: Expr) -> Expr {
    aggregate(AggFunc::Avg, arg)
}

pub fn min(arg: Expr) -> Expr {
    aggregate(AggFunc::Min, arg)
}

pub fn max(arg: Expr) -> Expr {
    aggregate(AggFunc::Max, arg)
}

impl Expr {
    fn binary(self, op: BinaryOp, other: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    fn unary(self, op: UnaryOp) -> Expr {
        Expr::UnaryOp {
            op,
            operand: Box::new(self),
        }
    }

    pub fn eq(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn not_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOp::NotEq, other)
    }

    pub fn lt(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn lt_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOp::LtEq, other)
    }

    pub fn gt(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn gt_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOp::GtEq, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Add, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Sub, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Mul, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: Expr) -> Expr {
        self.binary(BinaryOp::Div, other)
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::And(vec![self, other])
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(vec![self, other])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        self.unary(UnaryOp::Not)
    }

    pub fn neg(self) -> Expr {
        self.unary(UnaryOp::Neg)
    }

    pub fn is_null(self) -> Expr {
        self.unary(UnaryOp::IsNull)
    }

    pub fn is_not_null(self) -> Expr {
        self.unary(UnaryOp::IsNotNull)
    }

    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// Return all column references in this expression.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut cols = Vec::new();
        self.collect_columns(&mut cols);
        cols
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::UnaryOp { operand, .. } => operand.collect_columns(out),
            Expr::And(exprs) | Expr::Or(exprs) => {
                for e in exprs {
                    e.collect_columns(out);
                }
            }
            Expr::Aggregate { arg, .. } => arg.collect_columns(out),
            Expr::Alias { expr, .. } => expr.collect_columns(out),
        }
    }

    /// Flatten AND-chains: `(A AND (B AND C))` yields `[A, B, C]`.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(exprs) => exprs.iter().flat_map(|e| e.conjuncts()).collect(),
            other => vec![other],
        }
    }

    /// Build a single conjunctive predicate, flattening nested ANDs and
    /// dropping repeated conjuncts. `None` when `exprs` is empty.
    pub fn conjunction(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut flat: Vec<Expr> = Vec::new();
        for expr in exprs {
            for c in expr.conjuncts() {
                if !flat.contains(c) {
                    flat.push(c.clone());
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Expr::And(flat)),
        }
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate { .. } => true,
            Expr::Column(_) | Expr::Literal(_) => false,
            Expr::BinaryOp { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            Expr::UnaryOp { operand, .. } => operand.contains_aggregate(),
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().any(Expr::contains_aggregate),
            Expr::Alias { expr, .. } => expr.contains_aggregate(),
        }
    }

    /// The expression with any top-level alias removed.
    pub fn unalias(&self) -> &Expr {
        match self {
            Expr::Alias { expr, .. } => expr.unalias(),
            other => other,
        }
    }

    /// Name of the column this expression produces in a projection.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(c) => c.name.clone(),
            Expr::Alias { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        match self {
            Expr::Literal(ScalarValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Rebuild the tree bottom-up, passing every node through `f` after its
    /// children have been rewritten.
    pub fn transform_up(self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let rebuilt = match self {
            Expr::Column(_) | Expr::Literal(_) => self,
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
                op,
                left: Box::new(left.transform_up(f)),
                right: Box::new(right.transform_up(f)),
            },
            Expr::UnaryOp { op, operand } => Expr::UnaryOp {
                op,
                operand: Box::new(operand.transform_up(f)),
            },
            Expr::And(exprs) => Expr::And(exprs.into_iter().map(|e| e.transform_up(f)).collect()),
            Expr::Or(exprs) => Expr::Or(exprs.into_iter().map(|e| e.transform_up(f)).collect()),
            Expr::Aggregate { func, arg, distinct } => Expr::Aggregate {
                func,
                arg: Box::new(arg.transform_up(f)),
                distinct,
            },
            Expr::Alias { expr, name } => Expr::Alias {
                expr: Box::new(expr.transform_up(f)),
                name,
            },
        };
        f(rebuilt)
    }

    /// Replace column references according to `mapping`. References without
    /// an entry are kept. Mapped expressions lose their alias, since they now
    /// appear nested inside another expression.
    pub fn substitute(&self, mapping: &HashMap<ColumnRef, Expr>) -> Expr {
        self.clone().transform_up(&mut |e| match e {
            Expr::Column(ref c) => match mapping.get(c) {
                Some(replacement) => replacement.unalias().clone(),
                None => e,
            },
            other => other,
        })
    }

    /// Derive the static type of this expression against `schema`, checking
    /// operand compatibility on the way.
    pub fn data_type(&self, schema: &Schema) -> Result<DataType, SchemaError> {
        match self {
            Expr::Column(c) => Ok(schema.field_for(c)?.data_type),
            Expr::Literal(v) => Ok(v.data_type()),
            Expr::BinaryOp { op, left, right } => {
                let (lt, rt) = (left.data_type(schema)?, right.data_type(schema)?);
                let common = DataType::common_type(lt, rt).ok_or_else(|| {
                    SchemaError::TypeMismatch(format!("cannot apply '{}' to {} and {} in {}", op.symbol(), lt, rt, self))
                })?;
                if op.is_comparison() {
                    Ok(DataType::Boolean)
                } else if common.is_numeric() || common == DataType::Null {
                    Ok(common)
                } else {
                    Err(SchemaError::TypeMismatch(format!(
                        "arithmetic '{}' requires numeric operands, found {} in {}",
                        op.symbol(),
                        common,
                        self
                    )))
                }
            }
            Expr::UnaryOp { op, operand } => {
                let t = operand.data_type(schema)?;
                match op {
                    UnaryOp::Not => expect_boolean(operand, t).map(|_| DataType::Boolean),
                    UnaryOp::Neg if t.is_numeric() || t == DataType::Null => Ok(t),
                    UnaryOp::Neg => Err(SchemaError::TypeMismatch(format!("cannot negate {t} in {self}"))),
                    UnaryOp::IsNull | UnaryOp::IsNotNull => Ok(DataType::Boolean),
                }
            }
            Expr::And(exprs) | Expr::Or(exprs) => {
                for e in exprs {
                    expect_boolean(e, e.data_type(schema)?)?;
                }
                Ok(DataType::Boolean)
            }
            Expr::Aggregate { func, arg, .. } => {
                let t = arg.data_type(schema)?;
                match func {
                    AggFunc::Count => Ok(DataType::Int64),
                    AggFunc::Min | AggFunc::Max => Ok(t),
                    AggFunc::Sum => match t {
                        DataType::Int32 | DataType::Int64 | DataType::Null => Ok(DataType::Int64),
                        DataType::Float64 => Ok(DataType::Float64),
                        other => Err(SchemaError::TypeMismatch(format!("sum over {other} in {self}"))),
                    },
                    AggFunc::Avg if t.is_numeric() || t == DataType::Null => Ok(DataType::Float64),
                    AggFunc::Avg => Err(SchemaError::TypeMismatch(format!("avg over {t} in {self}"))),
                }
            }
            Expr::Alias { expr, .. } => expr.data_type(schema),
        }
    }

    /// Evaluate an expression that references no columns.
    ///
    /// Returns `None` when the expression references a column or an
    /// aggregate, or when evaluation would raise a runtime error.
    pub fn evaluate_constant(&self) -> Option<ScalarValue> {
        match self {
            Expr::Column(_) | Expr::Aggregate { .. } => None,
            Expr::Literal(v) => Some(v.clone()),
            Expr::Alias { expr, .. } => expr.evaluate_constant(),
            Expr::BinaryOp { op, left, right } => {
                eval_binary(*op, &left.evaluate_constant()?, &right.evaluate_constant()?)
            }
            Expr::UnaryOp { op, operand } => eval_unary(*op, &operand.evaluate_constant()?),
            Expr::And(exprs) => {
                let values = exprs
                    .iter()
                    .map(|e| e.evaluate_constant().and_then(truth_value))
                    .collect::<Option<Vec<_>>>()?;
                Some(kleene(values, false))
            }
            Expr::Or(exprs) => {
                let values = exprs
                    .iter()
                    .map(|e| e.evaluate_constant().and_then(truth_value))
                    .collect::<Option<Vec<_>>>()?;
                Some(kleene(values, true))
            }
        }
    }

    /// Replace every column-free subexpression with its value and simplify
    /// boolean connectives with literal operands.
    pub fn fold(&self) -> Expr {
        self.clone().transform_up(&mut |e| match e {
            Expr::And(exprs) => simplify_connective(exprs, false),
            Expr::Or(exprs) => simplify_connective(exprs, true),
            Expr::BinaryOp { .. } | Expr::UnaryOp { .. } => match e.evaluate_constant() {
                Some(v) => Expr::Literal(v),
                None => e,
            },
            other => other,
        })
    }
}

fn expect_boolean(expr: &Expr, t: DataType) -> Result<(), SchemaError> {
    match t {
        DataType::Boolean | DataType::Null => Ok(()),
        other => Err(SchemaError::NonBoolean(expr.to_string(), other)),
    }
}

/// `Some(Some(b))` for a boolean, `Some(None)` for NULL, `None` otherwise.
fn truth_value(v: ScalarValue) -> Option<Option<bool>> {
    match v {
        ScalarValue::Bool(b) => Some(Some(b)),
        ScalarValue::Null => Some(None),
        _ => None,
    }
}

/// Kleene AND (`dominant = false`) or OR (`dominant = true`).
fn kleene(values: Vec<Option<bool>>, dominant: bool) -> ScalarValue {
    if values.contains(&Some(dominant)) {
        ScalarValue::Bool(dominant)
    } else if values.contains(&None) {
        ScalarValue::Null
    } else {
        ScalarValue::Bool(!dominant)
    }
}

fn simplify_connective(exprs: Vec<Expr>, is_or: bool) -> Expr {
    let mut kept: Vec<Expr> = Vec::new();
    for e in exprs {
        let nested = match e {
            Expr::Or(inner) if is_or => inner,
            Expr::And(inner) if !is_or => inner,
            other => vec![other],
        };
        for n in nested {
            match n.as_bool_literal() {
                Some(b) if b == is_or => return Expr::Literal(ScalarValue::Bool(is_or)),
                Some(_) => continue,
                None => {
                    if !kept.contains(&n) {
                        kept.push(n);
                    }
                }
            }
        }
    }
    match kept.len() {
        0 => Expr::Literal(ScalarValue::Bool(!is_or)),
        1 => kept.remove(0),
        _ if kept.iter().all(|e| matches!(e, Expr::Literal(ScalarValue::Null))) => Expr::Literal(ScalarValue::Null),
        _ if is_or => Expr::Or(kept),
        _ => Expr::And(kept),
    }
}

fn eval_binary(op: BinaryOp, left: &ScalarValue, right: &ScalarValue) -> Option<ScalarValue> {
    if left.is_null() || right.is_null() {
        return Some(ScalarValue::Null);
    }
    if op.is_comparison() {
        let ord = left.compare(right)?;
        let result = match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::NotEq => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::LtEq => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            BinaryOp::GtEq => ord != Ordering::Less,
            _ => return None,
        };
        return Some(ScalarValue::Bool(result));
    }

    if let (ScalarValue::Int32(a), ScalarValue::Int32(b)) = (left, right) {
        let v = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div => a.checked_div(*b),
            _ => None,
        };
        return v.map(ScalarValue::Int32);
    }
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        let v = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => None,
        };
        return v.map(ScalarValue::Int64);
    }
    let (a, b) = (left.as_f64()?, right.as_f64()?);
    let v = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b != 0.0 => a / b,
        _ => return None,
    };
    v.is_finite().then(|| ScalarValue::from(v))
}

fn eval_unary(op: UnaryOp, value: &ScalarValue) -> Option<ScalarValue> {
    match op {
        UnaryOp::IsNull => Some(ScalarValue::Bool(value.is_null())),
        UnaryOp::IsNotNull => Some(ScalarValue::Bool(!value.is_null())),
        UnaryOp::Not => match value {
            ScalarValue::Null => Some(ScalarValue::Null),
            ScalarValue::Bool(b) => Some(ScalarValue::Bool(!b)),
            _ => None,
        },
        UnaryOp::Neg => match value {
            ScalarValue::Null => Some(ScalarValue::Null),
            ScalarValue::Int32(v) => v.checked_neg().map(ScalarValue::Int32),
            ScalarValue::Int64(v) => v.checked_neg().map(ScalarValue::Int64),
            ScalarValue::Float64(v) => Some(ScalarValue::from(-v.0)),
            _ => None,
        },
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{c}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {operand}"),
                UnaryOp::Neg => write!(f, "-{operand}"),
                UnaryOp::IsNull => write!(f, "isnull({operand})"),
                UnaryOp::IsNotNull => write!(f, "isnotnull({operand})"),
            },
            Expr::And(exprs) | Expr::Or(exprs) => {
                let sep = if matches!(self, Expr::And(_)) { " AND " } else { " OR " };
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(sep))
            }
            Expr::Aggregate { func, arg, distinct } => {
                if *distinct {
                    write!(f, "{func}(DISTINCT {arg})")
                } else {
                    write!(f, "{func}({arg})")
                }
            }
            Expr::Alias { expr, name } => write!(f, "{expr} AS {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_type_widens_numerics_only() {
        assert_eq!(DataType::common_type(DataType::Int32, DataType::Float64), Some(DataType::Float64));
        assert_eq!(DataType::common_type(DataType::Int64, DataType::Int32), Some(DataType::Int64));
        assert_eq!(DataType::common_type(DataType::Null, DataType::Utf8), Some(DataType::Utf8));
        assert_eq!(DataType::common_type(DataType::Utf8, DataType::Int64), None);
        assert_eq!(DataType::common_type(DataType::Date, DataType::Utf8), None);
    }

    #[test]
    fn test_evaluate_constant_requires_no_columns() {
        assert_eq!(lit(1i64).add(lit(2i64)).evaluate_constant(), Some(ScalarValue::Int64(3)));
        assert_eq!(col("a").add(lit(2i64)).evaluate_constant(), None);
        assert_eq!(lit(2i32).gt(lit(1.5)).evaluate_constant(), Some(ScalarValue::Bool(true)));
        assert_eq!(lit(1i64).div(lit(0i64)).evaluate_constant(), None);
    }

    #[test]
    fn test_three_valued_logic() {
        let null = Expr::Literal(ScalarValue::Null);
        assert_eq!(null.clone().and(lit(false)).evaluate_constant(), Some(ScalarValue::Bool(false)));
        assert_eq!(null.clone().and(lit(true)).evaluate_constant(), Some(ScalarValue::Null));
        assert_eq!(null.clone().or(lit(true)).evaluate_constant(), Some(ScalarValue::Bool(true)));
        assert_eq!(null.clone().gt(lit(1i64)).evaluate_constant(), Some(ScalarValue::Null));
        assert_eq!(null.is_null().evaluate_constant(), Some(ScalarValue::Bool(true)));
    }

    #[test]
    fn test_fold_simplifies_connectives() {
        let pred = col("a").gt(lit(1i64).add(lit(1i64))).and(lit(true));
        assert_eq!(pred.fold(), col("a").gt(lit(2i64)));

        let dup = Expr::And(vec![col("a").gt(lit(2i64)), col("a").gt(lit(2i64))]);
        assert_eq!(dup.fold(), col("a").gt(lit(2i64)));

        let short = col("a").gt(lit(2i64)).or(lit(2i64).gt(lit(1i64)));
        assert_eq!(short.fold(), lit(true));
    }

    #[test]
    fn test_conjunction_flattens_and_dedups() {
        let p = col("x").gt(lit(2i64));
        let combined = Expr::conjunction(vec![p.clone(), p.clone().and(col("y").is_not_null())]).unwrap();
        assert_eq!(combined, Expr::And(vec![p, col("y").is_not_null()]));
        assert_eq!(Expr::conjunction(Vec::new()), None);
    }

    #[test]
    fn test_substitute_replaces_mapped_columns() {
        let mut mapping = HashMap::new();
        mapping.insert(ColumnRef::new("total"), col("price").mul(col("qty")).alias("total"));
        let pred = col("total").gt(lit(10i64));
        assert_eq!(pred.substitute(&mapping), col("price").mul(col("qty")).gt(lit(10i64)));
    }

    #[test]
    fn test_parse_date_literal() {
        assert_eq!(ScalarValue::parse_date("1970-01-02"), Some(ScalarValue::Date(1)));
        assert_eq!(ScalarValue::parse_date("2021-01-22").unwrap().to_string(), "DATE '2021-01-22'");
        assert_eq!(ScalarValue::parse_date("22/01/2021"), None);
    }
}
