//! Shared fixtures for the end-to-end tests: a catalog with row counts, a
//! small dataset for it, and a naive row interpreter for logical plans.
//!
//! The interpreter evaluates every plan node literally (nested-loop joins,
//! linear-scan grouping). It is only used to check that two plans produce
//! the same rows.

#![allow(dead_code)]

use relopt_core::catalog::InMemoryCatalog;
use relopt_core::expr::{lit, AggFunc, DataType, Expr, ScalarValue};
use relopt_core::plan::{JoinType, LogicalPlan};
use relopt_core::schema::Schema;
use std::cmp::Ordering;
use std::collections::HashMap;

pub type Row = Vec<ScalarValue>;

// ---------------------------------------------------------------------------
// Catalog and data
// ---------------------------------------------------------------------------

pub fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog
        .add_table(
            "ventas",
            &[
                ("MONTO", DataType::Int64),
                ("FECHA", DataType::Date),
                ("TIENDA", DataType::Utf8),
                ("PRODUCTO", DataType::Utf8),
            ],
        )
        .add_table(
            "empleados",
            &[
                ("id", DataType::Int64),
                ("nombre", DataType::Utf8),
                ("salario", DataType::Float64),
                ("depto", DataType::Utf8),
            ],
        )
        .add_table("tiendas", &[("TIENDA", DataType::Utf8), ("CIUDAD", DataType::Utf8)])
        .add_table("t1", &[("a", DataType::Int64), ("x", DataType::Int64)])
        .add_table("t2", &[("a", DataType::Int64), ("b", DataType::Int64)])
        .add_table("t3", &[("b", DataType::Int64), ("y", DataType::Int64)])
        .set_row_count("ventas", 1_000_000.0)
        .set_row_count("empleados", 200.0)
        .set_row_count("tiendas", 50.0)
        .set_row_count("t1", 1000.0)
        .set_row_count("t2", 10.0)
        .set_row_count("t3", 500.0);
    catalog
}

fn date(text: &str) -> ScalarValue {
    ScalarValue::parse_date(text).unwrap_or(ScalarValue::Null)
}

fn s(text: &str) -> ScalarValue {
    ScalarValue::from(text)
}

fn i(v: i64) -> ScalarValue {
    ScalarValue::Int64(v)
}

pub struct Dataset {
    tables: HashMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

pub fn dataset() -> Dataset {
    let mut tables = HashMap::new();
    tables.insert(
        "ventas".to_string(),
        vec![
            vec![i(1), date("2021-01-01"), s("A"), s("pan")],
            vec![i(3), date("2021-01-15"), s("A"), s("leche")],
            vec![i(5), date("2021-02-01"), s("B"), s("pan")],
            vec![i(10), date("2021-02-20"), s("C"), s("queso")],
            vec![ScalarValue::Null, date("2021-03-01"), s("B"), s("leche")],
            vec![i(2), ScalarValue::Null, s("D"), s("pan")],
        ],
    );
    tables.insert(
        "empleados".to_string(),
        vec![
            vec![i(1), s("Ana"), ScalarValue::from(1200.0), s("ventas")],
            vec![i(2), s("Luis"), ScalarValue::from(900.5), s("ventas")],
            vec![i(3), s("Marta"), ScalarValue::Null, s("compras")],
        ],
    );
    tables.insert(
        "tiendas".to_string(),
        vec![
            vec![s("A"), s("Lima")],
            vec![s("B"), s("Cusco")],
            vec![s("C"), s("Lima")],
        ],
    );
    tables.insert("t1".to_string(), vec![vec![i(1), i(10)], vec![i(2), i(20)], vec![i(3), i(30)]]);
    tables.insert("t2".to_string(), vec![vec![i(1), i(7)], vec![i(2), i(8)], vec![i(2), i(9)]]);
    tables.insert("t3".to_string(), vec![vec![i(7), i(70)], vec![i(9), i(90)], vec![i(9), i(91)]]);
    Dataset { tables }
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// Evaluate `expr` over one row of `schema`. Runtime errors evaluate to NULL.
pub fn eval(expr: &Expr, schema: &Schema, row: &[ScalarValue]) -> ScalarValue {
    let bound = expr.clone().transform_up(&mut |e| match e {
        Expr::Column(c) => {
            let idx = schema.index_of(&c).unwrap_or_else(|err| panic!("{err} in {schema}"));
            Expr::Literal(row[idx].clone())
        }
        other => other,
    });
    bound.evaluate_constant().unwrap_or(ScalarValue::Null)
}

fn is_true(v: &ScalarValue) -> bool {
    *v == ScalarValue::Bool(true)
}

fn aggregate_values(func: AggFunc, values: Vec<ScalarValue>) -> ScalarValue {
    let pick = |wanted: Ordering| {
        move |a: ScalarValue, b: ScalarValue| if b.compare(&a) == Some(wanted) { b } else { a }
    };
    let count = values.len();
    match func {
        AggFunc::Count => ScalarValue::Int64(count as i64),
        AggFunc::Min => values.into_iter().reduce(pick(Ordering::Less)).unwrap_or(ScalarValue::Null),
        AggFunc::Max => values.into_iter().reduce(pick(Ordering::Greater)).unwrap_or(ScalarValue::Null),
        AggFunc::Sum | AggFunc::Avg => {
            let total = values
                .into_iter()
                .reduce(|a, b| lit(a).add(lit(b)).evaluate_constant().unwrap_or(ScalarValue::Null))
                .unwrap_or(ScalarValue::Null);
            if func == AggFunc::Sum || total.is_null() {
                total
            } else {
                lit(total)
                    .div(lit(count as f64))
                    .evaluate_constant()
                    .unwrap_or(ScalarValue::Null)
            }
        }
    }
}

/// Replace aggregate calls by their value over `members` and bare columns by
/// their value in the first member.
fn bind_group(expr: &Expr, schema: &Schema, members: &[Row]) -> Expr {
    let bind = |e: &Expr| Box::new(bind_group(e, schema, members));
    match expr {
        Expr::Aggregate { func, arg, distinct } => {
            let mut values: Vec<ScalarValue> = Vec::new();
            for v in members.iter().map(|r| eval(arg, schema, r)) {
                if !v.is_null() && !(*distinct && values.contains(&v)) {
                    values.push(v);
                }
            }
            Expr::Literal(aggregate_values(*func, values))
        }
        Expr::Column(_) => Expr::Literal(
            members
                .first()
                .map_or(ScalarValue::Null, |row| eval(expr, schema, row)),
        ),
        Expr::Literal(_) => expr.clone(),
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: *op,
            left: bind(left),
            right: bind(right),
        },
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op: *op,
            operand: bind(operand),
        },
        Expr::And(exprs) => Expr::And(exprs.iter().map(|e| bind_group(e, schema, members)).collect()),
        Expr::Or(exprs) => Expr::Or(exprs.iter().map(|e| bind_group(e, schema, members)).collect()),
        Expr::Alias { expr, name } => Expr::Alias {
            expr: bind(expr),
            name: name.clone(),
        },
    }
}

pub fn execute(plan: &LogicalPlan, data: &Dataset) -> Vec<Row> {
    match plan {
        LogicalPlan::Scan(scan) => {
            let indices = scan.output_indices();
            data.rows(&scan.table)
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect()
        }
        LogicalPlan::Filter { input, predicate } => {
            let schema = input.schema().expect("filter input schema");
            execute(input, data)
                .into_iter()
                .filter(|row| is_true(&eval(predicate, &schema, row)))
                .collect()
        }
        LogicalPlan::Project { input, exprs } => {
            let schema = input.schema().expect("project input schema");
            execute(input, data)
                .iter()
                .map(|row| exprs.iter().map(|e| eval(e, &schema, row)).collect())
                .collect()
        }
        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => {
            let left_schema = left.schema().expect("left schema");
            let right_schema = right.schema().expect("right schema");
            let combined = left_schema.join(&right_schema);
            let (left_rows, right_rows) = (execute(left, data), execute(right, data));
            let concat = |l: &Row, r: &Row| -> Row { l.iter().chain(r.iter()).cloned().collect() };
            let matches = |l: &Row, r: &Row| {
                condition
                    .as_ref()
                    .map_or(true, |c| is_true(&eval(c, &combined, &concat(l, r))))
            };

            let mut out = Vec::new();
            if matches!(join_type, JoinType::Semi | JoinType::Anti) {
                for l in &left_rows {
                    let found = right_rows.iter().any(|r| matches(l, r));
                    if found == (*join_type == JoinType::Semi) {
                        out.push(l.clone());
                    }
                }
                return out;
            }
            let mut right_matched = vec![false; right_rows.len()];
            for l in &left_rows {
                let mut matched = false;
                for (j, r) in right_rows.iter().enumerate() {
                    if matches(l, r) {
                        matched = true;
                        right_matched[j] = true;
                        out.push(concat(l, r));
                    }
                }
                if !matched && matches!(join_type, JoinType::Left | JoinType::Full) {
                    out.push(concat(l, &vec![ScalarValue::Null; right_schema.len()]));
                }
            }
            if matches!(join_type, JoinType::Right | JoinType::Full) {
                for (j, r) in right_rows.iter().enumerate() {
                    if !right_matched[j] {
                        out.push(concat(&vec![ScalarValue::Null; left_schema.len()], r));
                    }
                }
            }
            out
        }
        LogicalPlan::Aggregate {
            input,
            group_by,
            aggregates,
        } => {
            let schema = input.schema().expect("aggregate input schema");
            let mut groups: Vec<(Row, Vec<Row>)> = Vec::new();
            for row in execute(input, data) {
                let key: Row = group_by.iter().map(|g| eval(g, &schema, &row)).collect();
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, members)) => members.push(row),
                    None => groups.push((key, vec![row])),
                }
            }
            if group_by.is_empty() && groups.is_empty() {
                groups.push((Vec::new(), Vec::new()));
            }
            groups
                .into_iter()
                .map(|(mut key, members)| {
                    for a in aggregates {
                        let bound = bind_group(a, &schema, &members);
                        key.push(bound.evaluate_constant().unwrap_or(ScalarValue::Null));
                    }
                    key
                })
                .collect()
        }
        LogicalPlan::SubqueryAlias { input, .. } => execute(input, data),
        LogicalPlan::Empty { .. } => Vec::new(),
    }
}

/// Result rows in a canonical order, for multiset comparison.
pub fn sorted_rows(plan: &LogicalPlan, data: &Dataset) -> Vec<Row> {
    let mut rows = execute(plan, data);
    rows.sort_by_key(|r| format!("{r:?}"));
    rows
}

// ---------------------------------------------------------------------------
// Plan inspection
// ---------------------------------------------------------------------------

pub fn count_nodes(plan: &LogicalPlan, pred: &dyn Fn(&LogicalPlan) -> bool) -> usize {
    usize::from(pred(plan)) + plan.children().iter().map(|c| count_nodes(c, pred)).sum::<usize>()
}

/// Scanned tables, left to right.
pub fn scan_order(plan: &LogicalPlan) -> Vec<String> {
    match plan {
        LogicalPlan::Scan(scan) => vec![scan.table.clone()],
        other => other.children().into_iter().flat_map(scan_order).collect(),
    }
}
