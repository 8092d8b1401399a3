//! # Aggregate Implementation
//!
//! Every logical aggregate becomes a `HashAggregateExec`: rows are routed to a
//! hash table keyed by the grouping expressions and folded into per-group
//! accumulators. It works on any input order, so no sort is ever required.
//! With no grouping keys it emits exactly one row, even over empty input.

use relopt_core::error::SchemaError;
use relopt_core::expr::Expr;
use relopt_core::physical::{bind_expr, PhysicalPlan};
use relopt_core::schema::Schema;

/// Build the physical aggregate over `input`. Expressions are bound against
/// `input_schema`, the logical schema of the aggregate's child.
pub fn implement_aggregate(
    input: PhysicalPlan,
    input_schema: &Schema,
    group_by: &[Expr],
    aggregates: &[Expr],
    output_schema: Schema,
) -> Result<PhysicalPlan, SchemaError> {
    let bind_all = |exprs: &[Expr]| {
        exprs
            .iter()
            .map(|e| bind_expr(e, input_schema))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(PhysicalPlan::HashAggregateExec {
        input: Box::new(input),
        group_by: bind_all(group_by)?,
        aggregates: bind_all(aggregates)?,
        schema: output_schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::expr::{qcol, sum, DataType};
    use relopt_core::schema::Field;

    #[test]
    fn test_keys_and_arguments_are_bound() {
        let input_schema = Schema::new(vec![
            Field::new("TIENDA", DataType::Utf8).with_relation(Some("ventas".into())),
            Field::new("MONTO", DataType::Int64).with_relation(Some("ventas".into())),
        ]);
        let input = PhysicalPlan::EmptyExec {
            schema: input_schema.clone(),
        };
        let output = Schema::new(vec![
            Field::new("TIENDA", DataType::Utf8).with_relation(Some("ventas".into())),
            Field::new("total", DataType::Int64),
        ]);
        let agg = implement_aggregate(
            input,
            &input_schema,
            &[qcol("ventas", "TIENDA")],
            &[sum(qcol("ventas", "MONTO")).alias("total")],
            output.clone(),
        )
        .unwrap();
        assert_eq!(
            agg.display_indent().lines().next(),
            Some("HashAggregate(keys=[ventas.TIENDA#0], functions=[sum(ventas.MONTO#1) AS total])")
        );
        assert_eq!(agg.schema(), output);
    }
}
