//! Shared fixtures for rule tests.

use relopt_core::analyzer::analyze;
use relopt_core::catalog::InMemoryCatalog;
use relopt_core::expr::DataType;
use relopt_core::plan::LogicalPlan;

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
        .set_row_count("tiendas", 50.0)
        .set_row_count("empleados", 200.0)
        .set_row_count("t1", 1000.0)
        .set_row_count("t2", 10.0)
        .set_row_count("t3", 500.0);
    catalog
}

/// Analyze a raw plan against [`catalog`].
pub fn analyzed(raw: LogicalPlan) -> LogicalPlan {
    analyze(&raw, &catalog()).expect("fixture plan should analyze").plan
}
