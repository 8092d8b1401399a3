//! # Scan Implementation
//!
//! A logical scan becomes a `FileScan`. The reader is told two things that
//! let it skip I/O:
//!
//! - **Pruned columns**: the names of the columns the scan's projection keeps,
//!   in output order. Columns outside the list are never decoded.
//! - **Pushed filters**: predicates the reader may use to skip row groups
//!   (e.g. from min/max footer statistics). They are bound to ordinals of the
//!   full file schema, since they can reference columns outside the
//!   projection's positions.
//!
//! Pushed filters are a hint by default: the filter above the scan still
//! evaluates the whole predicate. With `trust_pushed_filters` the reader is
//! assumed to apply them exactly and only the remaining conjuncts are kept.

use relopt_core::error::SchemaError;
use relopt_core::expr::Expr;
use relopt_core::physical::{bind_expr, PhysicalPlan};
use relopt_core::plan::TableScan;

pub fn implement_scan(scan: &TableScan) -> Result<PhysicalPlan, SchemaError> {
    let schema = scan.schema()?;
    let pushed_filters = scan
        .pushed_filters
        .iter()
        .map(|f| bind_expr(f, &scan.source_schema))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PhysicalPlan::FileScan {
        table: scan.table.clone(),
        pruned_columns: schema.names(),
        pushed_filters,
        schema,
    })
}

/// The part of `predicate` a `FilterExec` above the scan still evaluates.
/// `None` when nothing is left.
pub fn residual_predicate(predicate: &Expr, pushed: &[Expr], trust_pushed_filters: bool) -> Option<Expr> {
    if !trust_pushed_filters {
        return Some(predicate.clone());
    }
    Expr::conjunction(
        predicate
            .conjuncts()
            .into_iter()
            .filter(|c| !pushed.contains(c))
            .cloned(),
    )
}
