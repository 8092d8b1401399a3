//! # Catalog Interface
//!
//! The planner talks to two read-only collaborators:
//!
//! - [`Catalog`]: table schemas, consulted by the analyzer.
//! - [`StatisticsProvider`]: table row-count estimates, consulted by join
//!   reordering and join strategy selection. An estimate may be unavailable;
//!   callers then fall back to statistics-free behavior.
//!
//! Both are `Send + Sync` trait objects so one instance can serve concurrent
//! planning requests. [`InMemoryCatalog`] implements both and is populated
//! programmatically for tests and the HTTP service.

use crate::error::CatalogError;
use crate::expr::DataType;
use crate::schema::{Field, Schema};
use crate::stats::Statistics;
use std::collections::HashMap;

/// Catalog provides table schemas.
pub trait Catalog: Send + Sync {
    /// Schema of `table`. Table names match exactly, case included.
    fn schema_of(&self, table: &str) -> Result<Schema, CatalogError>;
}

/// Source of table-level estimates.
pub trait StatisticsProvider: Send + Sync {
    fn row_count_estimate(&self, table: &str) -> Option<f64>;

    /// Full statistics for `table`. Defaults to row count only.
    fn table_statistics(&self, table: &str) -> Option<Statistics> {
        self.row_count_estimate(table).map(Statistics::new)
    }
}

/// In-memory catalog for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    table_schemas: HashMap<String, Schema>,
    table_stats: HashMap<String, Statistics>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table from `(name, type)` pairs, without statistics.
    pub fn add_table(&mut self, table: impl Into<String>, columns: &[(&str, DataType)]) -> &mut Self {
        let schema = Schema::new(columns.iter().map(|(n, t)| Field::new(*n, *t)).collect());
        self.add_table_schema(table, schema)
    }

    pub fn add_table_schema(&mut self, table: impl Into<String>, schema: Schema) -> &mut Self {
        self.table_schemas.insert(table.into(), schema);
        self
    }

    pub fn set_row_count(&mut self, table: impl Into<String>, rows: f64) -> &mut Self {
        let table = table.into();
        match self.table_stats.get_mut(&table) {
            Some(stats) => stats.row_count = rows,
            None => {
                self.table_stats.insert(table, Statistics::new(rows));
            }
        }
        self
    }

    pub fn set_statistics(&mut self, table: impl Into<String>, stats: Statistics) -> &mut Self {
        self.table_stats.insert(table.into(), stats);
        self
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.table_schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Catalog for InMemoryCatalog {
    fn schema_of(&self, table: &str) -> Result<Schema, CatalogError> {
        self.table_schemas
            .get(table)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))
    }
}

impl StatisticsProvider for InMemoryCatalog {
    fn row_count_estimate(&self, table: &str) -> Option<f64> {
        self.table_stats.get(table).map(|s| s.row_count)
    }

    fn table_statistics(&self, table: &str) -> Option<Statistics> {
        self.table_stats.get(table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::ColumnStatistics;

    #[test]
    fn test_lookup_is_exact() {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table("ventas", &[("MONTO", DataType::Int64)])
            .set_row_count("ventas", 42.0);
        assert_eq!(catalog.schema_of("ventas").unwrap().names(), vec!["MONTO"]);
        assert_eq!(
            catalog.schema_of("VENTAS"),
            Err(CatalogError::TableNotFound("VENTAS".into()))
        );
        assert_eq!(catalog.row_count_estimate("ventas"), Some(42.0));
        assert_eq!(catalog.row_count_estimate("otra"), None);
    }

    #[test]
    fn test_row_count_update_keeps_column_statistics() {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table("tiendas", &[("TIENDA", DataType::Utf8)])
            .set_statistics(
                "tiendas",
                Statistics::new(50.0).with_column("TIENDA", ColumnStatistics::new(50.0, 0.0)),
            )
            .set_row_count("tiendas", 60.0);
        let stats = catalog.table_statistics("tiendas").unwrap();
        assert_eq!(stats.row_count, 60.0);
        assert!(stats.column_stats.contains_key("TIENDA"));
    }
}
