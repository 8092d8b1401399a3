//! # relopt-core: Rule-Based Query Planner Core
//!
//! This crate holds the data structures and drivers of a small relational
//! query planner. A query enters as a raw logical plan, is resolved by the
//! analyzer, rewritten by the fixed-point optimizer and finally translated to
//! a physical plan (see the `relopt-rules` crate for the rules and the
//! physical planner).
//!
//! ## Module Overview
//!
//! - **`expr`**: Scalar expressions, values and types, constant evaluation.
//! - **`schema`**: Qualified fields and column resolution.
//! - **`plan`**: Logical plan tree, schema inference and tree rewriting.
//! - **`builder`**: Fluent construction of raw plans.
//! - **`physical`**: Physical plan tree consumed by an external executor.
//! - **`analyzer`**: Name resolution and type checking against a catalog.
//! - **`rule`**: The `OptimizationRule` trait.
//! - **`optimizer`**: The fixed-point driver.
//! - **`stats`**: Statistics structures and cardinality estimation.
//! - **`catalog`**: Catalog and statistics provider traits.
//! - **`error`**: Error taxonomy.

pub mod analyzer;
pub mod builder;
pub mod catalog;
pub mod error;
pub mod expr;
pub mod optimizer;
pub mod physical;
pub mod plan;
pub mod rule;
pub mod schema;
pub mod stats;

pub use error::{AnalysisError, CatalogError, Error, Result, SchemaError};
