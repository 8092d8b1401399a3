//! # Error Taxonomy
//!
//! - [`SchemaError`]: raised by schema inference over a plan tree. Always
//!   indicates a malformed tree.
//! - [`CatalogError`]: raised by catalog lookups.
//! - [`AnalysisError`]: raised by the analyzer before optimization begins.
//!   Column and type errors found during schema inference are reported under
//!   their analysis names (`UnresolvedColumn`, `AmbiguousReference`, ...).
//!
//! Reaching the optimizer's iteration cap is not an error; it is logged.

use crate::expr::DataType;
use thiserror::Error;

/// Schema inference failure on a plan tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("ambiguous reference to column '{0}'")]
    AmbiguousColumn(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("expression '{0}' must be boolean, found {1}")]
    NonBoolean(String, DataType),
    #[error("expression '{0}' is neither a grouping key nor wrapped in an aggregate function")]
    NotAggregated(String),
    #[error("projection index {index} is out of bounds for table '{table}'")]
    ProjectionOutOfBounds { table: String, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
}

/// Failure to analyze a raw plan. Fatal; surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("cannot resolve column '{0}'")]
    UnresolvedColumn(String),
    #[error("table or view not found: {0}")]
    UnresolvedTable(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("reference '{0}' is ambiguous")]
    AmbiguousReference(String),
    #[error("aggregate function is not allowed in {0}")]
    MisplacedAggregate(String),
    #[error(transparent)]
    Schema(SchemaError),
}

impl From<SchemaError> for AnalysisError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ColumnNotFound(c) => AnalysisError::UnresolvedColumn(c),
            SchemaError::AmbiguousColumn(c) => AnalysisError::AmbiguousReference(c),
            SchemaError::TypeMismatch(m) => AnalysisError::TypeMismatch(m),
            SchemaError::NonBoolean(expr, t) => {
                AnalysisError::TypeMismatch(format!("expression '{expr}' must be boolean, found {t}"))
            }
            other => AnalysisError::Schema(other),
        }
    }
}

impl From<CatalogError> for AnalysisError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::TableNotFound(t) => AnalysisError::UnresolvedTable(t),
        }
    }
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("invalid plan: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, Error>;
