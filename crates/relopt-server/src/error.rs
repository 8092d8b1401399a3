//! # API Errors
//!
//! Planner errors as HTTP responses. A query the analyzer rejects is the
//! client's fault (400); a malformed tree found after analysis is ours (500).
//! Either way the body is `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[source] relopt_core::Error),
    #[error("internal planner error: {0}")]
    Internal(#[source] relopt_core::Error),
}

impl From<relopt_core::Error> for ApiError {
    fn from(err: relopt_core::Error) -> Self {
        match err {
            relopt_core::Error::Analysis(_) | relopt_core::Error::Catalog(_) => ApiError::InvalidQuery(err),
            relopt_core::Error::Schema(_) => ApiError::Internal(err),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref inner) = self {
            error!(error = %inner, "planning failed on an analyzed plan");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::error::{AnalysisError, CatalogError, SchemaError};

    #[test]
    fn test_query_errors_are_bad_requests() {
        let analysis: ApiError = relopt_core::Error::Analysis(AnalysisError::UnresolvedColumn("x".into())).into();
        assert_eq!(analysis.status(), StatusCode::BAD_REQUEST);
        assert!(analysis.to_string().starts_with("invalid query: "));

        let catalog: ApiError = relopt_core::Error::Catalog(CatalogError::TableNotFound("t".into())).into();
        assert_eq!(catalog.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_schema_errors_are_internal() {
        let err: ApiError = relopt_core::Error::Schema(SchemaError::ColumnNotFound("x".into())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_carries_status() {
        let err: ApiError = relopt_core::Error::Analysis(AnalysisError::UnresolvedTable("nope".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
