//! HTTP error mapping for tenancy failures.
//!
//! | Error | HTTP Status | Code |
//! |-------|-------------|------|
//! | ProfileUnavailable | configured (403 by default) | profile-unavailable |
//! | MissingTenant | 403 | tenant-required |
//! | DoesNotExist | 404 | not-found |
//! | UnknownColumn / DuplicateAlias / EmptyUpdate / UnsupportedValue | 400 | invalid |
//! | MultipleObjectsReturned / MissingValue | 500 | exception |
//! | Config / Resolution | 500 | configuration |
//! | Backend | 500 | exception |
//!
//! Bodies are JSON: `{"error": {"code": "...", "message": "..."}}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_tenancy::TenancyError;
use helios_tenancy::error::{ContextError, QueryError};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the tenancy HTTP layer.
#[derive(Debug, Error)]
pub enum HttpError {
    /// An error raised by the tenancy engine.
    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    /// The tenant context could not be established for the request.
    #[error("{source}")]
    Propagation {
        /// Status to answer with.
        status: StatusCode,
        /// The underlying failure.
        #[source]
        source: ContextError,
    },
}

/// Result type for handlers using this layer.
pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    /// Wraps a propagation failure with the status configured for it.
    pub fn propagation(source: ContextError, status: StatusCode) -> Self {
        HttpError::Propagation { status, source }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::Propagation { status, .. } => *status,
            HttpError::Tenancy(err) => match err {
                TenancyError::Context(_) => StatusCode::FORBIDDEN,
                TenancyError::Query(QueryError::DoesNotExist { .. }) => StatusCode::NOT_FOUND,
                TenancyError::Query(
                    QueryError::UnknownColumn { .. }
                    | QueryError::DuplicateAlias { .. }
                    | QueryError::EmptyUpdate { .. }
                    | QueryError::UnsupportedValue { .. },
                ) => StatusCode::BAD_REQUEST,
                TenancyError::Query(_)
                | TenancyError::Config(_)
                | TenancyError::Resolution(_)
                | TenancyError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            HttpError::Propagation { .. } => "profile-unavailable",
            HttpError::Tenancy(err) => match err {
                TenancyError::Context(ContextError::ProfileUnavailable { .. }) => {
                    "profile-unavailable"
                }
                TenancyError::Context(ContextError::MissingTenant { .. }) => "tenant-required",
                TenancyError::Config(_) | TenancyError::Resolution(_) => "configuration",
                TenancyError::Query(QueryError::DoesNotExist { .. }) => "not-found",
                TenancyError::Query(
                    QueryError::UnknownColumn { .. }
                    | QueryError::DuplicateAlias { .. }
                    | QueryError::EmptyUpdate { .. }
                    | QueryError::UnsupportedValue { .. },
                ) => "invalid",
                TenancyError::Query(_) | TenancyError::Backend(_) => "exception",
            },
        }
    }
}

impl From<ContextError> for HttpError {
    fn from(err: ContextError) -> Self {
        HttpError::Tenancy(err.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Tenancy request failed");
        }

        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_tenancy::error::{ConfigError, ResolutionError};

    #[test]
    fn test_propagation_uses_configured_status() {
        let err = HttpError::propagation(
            ContextError::ProfileUnavailable {
                actor: "alice".to_string(),
                reason: "no profile attached".to_string(),
            },
            StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "profile-unavailable");
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn test_missing_tenant_is_forbidden() {
        let err = HttpError::from(ContextError::MissingTenant {
            table: "products".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "tenant-required");
    }

    #[test]
    fn test_query_errors() {
        let not_found = HttpError::from(TenancyError::from(QueryError::DoesNotExist {
            entity: "Product".to_string(),
        }));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let invalid = HttpError::from(TenancyError::from(QueryError::UnknownColumn {
            entity: "Product".to_string(),
            column: "price".to_string(),
        }));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "invalid");
    }

    #[test]
    fn test_schema_errors_are_server_errors() {
        let unregistered = HttpError::from(TenancyError::from(ResolutionError::TableNotRegistered {
            table: "ghosts".to_string(),
        }));
        assert_eq!(unregistered.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unregistered.code(), "configuration");

        let invalid = HttpError::from(TenancyError::from(ConfigError::Invalid {
            message: "bad".to_string(),
        }));
        assert_eq!(invalid.code(), "configuration");
    }

    #[test]
    fn test_into_response_status() {
        let response = HttpError::from(ContextError::MissingTenant {
            table: "products".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
