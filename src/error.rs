//! # Error Handling
//!
//! Two layers live here. [`PipelineError`] classifies failures inside the SEO
//! pipeline; pipeline operations catch these themselves and degrade to a safe
//! typed result. [`ApiError`] is the problem+json body returned by the thin HTTP
//! wrapper.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Failure taxonomy for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required configuration (credentials, endpoints) is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A read against the store failed.
    #[error("upstream query failed during {operation}: {source}")]
    UpstreamQuery {
        operation: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },

    /// An upsert or update against the store failed.
    #[error("upstream write failed during {operation}: {source}")]
    UpstreamWrite {
        operation: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },

    /// The indexing API (token exchange or publish call) rejected or failed a request.
    #[error("external submission failed: {message}")]
    ExternalSubmission {
        status: Option<u16>,
        message: String,
    },
}

impl PipelineError {
    pub fn query(operation: &'static str, source: sea_orm::DbErr) -> Self {
        Self::UpstreamQuery { operation, source }
    }

    pub fn write(operation: &'static str, source: sea_orm::DbErr) -> Self {
        Self::UpstreamWrite { operation, source }
    }

    /// True for failures that should be retried on a later run.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Configuration(_) => false,
            PipelineError::UpstreamQuery { .. } | PipelineError::UpstreamWrite { .. } => true,
            PipelineError::ExternalSubmission { status, .. } => {
                !matches!(status, Some(code) if (400..500).contains(code) && *code != 429)
            }
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        PipelineError::ExternalSubmission {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation ID for matching the response to server logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Some(
                format!("corr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
                    .into_boxed_str(),
            ),
        }
    }

    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(error: sea_orm::DbErr) -> Self {
        match error {
            sea_orm::DbErr::RecordNotFound(record) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Record not found: {}", record),
            ),
            sea_orm::DbErr::Conn(connection_err) => {
                tracing::error!("Database connection error: {:?}", connection_err);
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service unavailable",
                )
            }
            other => {
                tracing::error!("Database error: {:?}", other);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Database error occurred",
                )
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Configuration(message) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "CONFIGURATION_ERROR",
                &message,
            ),
            PipelineError::UpstreamQuery { source, .. }
            | PipelineError::UpstreamWrite { source, .. } => source.into(),
            PipelineError::ExternalSubmission { status, message } => {
                tracing::warn!(?status, %message, "indexing API error surfaced to caller");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "INDEXING_API_ERROR",
                    "Indexing API request failed",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_with_details() {
        let error = ApiError::bad_request("bad input").with_details(json!({"field": "entityId"}));

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.details, Some(Box::new(json!({"field": "entityId"}))));
    }

    #[test]
    fn test_content_type_header_and_status() {
        let response = ApiError::not_found("missing").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_trace_id_format() {
        let error = ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "X", "y");
        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_database_error_mapping() {
        let api_error: ApiError = sea_orm::DbErr::RecordNotFound("city".to_string()).into();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);

        let api_error: ApiError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_pipeline_error_retryability() {
        let rejected = PipelineError::ExternalSubmission {
            status: Some(403),
            message: "permission denied".to_string(),
        };
        assert!(!rejected.is_retryable());

        let throttled = PipelineError::ExternalSubmission {
            status: Some(429),
            message: "quota".to_string(),
        };
        assert!(throttled.is_retryable());

        let network = PipelineError::ExternalSubmission {
            status: None,
            message: "connection reset".to_string(),
        };
        assert!(network.is_retryable());

        assert!(!PipelineError::Configuration("missing key".to_string()).is_retryable());
    }

    #[test]
    fn test_pipeline_error_maps_to_api_error() {
        let api_error: ApiError = PipelineError::Configuration("no credentials".into()).into();
        assert_eq!(api_error.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api_error.code, Box::from("CONFIGURATION_ERROR"));
    }
}
