//! Error handling for the telemetry service.
//!
//! One enum covers the whole pipeline; the HTTP layer relies on the
//! `IntoResponse` impl so every failure reaches the wire as
//! `{"error": {"code", "message"}}` with a stable machine-readable code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate payload: same source_id and external_event_id already ingested")]
    Duplicate {
        source_id: String,
        external_event_id: String,
    },

    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    #[error("Database operation failed: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit operation failed: {operation}")]
    Audit { operation: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Shorthand used throughout the crate.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

impl TelemetryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn duplicate(source_id: impl Into<String>, external_event_id: impl Into<String>) -> Self {
        Self::Duplicate {
            source_id: source_id.into(),
            external_event_id: external_event_id.into(),
        }
    }

    pub fn database(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn audit(operation: impl Into<String>) -> Self {
        Self::Audit {
            operation: operation.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code carried in every error response.
    pub fn code(&self) -> &'static str {
        match self {
            TelemetryError::Validation { .. } => "VALIDATION_ERROR",
            TelemetryError::Duplicate { .. } => "DUPLICATE",
            TelemetryError::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            TelemetryError::Database { .. }
            | TelemetryError::Serialization { .. }
            | TelemetryError::Io { .. }
            | TelemetryError::Audit { .. }
            | TelemetryError::Config { .. }
            | TelemetryError::Internal { .. } => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TelemetryError::Validation { .. } => StatusCode::BAD_REQUEST,
            TelemetryError::Duplicate { .. } => StatusCode::CONFLICT,
            TelemetryError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TelemetryError::Database { .. }
            | TelemetryError::Serialization { .. }
            | TelemetryError::Io { .. }
            | TelemetryError::Audit { .. }
            | TelemetryError::Config { .. }
            | TelemetryError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TelemetryError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<sled::Error> for TelemetryError {
    fn from(err: sled::Error) -> Self {
        TelemetryError::database("sled_operation", err)
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::serialization("json_operation", err)
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::io("io_operation", err)
    }
}
