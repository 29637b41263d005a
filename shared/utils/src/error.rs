use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum StudyError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Document processing error: {message}")]
    DocumentProcessing { message: String },

    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Malformed artifact: {message}")]
    MalformedArtifact { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl StudyError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn document_processing(message: impl Into<String>) -> Self {
        Self::DocumentProcessing {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn malformed_artifact(message: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DocumentProcessing { .. } => "DOCUMENT_PROCESSING_ERROR",
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::MalformedArtifact { .. } => "MALFORMED_ARTIFACT",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::DocumentProcessing { .. } => 422,
            Self::Generation { .. } => 500,
            Self::MalformedArtifact { .. } => 502,
            Self::Configuration { .. } => 500,
            Self::Io { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Message safe to hand back to a client. Server-side failures collapse
    /// to a generic sentence; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::DocumentProcessing { message } => message.clone(),
            Self::Generation { .. } => "Failed to generate a response. Please try again.".to_string(),
            Self::MalformedArtifact { .. } => {
                "The generation service returned an unreadable study guide.".to_string()
            }
            Self::Configuration { .. } | Self::Io { .. } | Self::Internal { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

pub type StudyResult<T> = Result<T, StudyError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<&StudyError> for ErrorResponse {
    fn from(error: &StudyError) -> Self {
        Self {
            error: error.public_message(),
            code: error.error_code().to_string(),
        }
    }
}

impl IntoResponse for StudyError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "request rejected");
        }

        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

// Conversion from common error types
impl From<std::io::Error> for StudyError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for StudyError {
    fn from(error: reqwest::Error) -> Self {
        Self::generation(error.to_string())
    }
}

impl From<serde_json::Error> for StudyError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed_artifact(error.to_string())
    }
}

impl From<handlebars::RenderError> for StudyError {
    fn from(error: handlebars::RenderError) -> Self {
        Self::internal(format!("prompt rendering failed: {}", error))
    }
}

impl From<lopdf::Error> for StudyError {
    fn from(error: lopdf::Error) -> Self {
        Self::document_processing(error.to_string())
    }
}

impl From<image::ImageError> for StudyError {
    fn from(error: image::ImageError) -> Self {
        Self::document_processing(error.to_string())
    }
}

impl From<config::ConfigError> for StudyError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
