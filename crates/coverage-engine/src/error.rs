use crate::config::ConfigError;
use crate::coverage::export::UnknownExportFormat;
use crate::coverage::{ExportError, ExportFailure, MissingColumnError};
use crate::ingestion::IngestionError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Ingestion(IngestionError),
    Validation(MissingColumnError),
    Export(ExportError),
    UnknownFormat(UnknownExportFormat),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ingestion(IngestionError::UploadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::Ingestion(IngestionError::Csv(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Ingestion(_) => StatusCode::BAD_GATEWAY,
            AppError::UnknownFormat(_) => StatusCode::NOT_FOUND,
            AppError::Export(ExportError {
                cause: ExportFailure::TooLarge { .. },
                ..
            }) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AppError::Ingestion(err) => Some(err.suggestion()),
            AppError::Validation(_) => {
                Some("include district, vaccine_type and coverage_percentage columns")
            }
            AppError::Export(ExportError {
                cause: ExportFailure::TooLarge { .. },
                ..
            }) => Some("narrow the filters and retry, or export the text digest"),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Ingestion(err) => write!(f, "ingestion error: {}", err),
            AppError::Validation(err) => write!(f, "validation error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
            AppError::UnknownFormat(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Ingestion(err) => Some(err),
            AppError::Validation(err) => Some(err),
            AppError::Export(err) => Some(err),
            AppError::UnknownFormat(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.suggestion() {
            Some(suggestion) => json!({ "error": self.to_string(), "suggestion": suggestion }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<IngestionError> for AppError {
    fn from(value: IngestionError) -> Self {
        Self::Ingestion(value)
    }
}

impl From<MissingColumnError> for AppError {
    fn from(value: MissingColumnError) -> Self {
        Self::Validation(value)
    }
}

impl From<ExportError> for AppError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

impl From<UnknownExportFormat> for AppError {
    fn from(value: UnknownExportFormat) -> Self {
        Self::UnknownFormat(value)
    }
}
