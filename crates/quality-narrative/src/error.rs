use crate::config::ConfigError;
use crate::narrative::dataset::DatasetError;
use crate::narrative::orchestrator::{FailureKind, NarrativeFailure};
use crate::narrative::provider::ProviderError;
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
    Dataset(DatasetError),
    Provider(ProviderError),
    Guardrail(regex::Error),
    Narrative(NarrativeFailure),
}

/// HTTP status for each per-request failure kind.
pub fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::NoMatch => StatusCode::NOT_FOUND,
        FailureKind::AmbiguousMatch => StatusCode::CONFLICT,
        FailureKind::MissingVintage | FailureKind::IncompleteCatalogCoverage => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FailureKind::ProviderError => StatusCode::BAD_GATEWAY,
        FailureKind::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::GuardrailFailure => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Dataset(err) => write!(f, "dataset error: {}", err),
            AppError::Provider(err) => write!(f, "provider error: {}", err),
            AppError::Guardrail(err) => write!(f, "guardrail lexicon error: {}", err),
            AppError::Narrative(err) => write!(f, "{:?}: {}", err.kind, err),
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
            AppError::Dataset(err) => Some(err),
            AppError::Provider(err) => Some(err),
            AppError::Guardrail(err) => Some(err),
            AppError::Narrative(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Narrative(failure) = self {
            return (status_for(failure.kind), Json(failure)).into_response();
        }

        let status = match self {
            AppError::Dataset(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Guardrail(_)
            | AppError::Narrative(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
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

impl From<DatasetError> for AppError {
    fn from(value: DatasetError) -> Self {
        Self::Dataset(value)
    }
}

impl From<ProviderError> for AppError {
    fn from(value: ProviderError) -> Self {
        Self::Provider(value)
    }
}

impl From<NarrativeFailure> for AppError {
    fn from(value: NarrativeFailure) -> Self {
        Self::Narrative(value)
    }
}

impl From<regex::Error> for AppError {
    fn from(value: regex::Error) -> Self {
        Self::Guardrail(value)
    }
}
