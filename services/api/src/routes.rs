use crate::infra::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use quality_narrative::error::AppError;
use quality_narrative::narrative::context::NarrativeContext;
use quality_narrative::narrative::{
    FailureKind, NarrativeFailure, NarrativeOrchestrator, NarrativeProvider, NarrativeReport,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info};

/// Shared handles for the narrative endpoints.
pub(crate) struct NarrativeService<P> {
    pub(crate) orchestrator: NarrativeOrchestrator<P>,
    pub(crate) dataset_dir: PathBuf,
    pub(crate) request_timeout: Duration,
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) shutdown: Arc<Notify>,
    pub(crate) fatal: Mutex<Option<String>>,
}

impl<P> NarrativeService<P> {
    /// Why the service stopped, if a reload failed.
    pub(crate) fn take_fatal(&self) -> Option<String> {
        self.fatal.lock().ok().and_then(|mut guard| guard.take())
    }
}

/// A single facility name, or the list form dashboards send (first entry wins).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FacilityQuery {
    One(String),
    Many(Vec<String>),
}

impl FacilityQuery {
    pub(crate) fn first(&self) -> &str {
        match self {
            FacilityQuery::One(name) => name,
            FacilityQuery::Many(names) => names.first().map(String::as_str).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryRequest {
    pub(crate) facility: FacilityQuery,
}

#[derive(Debug, Serialize)]
pub(crate) struct SummaryResponse {
    pub(crate) status: &'static str,
    pub(crate) narrative: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) resolution_note: Option<String>,
    pub(crate) attempts: u8,
    pub(crate) context: NarrativeContext,
}

impl From<NarrativeReport> for SummaryResponse {
    fn from(report: NarrativeReport) -> Self {
        Self {
            status: "done",
            narrative: report.narrative,
            resolution_note: report.resolution_note,
            attempts: report.attempts,
            context: report.context,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidateRequest {
    pub(crate) context: NarrativeContext,
    pub(crate) narrative: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReloadResponse {
    pub(crate) status: &'static str,
    pub(crate) vintage: Option<NaiveDate>,
    pub(crate) facilities: usize,
    pub(crate) metrics: usize,
}

pub(crate) fn with_narrative_routes<P>(service: Arc<NarrativeService<P>>) -> Router
where
    P: NarrativeProvider + 'static,
{
    Router::new()
        .route("/api/v1/narrative/summary", post(summary_endpoint::<P>))
        .route("/api/v1/narrative/validate", post(validate_endpoint::<P>))
        .route("/api/v1/dataset/reload", post(reload_endpoint::<P>))
        .with_state(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Acquire);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "unavailable" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn summary_endpoint<P>(
    State(service): State<Arc<NarrativeService<P>>>,
    Json(payload): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError>
where
    P: NarrativeProvider + 'static,
{
    let query = payload.facility.first().to_string();
    let outcome = tokio::time::timeout(
        service.request_timeout,
        service.orchestrator.generate_summary(&query),
    )
    .await
    .map_err(|_| NarrativeFailure {
        kind: FailureKind::ProviderTimeout,
        message: format!(
            "request did not complete within {:?}",
            service.request_timeout
        ),
        violations: Vec::new(),
    })?;

    let report = outcome.into_result()?;
    Ok(Json(SummaryResponse::from(report)))
}

pub(crate) async fn validate_endpoint<P>(
    State(service): State<Arc<NarrativeService<P>>>,
    Json(payload): Json<ValidateRequest>,
) -> Json<ValidationResult>
where
    P: NarrativeProvider + 'static,
{
    let validator = service.orchestrator.validator();
    Json(validator.postflight(&payload.context, &payload.narrative))
}

pub(crate) async fn reload_endpoint<P>(
    State(service): State<Arc<NarrativeService<P>>>,
) -> Result<Json<ReloadResponse>, AppError>
where
    P: NarrativeProvider + 'static,
{
    match service.orchestrator.store().reload_from(&service.dataset_dir) {
        Ok(snapshot) => {
            info!(vintage = ?snapshot.vintage, dir = %service.dataset_dir.display(), "dataset reloaded");
            Ok(Json(ReloadResponse {
                status: "reloaded",
                vintage: snapshot.vintage,
                facilities: snapshot.registry.len(),
                metrics: snapshot.catalog.len(),
            }))
        }
        Err(err) => {
            error!(error = %err, "dataset reload failed; shutting down");
            service.readiness.store(false, Ordering::Release);
            if let Ok(mut fatal) = service.fatal.lock() {
                *fatal = Some(err.to_string());
            }
            service.shutdown.notify_one();
            Err(AppError::Dataset(err))
        }
    }
}
