use crate::cli::ServeArgs;
use crate::infra::{build_orchestrator, AppState, ConfiguredProvider};
use crate::routes::{with_narrative_routes, NarrativeService};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use quality_narrative::config::AppConfig;
use quality_narrative::error::AppError;
use quality_narrative::narrative::{DatasetLoader, SnapshotStore};
use quality_narrative::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let snapshot = DatasetLoader::from_dir(&config.dataset.dir)?;
    let store = Arc::new(SnapshotStore::new(snapshot));

    let provider = Arc::new(ConfiguredProvider::from_config(&config, false)?);
    info!(provider = provider.name(), "narrative provider configured");
    let orchestrator = build_orchestrator(&config, store, provider)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(NarrativeService {
        orchestrator,
        dataset_dir: config.dataset.dir.clone(),
        request_timeout: config.generation.request_timeout,
        readiness: readiness_flag.clone(),
        shutdown: shutdown.clone(),
        fatal: Mutex::new(None),
    });

    let app = with_narrative_routes(service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "quality narrative service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(reason) = service.take_fatal() {
        error!(%reason, "stopped after a failed dataset reload");
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            reason,
        )));
    }
    Ok(())
}

async fn shutdown_signal(shutdown: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested"),
        _ = ctrl_c => info!("ctrl-c received, shutting down"),
    }
}
