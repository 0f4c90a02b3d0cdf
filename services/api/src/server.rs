use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use coverage_engine::config::AppConfig;
use coverage_engine::coverage::{AnalysisSession, Dataset};
use coverage_engine::error::AppError;
use coverage_engine::ingestion::{load_dataset, source_from_config};
use coverage_engine::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let source = source_from_config(&config.ingestion);
    let dataset = match tokio::task::spawn_blocking(move || load_dataset(source.as_ref()))
        .await
        .map_err(axum::Error::new)?
    {
        Ok(dataset) => dataset,
        Err(err) => {
            warn!(
                error = %err,
                suggestion = err.suggestion().unwrap_or("upload records via the dataset endpoint"),
                "starting with an empty record set"
            );
            Dataset::empty()
        }
    };

    let session = Arc::new(AnalysisSession::new(dataset, config.analytics.clone()));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        session,
        max_upload_bytes: config.ingestion.max_upload_bytes,
    };

    let app = router(config.ingestion.max_upload_bytes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, source = %config.ingestion.source, "coverage analytics service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
