use crate::cli::ServeArgs;
use crate::infra::{demo_process, AppState, InMemoryBackend};
use crate::routes::with_backend_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use processo_seletivo::config::AppConfig;
use processo_seletivo::error::AppError;
use processo_seletivo::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backend = InMemoryBackend::with_process(demo_process());

    let app = with_backend_routes(backend)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "processo seletivo backend ready");

    axum::serve(listener, app).await?;
    Ok(())
}
