use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryNotifier, InMemorySubjectDirectory, QueueService};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use review_queue::config::AppConfig;
use review_queue::error::AppError;
use review_queue::telemetry;
use review_queue::workflows::review::{InMemoryReviewStore, ReviewQueueService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.no_sweep {
        config.sweep.interval = None;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service: Arc<QueueService> = Arc::new(ReviewQueueService::new(
        Arc::new(InMemoryReviewStore::default()),
        Arc::new(InMemoryNotifier::default()),
        Arc::new(InMemorySubjectDirectory::default()),
        config.queue.clone(),
    ));

    if let Some(interval) = config.sweep.interval {
        tokio::spawn(run_sla_sweep(service.clone(), interval));
    }

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        bulk_limit = config.queue.bulk_limit,
        sweep_interval_secs = config.sweep.interval.map(|interval| interval.as_secs()),
        "verification review queue ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Re-derive SLA status and priority for the actionable queue on a fixed cadence.
async fn run_sla_sweep(service: Arc<QueueService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.refresh_sla() {
            Ok(summary) => info!(
                refreshed = summary.refreshed,
                changed = summary.changed,
                at_risk = summary.at_risk,
                breached = summary.breached,
                "scheduled sla sweep finished"
            ),
            Err(err) => warn!(error = %err, "scheduled sla sweep failed"),
        }
    }
}
