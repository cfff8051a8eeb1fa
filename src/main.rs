use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hireboard::config::AppConfig;
use hireboard::error::AppError;
use hireboard::lifecycle::{RetentionSweeper, SweepOutcome};
use hireboard::storage::blobs::MemoryBlobStore;
use hireboard::storage::Database;
use hireboard::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Hireboard Lifecycle Core",
    about = "Run the job-board lifecycle core and its retention sweeps",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the operational HTTP surface and the scheduled retention sweeps
    /// (default command)
    Serve(ServeArgs),
    /// Run one retention job immediately and print its outcome
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Which retention job to run
    #[arg(long, value_enum)]
    job: SweepJob,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SweepJob {
    /// Purge withdrawn applications past the retention window
    Withdrawn,
    /// Cascade away postings whose deadline expired past the window
    Expired,
    /// Reclaim snapshot blobs no live row references
    Orphans,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Sweep(args) => run_sweep(args),
    }
}

/// Builds the sweeper over a fresh in-memory store. Until a persistent
/// engine plugs into the `Database` seam this is a scaffold: a standalone
/// `sweep` invocation sees no rows and reports an empty outcome.
fn build_sweeper(config: &AppConfig) -> Arc<RetentionSweeper<MemoryBlobStore>> {
    let db = Arc::new(Database::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    Arc::new(RetentionSweeper::new(db, blobs, config.retention.policy()))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let sweeper = build_sweeper(&config);
    // The sweeps are internal-only; nothing on the router can trigger them.
    let jobs = sweeper.spawn_daily(config.retention.schedule());
    info!(jobs = jobs.len(), "retention sweeps scheduled");

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = router(state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lifecycle core ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let sweeper = build_sweeper(&config);
    let outcome: SweepOutcome = match args.job {
        SweepJob::Withdrawn => sweeper.purge_withdrawn(Utc::now())?,
        SweepJob::Expired => sweeper.purge_expired_postings(Utc::now()),
        SweepJob::Orphans => sweeper.reclaim_orphan_blobs()?,
    };

    println!(
        "sweep finished: examined {}, removed {}",
        outcome.examined, outcome.removed
    );
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(ready: bool) -> AppState {
        // The Prometheus recorder is process-global and can only be
        // installed once, so every test shares a single handle.
        static HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();
        let handle = HANDLE
            .get_or_init(|| PrometheusMetricLayer::pair().1)
            .clone();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: handle,
        }
    }

    #[tokio::test]
    async fn health_endpoint_is_ok() {
        let app = router(test_state(true));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let app = router(test_state(false));
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let app = router(test_state(true));
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
