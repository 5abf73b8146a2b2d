use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

static EVENTS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "forum_sync_events_processed_total",
            "Stream events handled by forum-sync-service",
        ),
        &["stream", "event_type", "outcome"],
    )
    .expect("failed to create forum_sync_events_processed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register forum_sync_events_processed_total");
    counter
});

static POISON_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "forum_sync_poison_events_total",
            "Undecodable stream entries acknowledged and dropped",
        ),
        &["stream"],
    )
    .expect("failed to create forum_sync_poison_events_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register forum_sync_poison_events_total");
    counter
});

static SWEEP_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "forum_sync_sweep_runs_total",
            "Reconciliation sweeps by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create forum_sync_sweep_runs_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register forum_sync_sweep_runs_total");
    counter
});

static SWEEP_REPAIRS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "forum_sync_sweep_repairs_total",
        "Threads created, updated or pruned by reconciliation sweeps",
    )
    .expect("failed to create forum_sync_sweep_repairs_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register forum_sync_sweep_repairs_total");
    counter
});

pub fn observe_event(stream: &str, event_type: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    EVENTS_PROCESSED_TOTAL
        .with_label_values(&[stream, event_type, outcome])
        .inc();
}

pub fn observe_poison(stream: &str, count: u64) {
    if count > 0 {
        POISON_EVENTS_TOTAL.with_label_values(&[stream]).inc_by(count);
    }
}

pub fn observe_sweep(success: bool, repairs: u64) {
    let outcome = if success { "success" } else { "failure" };
    SWEEP_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    SWEEP_REPAIRS_TOTAL.inc_by(repairs);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Bind the `/health` and `/metrics` endpoints. The returned server runs
/// once spawned and is stopped through its handle.
pub fn metrics_server(port: u16) -> std::io::Result<Server> {
    let server = HttpServer::new(|| {
        App::new()
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(serve_metrics))
    })
    .workers(1)
    .disable_signals()
    .bind(("0.0.0.0", port))?
    .run();
    Ok(server)
}
