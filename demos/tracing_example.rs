//! Example: resolving and propagating tracings in an Axum service
//!
//! Run with `RUST_LOG=info cargo run --example tracing_example --features axum`, then:
//!
//! ```text
//! curl -i -H 'X-Correlation-Id: my-flow-1' http://localhost:3000/
//! curl -i http://localhost:3000/dispatch
//! ```
//!
//! Every log line emitted while handling a request carries the `correlation_id` and
//! `request_id` fields of the request span. Jobs pushed onto the in-process queue are
//! executed with the tracings captured at dispatch time.

use axum::{extract::State, routing::get, Router};
use request_tracing::{context, job, TracingConfig, TracingLayer, TracingRegistry, Tracings};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone)]
struct AppState {
    queue: mpsc::UnboundedSender<Value>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber so span fields show up in the logs
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // TRACINGS_* environment variables override the defaults
    let config = TracingConfig::default().apply_env_overrides();
    let registry = Arc::new(TracingRegistry::from_config(config));

    let (queue, mut jobs) = mpsc::unbounded_channel::<Value>();

    // Queue worker: every job runs in its own tracing context
    let worker_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        while let Some(payload) = jobs.recv().await {
            job::run_job(&worker_registry, &payload, async {
                let tracings = context::tracings();
                tracing::info!(
                    job = %payload["job"],
                    correlation_id = ?tracings.correlation_id(),
                    request_id = ?tracings.request_id(),
                    "Processing job"
                );
            })
            .await;
        }
    });

    let app = Router::new()
        .route("/", get(handler))
        .route("/dispatch", get(dispatch_handler))
        .with_state(AppState { queue })
        .layer(TracingLayer::new(registry));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Starting server on 0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}

async fn handler(tracings: Tracings) -> String {
    tracing::info!("Handling request");
    format!(
        "correlation_id={:?} request_id={:?}",
        tracings.correlation_id(),
        tracings.request_id()
    )
}

async fn dispatch_handler(State(state): State<AppState>) -> &'static str {
    let mut payload = json!({ "job": "send_welcome_mail" });
    job::enqueue_current(&mut payload);

    if state.queue.send(payload).is_err() {
        tracing::warn!("Job queue is closed");
        return "Queue unavailable";
    }

    tracing::info!("Job dispatched");
    "Job dispatched"
}
