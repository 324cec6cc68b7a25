// SPDX-License-Identifier: MIT

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::opsflow::workflow::{WorkflowCoordinator, WorkflowEvent};

type AppState = Arc<WorkflowCoordinator>;

pub fn router(coordinator: Arc<WorkflowCoordinator>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs/latest", get(latest_run))
        .route("/api/runs", post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(coordinator)
}

pub async fn serve<F>(
    coordinator: Arc<WorkflowCoordinator>,
    port: u16,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(coordinator))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check(State(coordinator): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": coordinator.config().mode,
    }))
}

async fn latest_run(State(coordinator): State<AppState>) -> impl IntoResponse {
    match coordinator.last_result().await {
        Some(result) => (StatusCode::OK, Json(json!(result))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No workflow run yet" })),
        ),
    }
}

async fn create_run(State(coordinator): State<AppState>) -> Json<Value> {
    let result = coordinator.run_workflow().await;
    Json(json!(result))
}

async fn stream_run(
    State(coordinator): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<WorkflowEvent>(100);

    tokio::spawn(async move {
        log::info!("Starting streamed workflow run");
        let result = coordinator.run_workflow_with_events(Some(tx)).await;
        log::info!("Streamed run finished: {:?}", result.status);
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default().json_data(&event).unwrap_or_else(|e| {
            log::error!("Failed to encode event: {}", e);
            Event::default().event("error").data(e.to_string())
        }))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

async fn metrics(State(coordinator): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        coordinator.metrics().render(),
    )
}
