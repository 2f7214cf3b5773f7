use crate::error::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared, read-only server state: where the rendered chart lives
#[derive(Clone)]
pub struct AppState {
    artifact_path: Arc<PathBuf>,
}

/// Serve the rendered chart verbatim
async fn chart(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.artifact_path.as_ref()).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], bytes).into_response(),
        Err(e) => {
            error!("Chart unavailable at {}: {}", state.artifact_path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "chart unavailable").into_response()
        }
    }
}

/// Router with a single route, `/`, returning the rendered chart
pub fn create_server(artifact_path: PathBuf) -> Router {
    let state = AppState {
        artifact_path: Arc::new(artifact_path),
    };

    Router::new()
        .route("/", get(chart))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Start the HTTP server and run until Ctrl-C
pub async fn start_server(artifact_path: PathBuf, bind_address: &str, port: u16) -> Result<()> {
    let app = create_server(artifact_path);

    let bind_addr = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Serving chart on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
