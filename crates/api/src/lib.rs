pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{middleware, Router};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Build the Axum application router.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let protected = routes::control_routes().route_layer(middleware::from_fn_with_state(
        app_state.clone(),
        auth::require_bearer,
    ));

    Router::new()
        .merge(routes::public_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the API server. Returns once `shutdown` is cancelled and in-flight requests finish.
pub async fn start_server(
    app_state: Arc<AppState>,
    bind_addr: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(app_state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("API server listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
