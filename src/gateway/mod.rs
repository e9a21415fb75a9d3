//! HTTP gateway
//!
//! Thin axum adapter over [`AccountService`](crate::account::AccountService)
//! and [`TransferCoordinator`](crate::transfer::TransferCoordinator). Decodes
//! JSON bodies and path ids, encodes accounts and `{"Error": ...}` bodies.

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{Next, from_fn},
    response::Response,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

use crate::store::AccountStore;
pub use state::AppState;

/// Log one line per request with status and latency.
async fn request_log(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "request"
    );
    response
}

/// Build the complete router for a store backend.
pub fn router<S: AccountStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check::<S>))
        .route(
            "/accounts",
            get(handlers::list_accounts::<S>).post(handlers::create_account::<S>),
        )
        .route("/accounts/{id}", get(handlers::get_account::<S>))
        .route("/accounts/{id}/deposit", post(handlers::deposit::<S>))
        .route("/accounts/{id}/withdraw", post(handlers::withdraw::<S>))
        .route("/transfer", post(handlers::transfer::<S>))
        .route("/transfers", get(handlers::list_transfers::<S>))
        .layer(from_fn(request_log))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run_server<S: AccountStore>(
    listener: TcpListener,
    state: Arc<AppState<S>>,
) -> std::io::Result<()> {
    let app = router(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Gateway listening on http://{}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
