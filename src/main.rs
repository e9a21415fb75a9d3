//! Ledger Core - HTTP service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Gateway  │───▶│ Coordinator  │───▶│ AccountStore │
//! │  (axum)  │    │  / Service   │    │ (pg | memory)│
//! └──────────┘    └──────────────┘    └──────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use ledger_core::config::AppConfig;
use ledger_core::db::{Database, schema};
use ledger_core::gateway::{self, AppState};
use ledger_core::store::AccountStore;
use ledger_core::{MemoryAccountStore, PgAccountStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn serve<S: AccountStore>(store: S, listener: TcpListener) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(Arc::new(store)));
    gateway::run_server(listener, state)
        .await
        .context("gateway server failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = ledger_core::logging::init_logging(&app_config);

    tracing::info!("Starting Ledger Core in {} mode", env);

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let addr = format!("{}:{}", app_config.gateway.host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let store_config = &app_config.store;
    match app_config.postgres_url.as_deref() {
        Some(url) => {
            let db = Database::connect_with_retry(url, store_config)
                .await
                .context("failed to connect to PostgreSQL")?;
            db.health_check()
                .await
                .context("PostgreSQL health check failed")?;
            schema::init_schema(db.pool())
                .await
                .context("failed to initialize schema")?;

            let store = PgAccountStore::new(db.pool().clone(), store_config.lock_timeout());
            serve(store, listener).await
        }
        None => {
            tracing::warn!("postgres_url not set, using in-memory store (state is lost on exit)");
            let store = MemoryAccountStore::new(store_config.lock_timeout());
            serve(store, listener).await
        }
    }
}
