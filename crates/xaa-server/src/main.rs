//! Cross-app access service entry point.

use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use xaa_server::api::idp::DEMO_USERS;
use xaa_server::observability::init_tracing;
use xaa_server::{build_router, AppState, InMemoryResourceStore, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = ServerConfig::from_env().context("loading configuration")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr;
    let base_url = config.base_url.clone();
    let store = Arc::new(InMemoryResourceStore::seeded(
        DEMO_USERS.iter().map(|user| user.sub),
    ));
    let state = AppState::new(config, store).context("building application state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, %base_url, "cross-app access service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serving HTTP")?;
    tracing::info!("shut down");
    Ok(())
}
