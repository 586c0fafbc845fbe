mod utils;

pub mod assistant;
pub mod context;
pub mod db;
pub mod error;
pub mod server;
pub mod settings;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use assistant::{AssistantGateway, OllamaBackend};
use db::Database;
use server::{build_router, AppState};
use settings::AppSettings;

/// Wires the store, the assistant backend and the HTTP routes together.
pub fn build_state(settings: &AppSettings) -> Result<AppState> {
    let database = Database::new(settings.database_path.clone())?;

    let backend = OllamaBackend::new(&settings.backend)
        .context("failed to construct generation backend client")?;
    log::info!(
        "Assistant backend: model={} url={}",
        settings.backend.model,
        backend.generate_url()
    );

    let gateway = AssistantGateway::new(
        Arc::new(backend),
        settings.context.clone(),
        settings.backend.timeout(),
    );

    Ok(AppState {
        db: database,
        gateway,
    })
}

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("WheelieMap starting up...");

    let settings = AppSettings::from_env()?;
    let bind_addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}': expected host:port", settings.bind_addr))?;

    let state = build_state(&settings)?;
    log::info!("Using DB at: {}", state.db.path().display());

    let app = build_router(state, &settings.allowed_origins)?;

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    log::info!(
        "Listening on {}",
        listener
            .local_addr()
            .context("failed to resolve listen address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server exited unexpectedly")?;

    log::info!("WheelieMap shut down");
    Ok(())
}
