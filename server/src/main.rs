use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use groupchat_server::config::ServerConfig;
use groupchat_server::engine::chat_engine::ChatEngine;
use groupchat_server::engine::reaper::IdleReaper;
use groupchat_server::web::app_state::AppState;
use groupchat_server::web::router::build_router;

#[derive(Parser)]
#[command(name = "groupchat-server", about = "Real-time group chat relay")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "groupchat.toml")]
    config: String,

    /// Listen port (overrides config and environment).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.set_port(port);
    }

    let engine = Arc::new(ChatEngine::new(config.to_engine_settings()));

    // Start the idle reaper
    let cancel = CancellationToken::new();
    let reaper = IdleReaper::new(engine.clone(), config.sweep_period()).spawn(cancel.clone());

    let app = build_router(Arc::new(AppState::new(engine)));

    let listener = tokio::net::TcpListener::bind(&config.server.web_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.web_address))?;

    info!(
        address = %config.server.web_address,
        sweep_secs = config.sweep_period().as_secs(),
        idle_window_secs = config.idle_window().as_secs(),
        "groupchat server starting"
    );

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    cancel.cancel();
    let _ = reaper.await;
    Ok(())
}
