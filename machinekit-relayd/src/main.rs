mod api;
mod config;
mod mdns;
mod registry;
mod registry_manager;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::ServiceDaemon;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::registry::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("machinekit_relayd=info"))
        )
        .init();

    tracing::info!("Starting machinekit-relayd");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/machinekit/relayd.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    // Nothing is started for an instance that does not talk to the network
    config.ensure_remote_enabled()?;

    let registry = Registry::new(config.instance.uuid.clone());
    tracing::info!("Relaying services of instance {}", registry.self_uuid());

    let mdns_daemon = ServiceDaemon::new()
        .context("Failed to create mDNS daemon")?;
    if let Some(interface) = &config.discovery.interface {
        mdns_daemon
            .disable_interface(mdns_sd::IfKind::All)
            .context("Failed to disable default interfaces")?;
        mdns_daemon
            .enable_interface(interface.as_str())
            .with_context(|| format!("Failed to enable interface {}", interface))?;
    }

    // Create cancellation token for shutdown
    let cancel = CancellationToken::new();

    // Spawn mDNS browser task
    let (browser_tx, browser_rx) = mpsc::channel(config.discovery.event_buffer);
    let browser_cancel = cancel.clone();
    let browser_daemon = mdns_daemon.clone();
    let service_types = config.discovery.service_types.clone();
    let browser_handle = tokio::spawn(async move {
        if let Err(e) = mdns::browser::run_browser(browser_daemon, service_types, browser_tx, browser_cancel).await {
            tracing::error!("mDNS browser error: {}", e);
        }
    });

    // Spawn registry manager task
    let mgr_cancel = cancel.clone();
    let mgr_registry = registry.clone();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = registry_manager::run(mgr_registry, browser_rx, mgr_cancel).await {
            tracing::error!("Registry manager error: {}", e);
        }
    });

    // Build API router
    let app = api::routes::router(api::routes::AppState { registry });

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // In-flight requests are cut off at shutdown
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    cancel.cancel();
    server_handle.abort();

    let _ = tokio::join!(browser_handle, mgr_handle, server_handle);

    // Shutdown mDNS daemon
    if let Err(e) = mdns_daemon.shutdown() {
        tracing::error!("Failed to shutdown mDNS daemon: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
