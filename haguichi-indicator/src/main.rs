//! Haguichi Indicator
//!
//! Mirrors the state of a running Haguichi session in a StatusNotifierItem
//! with a menu to control it.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use zbus::connection::Connection;

use haguichi_indicator::config::Config;
use haguichi_indicator::config_watcher;
use haguichi_indicator::indicator::{EventQueue, Indicator};
use haguichi_indicator::remote::HaguichiRemote;
use haguichi_indicator::sni::SniSurface;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Haguichi indicator");

    let config = Config::load()?;

    // Connect to the session bus
    let connection = Connection::session().await?;
    tracing::info!("Connected to session D-Bus");

    let queue = EventQueue::new();
    let remote = HaguichiRemote::new(&connection, &config.service).await?;
    let surface = SniSurface::new(&connection, queue.action_sink()).await?;
    let config_sink = queue.config_sink();

    let mut indicator = Indicator::new(queue, remote, surface, &config.indicator);
    indicator.start().await?;

    let _config_task = match config_watcher::watch_config(
        Config::config_path(),
        config.service.clone(),
        config_sink,
    ) {
        Ok(task) => Some(task),
        Err(e) => {
            tracing::warn!("Config hot reload unavailable: {}", e);
            None
        }
    };

    tracing::info!("Haguichi indicator is running");

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    indicator.run(shutdown).await;

    tracing::info!("Shutting down Haguichi indicator");
    indicator.teardown().await;
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    shutdown.cancel();
}
