//! Config file watcher for hot reloading

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher, EventKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{Config as AppConfig, ServiceConfig};
use crate::indicator::ConfigSink;

/// Quiet period after the last file event before reloading
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watch the config file and hand every successfully reloaded `[indicator]`
/// section to `sink`. `[service]` changes only take effect after a restart.
pub fn watch_config(
    config_path: impl AsRef<Path>,
    service: ServiceConfig,
    sink: ConfigSink,
) -> anyhow::Result<JoinHandle<()>> {
    let config_path = config_path.as_ref().to_path_buf();

    let (tx, mut rx) = mpsc::channel(10);

    let filename = config_path.file_name().map(|name| name.to_os_string());
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<notify::Event, notify::Error>| {
            if let Ok(event) = result {
                let touches_config = event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == filename.as_deref());
                if touches_config
                    && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                {
                    let _ = tx.blocking_send(());
                }
            }
        },
        Config::default().with_poll_interval(Duration::from_secs(2)),
    )?;

    // Watch the parent directory, editors often replace the file on save
    if let Some(parent) = config_path.parent() {
        watcher.watch(parent, RecursiveMode::NonRecursive)?;
        tracing::info!("Watching config directory: {:?}", parent);
    } else {
        anyhow::bail!("Config path has no parent directory");
    }

    Ok(tokio::spawn(async move {
        let _watcher = watcher;
        let mut pending_reload = false;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(()) => pending_reload = true,
                    None => break,
                },
                _ = tokio::time::sleep(DEBOUNCE), if pending_reload => {
                    pending_reload = false;
                    tracing::info!("Config file changed, reloading...");

                    if !reload(&config_path, &service, &sink) {
                        break;
                    }
                }
            }
        }
    }))
}

/// Returns `false` once the sink is gone
fn reload(config_path: &PathBuf, service: &ServiceConfig, sink: &ConfigSink) -> bool {
    match AppConfig::load_from_path(config_path) {
        Ok(new_config) => {
            if new_config.service != *service {
                tracing::warn!("[service] changes take effect after restarting the indicator");
            }
            tracing::info!("Config reloaded successfully");
            sink(new_config.indicator)
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {:#}", e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::config::IndicatorConfig;

    fn recording_sink() -> (ConfigSink, Arc<Mutex<Vec<IndicatorConfig>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_received = received.clone();
        let sink: ConfigSink = Arc::new(move |config| {
            sink_received.lock().unwrap().push(config);
            true
        });
        (sink, received)
    }

    #[test]
    fn test_reload_forwards_indicator_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[indicator]\nanimation_interval_ms = 200\n").unwrap();

        let (sink, received) = recording_sink();
        assert!(reload(&path, &ServiceConfig::default(), &sink));

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].animation_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_broken_file_is_not_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service]\nbus_name = \"not a name\"\n").unwrap();

        let (sink, received) = recording_sink();
        assert!(reload(&path, &ServiceConfig::default(), &sink));
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watcher_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink: ConfigSink = Arc::new(move |config| tx.send(config).is_ok());
        let task = watch_config(&path, ServiceConfig::default(), sink).unwrap();

        // Give the backend a moment to install its watch
        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(&path, "[indicator]\nscroll_actions = false\n").unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!config.scroll_actions);
        task.abort();
    }
}
