//! StatusNotifierWatcher client
//!
//! The watcher is the panel-side registry of StatusNotifierItems. Items
//! register by bus name and are dropped by the watcher when that name
//! vanishes, so unregistering is done by releasing the name.

use futures::StreamExt;
use tokio::task::JoinHandle;
use zbus::connection::Connection;
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::proxy;

use crate::dbus::WATCHER_BUS_NAME;

/// Proxy for communicating with the StatusNotifierWatcher
#[proxy(
    interface = "org.kde.StatusNotifierWatcher",
    default_service = "org.kde.StatusNotifierWatcher",
    default_path = "/StatusNotifierWatcher"
)]
trait StatusNotifierWatcher {
    fn register_status_notifier_item(&self, service: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn is_status_notifier_host_registered(&self) -> zbus::Result<bool>;
}

/// Check if a StatusNotifierWatcher is running on the session bus
pub async fn watcher_exists(connection: &Connection) -> bool {
    let Ok(dbus) = DBusProxy::new(connection).await else {
        return false;
    };
    let Ok(name) = BusName::try_from(WATCHER_BUS_NAME) else {
        return false;
    };
    dbus.name_has_owner(name).await.unwrap_or(false)
}

/// Register an item with the watcher
pub async fn register_item(connection: &Connection, service: &str) -> anyhow::Result<()> {
    let watcher = StatusNotifierWatcherProxy::new(connection).await?;
    watcher.register_status_notifier_item(service).await?;

    let host_registered = watcher
        .is_status_notifier_host_registered()
        .await
        .unwrap_or(false);
    if !host_registered {
        tracing::warn!("No StatusNotifierHost registered, the indicator won't be visible yet");
    }

    tracing::info!("Registered StatusNotifierItem: {}", service);
    Ok(())
}

/// Call `on_appeared` every time a (new) watcher takes the well-known name,
/// e.g. after the panel restarted.
pub async fn watch_watcher<F>(connection: &Connection, on_appeared: F) -> anyhow::Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    let dbus = DBusProxy::new(connection).await?;
    let mut owner_changes = dbus
        .receive_name_owner_changed_with_args(&[(0, WATCHER_BUS_NAME)])
        .await?;

    Ok(tokio::spawn(async move {
        while let Some(signal) = owner_changes.next().await {
            if let Ok(args) = signal.args() {
                if args.new_owner().is_some() {
                    tracing::info!("StatusNotifierWatcher appeared");
                    on_appeared();
                } else {
                    tracing::info!("StatusNotifierWatcher vanished");
                }
            }
        }
    }))
}
