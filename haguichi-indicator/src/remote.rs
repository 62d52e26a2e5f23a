//! Haguichi session proxy
//!
//! Wraps the Haguichi D-Bus interface. Actions are one-way calls that are
//! never awaited; queries return `None` when the session can't answer.
//! Errors are logged and never escape this module: a missing session is
//! reported through [`RemoteEvent::PresenceChanged`] instead.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use zbus::connection::Connection;
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::proxy;

use crate::config::ServiceConfig;
use crate::ConnectionMode;

/// Proxy for the Haguichi session interface
#[proxy(
    interface = "com.github.ztefn.haguichi",
    default_service = "com.github.ztefn.haguichi",
    default_path = "/com/github/ztefn/haguichi"
)]
trait Haguichi {
    #[zbus(no_reply)]
    fn show(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn hide(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn start_hamachi(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn stop_hamachi(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn change_nick(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn join_network(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn create_network(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn information(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn preferences(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn about(&self) -> zbus::Result<()>;

    #[zbus(no_reply)]
    fn quit_app(&self) -> zbus::Result<()>;

    fn get_mode(&self) -> zbus::Result<String>;

    fn get_modality(&self) -> zbus::Result<bool>;

    fn get_visibility(&self) -> zbus::Result<bool>;

    #[zbus(signal)]
    fn mode_changed(&self, mode: String) -> zbus::Result<()>;

    #[zbus(signal)]
    fn modality_changed(&self, modal: bool) -> zbus::Result<()>;

    #[zbus(signal)]
    fn visibility_changed(&self, visible: bool) -> zbus::Result<()>;

    #[zbus(signal)]
    fn quitted(&self) -> zbus::Result<()>;
}

/// One-way methods Haguichi exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMethod {
    Show,
    Hide,
    StartHamachi,
    StopHamachi,
    ChangeNick,
    JoinNetwork,
    CreateNetwork,
    Information,
    Preferences,
    About,
    QuitApp,
}

impl RemoteMethod {
    /// D-Bus member name
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteMethod::Show => "Show",
            RemoteMethod::Hide => "Hide",
            RemoteMethod::StartHamachi => "StartHamachi",
            RemoteMethod::StopHamachi => "StopHamachi",
            RemoteMethod::ChangeNick => "ChangeNick",
            RemoteMethod::JoinNetwork => "JoinNetwork",
            RemoteMethod::CreateNetwork => "CreateNetwork",
            RemoteMethod::Information => "Information",
            RemoteMethod::Preferences => "Preferences",
            RemoteMethod::About => "About",
            RemoteMethod::QuitApp => "QuitApp",
        }
    }
}

/// Events coming from the Haguichi session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    ModeChanged(ConnectionMode),
    ModalityChanged(bool),
    VisibilityChanged(bool),
    /// Haguichi announced it is quitting
    Quitted,
    /// The session bus name gained (`true`) or lost (`false`) its owner
    PresenceChanged(bool),
}

/// Receives remote events. Returns `false` once the receiving side is gone.
pub type EventSink = Arc<dyn Fn(RemoteEvent) -> bool + Send + Sync>;

/// Handle of a single signal subscription.
///
/// Releasing (or dropping) the handle stops forwarding the signal.
pub struct Subscription {
    signal: &'static str,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(signal: &'static str, task: JoinHandle<()>) -> Self {
        Self {
            signal,
            task: Some(task),
        }
    }

    pub fn signal(&self) -> &'static str {
        self.signal
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop receiving the signal
    pub fn release(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!("Released subscription to {}", self.signal);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The remote application as seen by the indicator
#[async_trait]
pub trait Remote: Send + Sync + 'static {
    /// Fire-and-forget method call
    fn call(&self, method: RemoteMethod);

    async fn get_mode(&self) -> Option<ConnectionMode>;

    async fn get_modality(&self) -> Option<bool>;

    async fn get_visibility(&self) -> Option<bool>;

    /// Whether the session bus name currently has an owner
    async fn has_owner(&self) -> bool;

    /// Subscribe to all session signals, including presence changes
    async fn subscribe(&self, sink: EventSink) -> anyhow::Result<Vec<Subscription>>;
}

/// [`Remote`] backed by the Haguichi D-Bus interface
pub struct HaguichiRemote {
    connection: Connection,
    proxy: HaguichiProxy<'static>,
    bus_name: String,
}

impl HaguichiRemote {
    pub async fn new(connection: &Connection, service: &ServiceConfig) -> anyhow::Result<Self> {
        let proxy = HaguichiProxy::builder(connection)
            .destination(service.bus_name.clone())?
            .path(service.object_path.clone())?
            .interface(service.interface.clone())?
            .build()
            .await?;

        tracing::info!(
            "Watching Haguichi session {} at {}",
            service.bus_name,
            service.object_path
        );

        Ok(Self {
            connection: connection.clone(),
            proxy,
            bus_name: service.bus_name.clone(),
        })
    }

    async fn subscribe_presence(&self, sink: EventSink) -> anyhow::Result<Subscription> {
        let dbus = DBusProxy::new(&self.connection).await?;
        let mut owner_changes = dbus
            .receive_name_owner_changed_with_args(&[(0, self.bus_name.as_str())])
            .await?;

        let task = tokio::spawn(async move {
            while let Some(signal) = owner_changes.next().await {
                if let Ok(args) = signal.args() {
                    let present = args.new_owner().is_some();
                    tracing::debug!("Haguichi session owner changed, present: {}", present);
                    if !sink(RemoteEvent::PresenceChanged(present)) {
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new("NameOwnerChanged", task))
    }
}

#[async_trait]
impl Remote for HaguichiRemote {
    fn call(&self, method: RemoteMethod) {
        let proxy = self.proxy.clone();

        tokio::spawn(async move {
            let result = match method {
                RemoteMethod::Show => proxy.show().await,
                RemoteMethod::Hide => proxy.hide().await,
                RemoteMethod::StartHamachi => proxy.start_hamachi().await,
                RemoteMethod::StopHamachi => proxy.stop_hamachi().await,
                RemoteMethod::ChangeNick => proxy.change_nick().await,
                RemoteMethod::JoinNetwork => proxy.join_network().await,
                RemoteMethod::CreateNetwork => proxy.create_network().await,
                RemoteMethod::Information => proxy.information().await,
                RemoteMethod::Preferences => proxy.preferences().await,
                RemoteMethod::About => proxy.about().await,
                RemoteMethod::QuitApp => proxy.quit_app().await,
            };

            match result {
                Ok(()) => tracing::debug!("Called {}", method.as_str()),
                Err(e) => tracing::debug!("Failed to call {}: {}", method.as_str(), e),
            }
        });
    }

    async fn get_mode(&self) -> Option<ConnectionMode> {
        match self.proxy.get_mode().await {
            Ok(mode) => Some(ConnectionMode::from_str(&mode)),
            Err(e) => {
                tracing::debug!("GetMode failed: {}", e);
                None
            }
        }
    }

    async fn get_modality(&self) -> Option<bool> {
        match self.proxy.get_modality().await {
            Ok(modal) => Some(modal),
            Err(e) => {
                tracing::debug!("GetModality failed: {}", e);
                None
            }
        }
    }

    async fn get_visibility(&self) -> Option<bool> {
        match self.proxy.get_visibility().await {
            Ok(visible) => Some(visible),
            Err(e) => {
                tracing::debug!("GetVisibility failed: {}", e);
                None
            }
        }
    }

    async fn has_owner(&self) -> bool {
        let Ok(dbus) = DBusProxy::new(&self.connection).await else {
            return false;
        };
        let Ok(name) = BusName::try_from(self.bus_name.as_str()) else {
            return false;
        };
        dbus.name_has_owner(name).await.unwrap_or(false)
    }

    async fn subscribe(&self, sink: EventSink) -> anyhow::Result<Vec<Subscription>> {
        let mut subscriptions = Vec::with_capacity(5);

        let mut mode_changed = self.proxy.receive_mode_changed().await?;
        let mode_sink = sink.clone();
        subscriptions.push(Subscription::new(
            "ModeChanged",
            tokio::spawn(async move {
                while let Some(signal) = mode_changed.next().await {
                    if let Ok(args) = signal.args() {
                        let mode = ConnectionMode::from_str(&args.mode);
                        if !mode_sink(RemoteEvent::ModeChanged(mode)) {
                            break;
                        }
                    }
                }
            }),
        ));

        let mut modality_changed = self.proxy.receive_modality_changed().await?;
        let modality_sink = sink.clone();
        subscriptions.push(Subscription::new(
            "ModalityChanged",
            tokio::spawn(async move {
                while let Some(signal) = modality_changed.next().await {
                    if let Ok(args) = signal.args() {
                        if !modality_sink(RemoteEvent::ModalityChanged(args.modal)) {
                            break;
                        }
                    }
                }
            }),
        ));

        let mut visibility_changed = self.proxy.receive_visibility_changed().await?;
        let visibility_sink = sink.clone();
        subscriptions.push(Subscription::new(
            "VisibilityChanged",
            tokio::spawn(async move {
                while let Some(signal) = visibility_changed.next().await {
                    if let Ok(args) = signal.args() {
                        if !visibility_sink(RemoteEvent::VisibilityChanged(args.visible)) {
                            break;
                        }
                    }
                }
            }),
        ));

        let mut quitted = self.proxy.receive_quitted().await?;
        let quitted_sink = sink.clone();
        subscriptions.push(Subscription::new(
            "Quitted",
            tokio::spawn(async move {
                while quitted.next().await.is_some() {
                    if !quitted_sink(RemoteEvent::Quitted) {
                        break;
                    }
                }
            }),
        ));

        subscriptions.push(self.subscribe_presence(sink).await?);

        tracing::debug!("Subscribed to {} Haguichi signals", subscriptions.len());
        Ok(subscriptions)
    }
}
