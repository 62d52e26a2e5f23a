//! StatusNotifierItem surface
//!
//! Exports the indicator as an org.kde.StatusNotifierItem together with its
//! dbusmenu. Hiding the indicator removes both objects and releases the item
//! bus name, which makes the watcher drop the item from the panel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use zbus::connection::Connection;
use zbus::interface;
use zbus::names::WellKnownName;
use zbus::object_server::{ObjectServer, SignalEmitter};
use zbus::zvariant::ObjectPath;

use crate::dbus::{ITEM_BUS_NAME_PREFIX, ITEM_OBJECT_PATH, MENU_OBJECT_PATH};
use crate::dbusmenu::{DBusMenu, MenuUpdate, ROOT_ID};
use crate::presenter::RenderState;
use crate::surface::{ActionSink, Surface, UserAction};
use crate::watcher;
use crate::ConnectionMode;

const ITEM_ID: &str = "haguichi-indicator";
const ITEM_TITLE: &str = "Haguichi";

/// Scroll direction for an SNI `Scroll` call, `None` when it should be ignored.
///
/// Follows the KDE convention of positive deltas for scrolling up.
pub fn scroll_action(delta: i32, orientation: &str) -> Option<UserAction> {
    if !orientation.eq_ignore_ascii_case("vertical") {
        return None;
    }
    match delta {
        d if d > 0 => Some(UserAction::ScrollUp),
        d if d < 0 => Some(UserAction::ScrollDown),
        _ => None,
    }
}

/// Tooltip body for a mode
fn mode_description(mode: ConnectionMode) -> &'static str {
    match mode {
        ConnectionMode::Connecting => "Connecting…",
        ConnectionMode::Connected => "Connected",
        ConnectionMode::Disconnected => "Disconnected",
        ConnectionMode::Unknown => "",
    }
}

/// Item properties derived from a view
#[derive(Debug, Clone, PartialEq, Eq)]
struct ItemState {
    icon_name: String,
    icon_theme_path: String,
    description: String,
}

impl ItemState {
    fn from_view(view: &RenderState) -> Self {
        Self {
            icon_name: view.icon.icon_name(),
            icon_theme_path: view.icon_theme_path.clone().unwrap_or_default(),
            description: mode_description(view.mode).to_string(),
        }
    }
}

/// Exported org.kde.StatusNotifierItem object
pub struct StatusNotifierItem {
    state: ItemState,
    actions: ActionSink,
}

impl StatusNotifierItem {
    fn new(view: &RenderState, actions: ActionSink) -> Self {
        Self {
            state: ItemState::from_view(view),
            actions,
        }
    }
}

#[interface(name = "org.kde.StatusNotifierItem")]
impl StatusNotifierItem {
    /// Primary click, for hosts that don't open the menu themselves
    async fn activate(&self, _x: i32, _y: i32) {
        (self.actions)(UserAction::ActivateIcon);
    }

    async fn secondary_activate(&self, _x: i32, _y: i32) {}

    /// The menu is served through dbusmenu
    async fn context_menu(&self, _x: i32, _y: i32) {}

    async fn scroll(&self, delta: i32, orientation: String) {
        if let Some(action) = scroll_action(delta, &orientation) {
            (self.actions)(action);
        }
    }

    #[zbus(property)]
    fn category(&self) -> String {
        "ApplicationStatus".to_string()
    }

    #[zbus(property)]
    fn id(&self) -> String {
        ITEM_ID.to_string()
    }

    #[zbus(property)]
    fn title(&self) -> String {
        ITEM_TITLE.to_string()
    }

    #[zbus(property)]
    fn status(&self) -> String {
        "Active".to_string()
    }

    #[zbus(property)]
    fn icon_name(&self) -> String {
        self.state.icon_name.clone()
    }

    #[zbus(property)]
    fn icon_theme_path(&self) -> String {
        self.state.icon_theme_path.clone()
    }

    #[zbus(property, name = "ToolTip")]
    fn tool_tip(&self) -> (String, Vec<(i32, i32, Vec<u8>)>, String, String) {
        (
            self.state.icon_name.clone(),
            Vec::new(),
            ITEM_TITLE.to_string(),
            self.state.description.clone(),
        )
    }

    #[zbus(property)]
    fn menu(&self) -> ObjectPath<'static> {
        ObjectPath::from_static_str_unchecked(MENU_OBJECT_PATH)
    }

    #[zbus(property)]
    fn item_is_menu(&self) -> bool {
        true
    }

    #[zbus(signal)]
    async fn new_icon(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn new_icon_theme_path(emitter: &SignalEmitter<'_>, icon_theme_path: &str) -> zbus::Result<()>;

    #[zbus(signal, name = "NewToolTip")]
    async fn new_tool_tip(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
}

/// Put fresh item and menu objects on `object_server`, replacing any left
/// over from an earlier export.
async fn place_objects(
    object_server: &ObjectServer,
    view: &RenderState,
    actions: ActionSink,
) -> zbus::Result<()> {
    remove_objects(object_server).await?;
    object_server
        .at(ITEM_OBJECT_PATH, StatusNotifierItem::new(view, actions.clone()))
        .await?;
    object_server
        .at(MENU_OBJECT_PATH, DBusMenu::new(view, actions))
        .await?;
    Ok(())
}

/// Remove the item and menu objects that are currently exported
async fn remove_objects(object_server: &ObjectServer) -> zbus::Result<()> {
    if object_server
        .interface::<_, StatusNotifierItem>(ITEM_OBJECT_PATH)
        .await
        .is_ok()
    {
        object_server
            .remove::<StatusNotifierItem, _>(ITEM_OBJECT_PATH)
            .await?;
    }
    if object_server
        .interface::<_, DBusMenu>(MENU_OBJECT_PATH)
        .await
        .is_ok()
    {
        object_server.remove::<DBusMenu, _>(MENU_OBJECT_PATH).await?;
    }
    Ok(())
}

/// [`Surface`] that renders into a StatusNotifierItem
pub struct SniSurface {
    connection: Connection,
    bus_name: String,
    actions: ActionSink,
    exported: Arc<AtomicBool>,
    watcher_task: Option<JoinHandle<()>>,
}

impl SniSurface {
    pub async fn new(connection: &Connection, actions: ActionSink) -> anyhow::Result<Self> {
        let bus_name = format!("{}-{}-1", ITEM_BUS_NAME_PREFIX, std::process::id());
        let exported = Arc::new(AtomicBool::new(false));

        // Register again whenever the panel's watcher restarts
        let watcher_task = {
            let conn = connection.clone();
            let bus_name = bus_name.clone();
            let exported = exported.clone();
            watcher::watch_watcher(connection, move || {
                if !exported.load(Ordering::SeqCst) {
                    return;
                }
                let conn = conn.clone();
                let bus_name = bus_name.clone();
                tokio::spawn(async move {
                    if let Err(e) = watcher::register_item(&conn, &bus_name).await {
                        tracing::warn!("Failed to register with new watcher: {}", e);
                    }
                });
            })
            .await?
        };

        Ok(Self {
            connection: connection.clone(),
            bus_name,
            actions,
            exported,
            watcher_task: Some(watcher_task),
        })
    }

    pub fn is_exported(&self) -> bool {
        self.exported.load(Ordering::SeqCst)
    }

    async fn export(&mut self, view: &RenderState) -> anyhow::Result<()> {
        place_objects(self.connection.object_server(), view, self.actions.clone()).await?;

        let bus_name: WellKnownName = self.bus_name.as_str().try_into()?;
        self.connection.request_name(bus_name).await?;
        self.exported.store(true, Ordering::SeqCst);

        if watcher::watcher_exists(&self.connection).await {
            if let Err(e) = watcher::register_item(&self.connection, &self.bus_name).await {
                tracing::warn!("Failed to register StatusNotifierItem: {}", e);
            }
        } else {
            tracing::info!("No StatusNotifierWatcher yet, waiting for one to appear");
        }

        tracing::info!("Indicator shown");
        Ok(())
    }

    async fn unexport(&mut self) -> anyhow::Result<()> {
        remove_objects(self.connection.object_server()).await?;
        self.exported.store(false, Ordering::SeqCst);

        // Requesting the name again on the next export is a no-op if this fails
        let bus_name: WellKnownName = self.bus_name.as_str().try_into()?;
        self.connection.release_name(bus_name).await?;

        tracing::info!("Indicator hidden");
        Ok(())
    }

    async fn update(&mut self, view: &RenderState) -> anyhow::Result<()> {
        let object_server = self.connection.object_server();

        let item_ref = object_server
            .interface::<_, StatusNotifierItem>(ITEM_OBJECT_PATH)
            .await?;
        let new_state = ItemState::from_view(view);
        let old_state = {
            let mut item = item_ref.get_mut().await;
            std::mem::replace(&mut item.state, new_state.clone())
        };

        let emitter = item_ref.signal_emitter();
        if old_state.icon_theme_path != new_state.icon_theme_path {
            StatusNotifierItem::new_icon_theme_path(emitter, &new_state.icon_theme_path).await?;
        }
        if old_state.icon_name != new_state.icon_name {
            StatusNotifierItem::new_icon(emitter).await?;
        }
        if old_state != new_state {
            StatusNotifierItem::new_tool_tip(emitter).await?;
        }

        let menu_ref = object_server.interface::<_, DBusMenu>(MENU_OBJECT_PATH).await?;
        let menu_update = menu_ref.get_mut().await.update(view)?;
        let emitter = menu_ref.signal_emitter();
        match menu_update {
            MenuUpdate::Unchanged => {}
            MenuUpdate::Properties(updated) => {
                DBusMenu::items_properties_updated(emitter, updated, Vec::new()).await?;
            }
            MenuUpdate::Layout(revision) => {
                DBusMenu::layout_updated(emitter, revision, ROOT_ID).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Surface for SniSurface {
    async fn apply_view(&mut self, view: &RenderState) -> anyhow::Result<()> {
        match (view.visible, self.is_exported()) {
            (true, true) => self.update(view).await,
            (true, false) => self.export(view).await,
            (false, true) => self.unexport().await,
            (false, false) => Ok(()),
        }
    }

    async fn destroy(&mut self) -> anyhow::Result<()> {
        if let Some(task) = self.watcher_task.take() {
            task.abort();
        }
        if self.is_exported() {
            self.unexport().await?;
        }
        Ok(())
    }
}
