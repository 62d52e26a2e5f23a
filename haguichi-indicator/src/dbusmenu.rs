//! DBusMenu protocol implementation
//!
//! This module exports the com.canonical.dbusmenu interface that panels use
//! to draw the popup menu of our StatusNotifierItem. The layout is fixed;
//! only item properties change with the rendered state.

use std::collections::HashMap;

use zbus::interface;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Structure, Value};

use crate::presenter::{MenuEntry, RenderState};
use crate::surface::{ActionSink, UserAction};

/// Protocol version we implement
const DBUSMENU_VERSION: u32 = 3;

/// Id of the invisible root item
pub const ROOT_ID: i32 = 0;

/// A row of the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Entry(MenuEntry),
    Separator,
}

/// Menu rows in display order; the item id is the index plus one
const LAYOUT: [Slot; 12] = [
    Slot::Entry(MenuEntry::Show),
    Slot::Separator,
    Slot::Entry(MenuEntry::Connecting),
    Slot::Entry(MenuEntry::Connect),
    Slot::Entry(MenuEntry::Disconnect),
    Slot::Separator,
    Slot::Entry(MenuEntry::Join),
    Slot::Entry(MenuEntry::Create),
    Slot::Separator,
    Slot::Entry(MenuEntry::Information),
    Slot::Separator,
    Slot::Entry(MenuEntry::Quit),
];

/// Menu item id of an entry
pub fn entry_id(entry: MenuEntry) -> i32 {
    LAYOUT
        .iter()
        .position(|slot| *slot == Slot::Entry(entry))
        .map(|index| index as i32 + 1)
        .unwrap_or(ROOT_ID)
}

/// Entry behind a menu item id, `None` for the root, separators and unknown ids
pub fn entry_for_id(id: i32) -> Option<MenuEntry> {
    let index = usize::try_from(id).ok()?.checked_sub(1)?;
    match LAYOUT.get(index)? {
        Slot::Entry(entry) => Some(*entry),
        Slot::Separator => None,
    }
}

/// A menu item as exported over DBusMenu
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    /// Unique ID for this menu item
    pub id: i32,
    /// Display label (may contain mnemonics)
    pub label: String,
    /// Whether the item is enabled/clickable
    pub enabled: bool,
    /// Whether the item is visible
    pub visible: bool,
    /// Item type: "standard" or "separator"
    pub item_type: String,
    /// Toggle type: "checkmark", "radio", or empty
    pub toggle_type: Option<String>,
    /// Toggle state: 0 (off), 1 (on)
    pub toggle_state: i32,
}

impl Default for MenuItem {
    fn default() -> Self {
        Self {
            id: 0,
            label: String::new(),
            enabled: true,
            visible: true,
            item_type: "standard".to_string(),
            toggle_type: None,
            toggle_state: 0,
        }
    }
}

fn owned<'a>(value: impl Into<Value<'a>>) -> zbus::fdo::Result<OwnedValue> {
    OwnedValue::try_from(value.into()).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

impl MenuItem {
    /// Properties of this item, limited to `filter` unless it is empty
    pub fn properties(&self, filter: &[String]) -> zbus::fdo::Result<HashMap<String, OwnedValue>> {
        let wanted = |name: &str| filter.is_empty() || filter.iter().any(|f| f == name);
        let mut properties = HashMap::new();

        if self.item_type == "separator" {
            if wanted("type") {
                properties.insert("type".to_string(), owned("separator")?);
            }
        } else if wanted("label") {
            properties.insert("label".to_string(), owned(self.label.as_str())?);
        }
        if wanted("enabled") {
            properties.insert("enabled".to_string(), owned(self.enabled)?);
        }
        if wanted("visible") {
            properties.insert("visible".to_string(), owned(self.visible)?);
        }
        if let Some(toggle_type) = &self.toggle_type {
            if wanted("toggle-type") {
                properties.insert("toggle-type".to_string(), owned(toggle_type.as_str())?);
            }
            if wanted("toggle-state") {
                properties.insert("toggle-state".to_string(), owned(self.toggle_state)?);
            }
        }

        Ok(properties)
    }
}

/// Build the menu items for a rendered state
pub fn menu_items(view: &RenderState) -> Vec<MenuItem> {
    LAYOUT
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let id = index as i32 + 1;
            match slot {
                Slot::Separator => MenuItem {
                    id,
                    item_type: "separator".to_string(),
                    enabled: true,
                    visible: view.visible,
                    ..Default::default()
                },
                Slot::Entry(entry) => {
                    let item = view.menu.item(*entry);
                    let labels = &view.labels;
                    let label = match entry {
                        MenuEntry::Show => &labels.show,
                        MenuEntry::Connecting => &labels.connecting,
                        MenuEntry::Connect => &labels.connect,
                        MenuEntry::Disconnect => &labels.disconnect,
                        MenuEntry::Join => &labels.join,
                        MenuEntry::Create => &labels.create,
                        MenuEntry::Information => &labels.information,
                        MenuEntry::Quit => &labels.quit,
                    };
                    let is_show = *entry == MenuEntry::Show;

                    MenuItem {
                        id,
                        label: label.clone(),
                        enabled: item.enabled,
                        visible: item.visible,
                        toggle_type: is_show.then(|| "checkmark".to_string()),
                        toggle_state: i32::from(item.checked),
                        ..Default::default()
                    }
                }
            }
        })
        .collect()
}

/// Outcome of [`DBusMenu::update`]
#[derive(Debug, PartialEq)]
pub enum MenuUpdate {
    Unchanged,
    /// Only state changed; full properties of every changed item
    Properties(Vec<(i32, HashMap<String, OwnedValue>)>),
    /// Labels changed, hosts should fetch the layout of this revision again
    Layout(u32),
}

/// Exported com.canonical.dbusmenu object
pub struct DBusMenu {
    revision: u32,
    items: Vec<MenuItem>,
    icon_theme_path: Vec<String>,
    actions: ActionSink,
}

impl DBusMenu {
    pub fn new(view: &RenderState, actions: ActionSink) -> Self {
        Self {
            revision: 1,
            items: menu_items(view),
            icon_theme_path: view.icon_theme_path.iter().cloned().collect(),
            actions,
        }
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Replace the items and report what hosts have to be told
    pub fn update(&mut self, view: &RenderState) -> zbus::fdo::Result<MenuUpdate> {
        self.icon_theme_path = view.icon_theme_path.iter().cloned().collect();

        let items = menu_items(view);
        if items == self.items {
            return Ok(MenuUpdate::Unchanged);
        }

        let relabelled = items
            .iter()
            .zip(&self.items)
            .any(|(new, old)| new.label != old.label);
        let mut updated = Vec::new();
        if !relabelled {
            for (new, old) in items.iter().zip(&self.items) {
                if new != old {
                    updated.push((new.id, new.properties(&[])?));
                }
            }
        }

        self.items = items;
        self.revision = self.revision.wrapping_add(1);

        if relabelled {
            Ok(MenuUpdate::Layout(self.revision))
        } else {
            Ok(MenuUpdate::Properties(updated))
        }
    }

    fn item(&self, id: i32) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn root_properties(&self, filter: &[String]) -> zbus::fdo::Result<HashMap<String, OwnedValue>> {
        let mut properties = HashMap::new();
        if filter.is_empty() || filter.iter().any(|f| f == "children-display") {
            properties.insert("children-display".to_string(), owned("submenu")?);
        }
        Ok(properties)
    }

    fn handle_event(&self, id: i32, event_id: &str) -> bool {
        if event_id != "clicked" {
            tracing::trace!("Ignoring menu event {} on item {}", event_id, id);
            return true;
        }

        match entry_for_id(id) {
            Some(entry) => {
                tracing::debug!("Menu item clicked: {:?}", entry);
                (self.actions)(UserAction::Activate(entry));
                true
            }
            None => false,
        }
    }
}

#[interface(name = "com.canonical.dbusmenu")]
impl DBusMenu {
    /// Get the menu layout starting from a parent item
    #[zbus(out_args("revision", "layout"))]
    async fn get_layout(
        &self,
        parent_id: i32,
        recursion_depth: i32,
        property_names: Vec<String>,
    ) -> zbus::fdo::Result<(u32, (i32, HashMap<String, OwnedValue>, Vec<OwnedValue>))> {
        if parent_id != ROOT_ID {
            // Items have no children
            let item = self.item(parent_id).ok_or_else(|| {
                zbus::fdo::Error::InvalidArgs(format!("Unknown menu item: {}", parent_id))
            })?;
            return Ok((
                self.revision,
                (item.id, item.properties(&property_names)?, Vec::new()),
            ));
        }

        let mut children = Vec::new();
        if recursion_depth != 0 {
            for item in &self.items {
                let child = Structure::from((
                    item.id,
                    item.properties(&property_names)?,
                    Vec::<OwnedValue>::new(),
                ));
                children.push(owned(child)?);
            }
        }

        Ok((
            self.revision,
            (ROOT_ID, self.root_properties(&property_names)?, children),
        ))
    }

    async fn get_group_properties(
        &self,
        ids: Vec<i32>,
        property_names: Vec<String>,
    ) -> zbus::fdo::Result<Vec<(i32, HashMap<String, OwnedValue>)>> {
        let mut result = Vec::new();
        for item in &self.items {
            if ids.is_empty() || ids.contains(&item.id) {
                result.push((item.id, item.properties(&property_names)?));
            }
        }
        Ok(result)
    }

    async fn get_property(&self, id: i32, name: String) -> zbus::fdo::Result<OwnedValue> {
        let properties = if id == ROOT_ID {
            self.root_properties(&[])?
        } else {
            self.item(id)
                .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("Unknown menu item: {}", id)))?
                .properties(&[])?
        };

        properties
            .get(&name)
            .map(|value| value.try_clone())
            .transpose()
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("Unknown property: {}", name)))
    }

    /// Send an event to a menu item (e.g., "clicked")
    async fn event(
        &self,
        id: i32,
        event_id: String,
        _data: OwnedValue,
        _timestamp: u32,
    ) -> zbus::fdo::Result<()> {
        if self.handle_event(id, &event_id) {
            Ok(())
        } else {
            Err(zbus::fdo::Error::InvalidArgs(format!("Unknown menu item: {}", id)))
        }
    }

    /// Send several events at once, returning the ids that were not found
    async fn event_group(&self, events: Vec<(i32, String, OwnedValue, u32)>) -> Vec<i32> {
        events
            .into_iter()
            .filter(|(id, event_id, _, _)| !self.handle_event(*id, event_id))
            .map(|(id, _, _, _)| id)
            .collect()
    }

    /// The menu never changes on demand
    async fn about_to_show(&self, _id: i32) -> bool {
        false
    }

    #[zbus(out_args("updates_needed", "id_errors"))]
    async fn about_to_show_group(&self, _ids: Vec<i32>) -> (Vec<i32>, Vec<i32>) {
        (Vec::new(), Vec::new())
    }

    #[zbus(property)]
    fn version(&self) -> u32 {
        DBUSMENU_VERSION
    }

    #[zbus(property)]
    fn text_direction(&self) -> String {
        "ltr".to_string()
    }

    #[zbus(property)]
    fn status(&self) -> String {
        "normal".to_string()
    }

    #[zbus(property)]
    fn icon_theme_path(&self) -> Vec<String> {
        self.icon_theme_path.clone()
    }

    #[zbus(signal)]
    pub async fn layout_updated(
        emitter: &SignalEmitter<'_>,
        revision: u32,
        parent: i32,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn items_properties_updated(
        emitter: &SignalEmitter<'_>,
        updated_props: Vec<(i32, HashMap<String, OwnedValue>)>,
        removed_props: Vec<(i32, Vec<String>)>,
    ) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::labels::Labels;
    use crate::presenter::Presenter;
    use crate::ConnectionMode;

    fn connected_view() -> RenderState {
        let mut presenter = Presenter::default();
        presenter.on_presence_changed(true);
        presenter.on_mode_changed(ConnectionMode::Connected);
        presenter.view()
    }

    fn recording_sink() -> (ActionSink, Arc<Mutex<Vec<UserAction>>>) {
        let actions = Arc::new(Mutex::new(Vec::new()));
        let recorded = actions.clone();
        let sink: ActionSink = Arc::new(move |action| {
            recorded.lock().unwrap().push(action);
            true
        });
        (sink, actions)
    }

    #[test]
    fn test_menu_item_default() {
        let item = MenuItem::default();
        assert_eq!(item.id, 0);
        assert!(item.enabled);
        assert!(item.visible);
        assert_eq!(item.item_type, "standard");
        assert_eq!(item.toggle_state, 0);
    }

    #[test]
    fn test_entry_ids_round_trip() {
        for entry in MenuEntry::ALL {
            assert_eq!(entry_for_id(entry_id(entry)), Some(entry));
        }
        assert_eq!(entry_for_id(ROOT_ID), None);
        assert_eq!(entry_for_id(2), None); // separator
        assert_eq!(entry_for_id(99), None);
        assert_eq!(entry_for_id(-1), None);
    }

    #[test]
    fn test_menu_items_follow_view() {
        let items = menu_items(&connected_view());
        assert_eq!(items.len(), LAYOUT.len());

        let disconnect = &items[entry_id(MenuEntry::Disconnect) as usize - 1];
        assert_eq!(disconnect.label, "_Disconnect");
        assert!(disconnect.visible && disconnect.enabled);

        let connect = &items[entry_id(MenuEntry::Connect) as usize - 1];
        assert!(!connect.visible);

        let show = &items[entry_id(MenuEntry::Show) as usize - 1];
        assert_eq!(show.toggle_type.as_deref(), Some("checkmark"));
        assert_eq!(show.toggle_state, 0);

        assert_eq!(items[1].item_type, "separator");
    }

    #[test]
    fn test_properties_filter() {
        let items = menu_items(&connected_view());
        let show = &items[0];

        let all = show.properties(&[]).unwrap();
        assert!(all.contains_key("label"));
        assert!(all.contains_key("toggle-type"));
        assert!(!all.contains_key("type"));

        let filtered = show.properties(&["enabled".to_string()]).unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("enabled"));

        let separator = items[1].properties(&[]).unwrap();
        assert!(separator.contains_key("type"));
        assert!(!separator.contains_key("label"));
    }

    #[test]
    fn test_update_bumps_revision_only_on_change() {
        let (sink, _) = recording_sink();
        let view = connected_view();
        let mut menu = DBusMenu::new(&view, sink);
        let revision = menu.revision();

        assert_eq!(menu.update(&view).unwrap(), MenuUpdate::Unchanged);
        assert_eq!(menu.revision(), revision);

        let mut presenter = Presenter::default();
        presenter.on_presence_changed(true);
        presenter.on_mode_changed(ConnectionMode::Disconnected);
        assert_ne!(menu.update(&presenter.view()).unwrap(), MenuUpdate::Unchanged);
        assert_eq!(menu.revision(), revision + 1);
    }

    #[test]
    fn test_state_change_updates_changed_items_only() {
        let (sink, _) = recording_sink();
        let mut presenter = Presenter::default();
        presenter.on_presence_changed(true);
        presenter.on_mode_changed(ConnectionMode::Connected);
        let mut menu = DBusMenu::new(&presenter.view(), sink);

        presenter.on_visibility_changed(true);
        let MenuUpdate::Properties(updated) = menu.update(&presenter.view()).unwrap() else {
            panic!("expected a properties update");
        };
        assert_eq!(updated.len(), 1);

        let (id, properties) = &updated[0];
        assert_eq!(*id, entry_id(MenuEntry::Show));
        let state = properties["toggle-state"].try_clone().unwrap();
        assert_eq!(i32::try_from(state).unwrap(), 1);
    }

    #[test]
    fn test_relabel_requests_layout() {
        let (sink, _) = recording_sink();
        let mut presenter = Presenter::default();
        presenter.on_presence_changed(true);
        let mut menu = DBusMenu::new(&presenter.view(), sink);

        presenter.set_labels(Labels::new(false));
        assert_eq!(
            menu.update(&presenter.view()).unwrap(),
            MenuUpdate::Layout(menu.revision())
        );
        assert_eq!(menu.items[0].label, "Show Haguichi");
    }

    #[test]
    fn test_clicked_event_forwards_action() {
        let (sink, actions) = recording_sink();
        let menu = DBusMenu::new(&connected_view(), sink);

        assert!(menu.handle_event(entry_id(MenuEntry::Join), "clicked"));
        assert!(menu.handle_event(entry_id(MenuEntry::Join), "hovered"));
        assert!(!menu.handle_event(2, "clicked"));

        assert_eq!(
            *actions.lock().unwrap(),
            vec![UserAction::Activate(MenuEntry::Join)]
        );
    }
}
