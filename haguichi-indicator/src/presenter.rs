//! Presentation state machine
//!
//! Holds the last known Haguichi state (mode, modality, window visibility and
//! session presence) and derives the complete view from it. Every transition
//! recomputes the whole [`RenderState`]; nothing depends on the order in
//! which updates arrived.

use crate::labels::Labels;
use crate::ConnectionMode;

/// Number of frames in the connecting animation
pub const ANIMATION_FRAMES: u8 = 3;

/// Icon shown for the item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Disconnected,
    Connected,
    /// Connecting animation frame (0-based)
    Connecting(u8),
}

impl Icon {
    /// Icon theme name for this icon
    pub fn icon_name(&self) -> String {
        match self {
            Icon::Disconnected => "haguichi-disconnected-symbolic".to_string(),
            Icon::Connected => "haguichi-connected-symbolic".to_string(),
            Icon::Connecting(frame) => format!("haguichi-connecting-{}-symbolic", frame + 1),
        }
    }
}

/// Entries of the popup menu, in display order (separators excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuEntry {
    Show,
    Connecting,
    Connect,
    Disconnect,
    Join,
    Create,
    Information,
    Quit,
}

impl MenuEntry {
    pub const ALL: [MenuEntry; 8] = [
        MenuEntry::Show,
        MenuEntry::Connecting,
        MenuEntry::Connect,
        MenuEntry::Disconnect,
        MenuEntry::Join,
        MenuEntry::Create,
        MenuEntry::Information,
        MenuEntry::Quit,
    ];
}

/// Rendered state of a single menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemView {
    pub visible: bool,
    pub enabled: bool,
    /// Checkmark ornament, only used by [`MenuEntry::Show`]
    pub checked: bool,
}

impl ItemView {
    const fn shown(enabled: bool) -> Self {
        Self {
            visible: true,
            enabled,
            checked: false,
        }
    }

    const fn hidden() -> Self {
        Self {
            visible: false,
            enabled: false,
            checked: false,
        }
    }
}

/// Menu part of the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub show: ItemView,
    pub connecting: ItemView,
    pub connect: ItemView,
    pub disconnect: ItemView,
    pub join: ItemView,
    pub create: ItemView,
    pub information: ItemView,
    pub quit: ItemView,
}

impl MenuView {
    pub fn item(&self, entry: MenuEntry) -> ItemView {
        match entry {
            MenuEntry::Show => self.show,
            MenuEntry::Connecting => self.connecting,
            MenuEntry::Connect => self.connect,
            MenuEntry::Disconnect => self.disconnect,
            MenuEntry::Join => self.join,
            MenuEntry::Create => self.create,
            MenuEntry::Information => self.information,
            MenuEntry::Quit => self.quit,
        }
    }

    fn items_mut(&mut self) -> [&mut ItemView; 8] {
        [
            &mut self.show,
            &mut self.connecting,
            &mut self.connect,
            &mut self.disconnect,
            &mut self.join,
            &mut self.create,
            &mut self.information,
            &mut self.quit,
        ]
    }
}

/// Everything the surface needs to draw the indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderState {
    /// Whether the indicator is shown at all
    pub visible: bool,
    pub mode: ConnectionMode,
    pub icon: Icon,
    pub menu: MenuView,
    pub labels: Labels,
    /// Extra directory holding the icons
    pub icon_theme_path: Option<String>,
}

impl RenderState {
    /// Whether activating `entry` should be acted upon
    pub fn is_actionable(&self, entry: MenuEntry) -> bool {
        let item = self.menu.item(entry);
        self.visible && item.visible && item.enabled
    }
}

/// What the owner has to do with the animation timer after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationChange {
    /// Entered Connecting with a session present, a timer has to be started
    Start,
    /// Left Connecting or lost the session, the running timer has to be stopped
    Stop,
    /// Nothing to do
    Keep,
}

/// The presentation state machine
#[derive(Debug, Clone)]
pub struct Presenter {
    mode: ConnectionMode,
    modal: bool,
    app_visible: bool,
    present: bool,
    frame: u8,
    labels: Labels,
    icon_theme_path: Option<String>,
}

impl Presenter {
    pub fn new(labels: Labels) -> Self {
        Self {
            mode: ConnectionMode::Unknown,
            modal: false,
            app_visible: false,
            present: false,
            frame: 0,
            labels,
            icon_theme_path: None,
        }
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn is_modal(&self) -> bool {
        self.modal
    }

    pub fn is_app_visible(&self) -> bool {
        self.app_visible
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Current animation cursor; only meaningful while connecting
    pub fn frame(&self) -> u8 {
        self.frame
    }

    /// Whether an animation timer should be running right now
    pub fn is_animating(&self) -> bool {
        self.present && self.mode == ConnectionMode::Connecting
    }

    pub fn set_labels(&mut self, labels: Labels) {
        self.labels = labels;
    }

    pub fn set_icon_theme_path(&mut self, icon_theme_path: Option<String>) {
        self.icon_theme_path = icon_theme_path;
    }

    pub fn on_mode_changed(&mut self, mode: ConnectionMode) -> AnimationChange {
        let was_animating = self.is_animating();
        self.mode = mode;
        self.animation_change(was_animating)
    }

    pub fn on_modality_changed(&mut self, modal: bool) {
        self.modal = modal;
    }

    pub fn on_visibility_changed(&mut self, visible: bool) {
        self.app_visible = visible;
    }

    /// A vanished session pauses the animation, a returning one resumes it
    /// if it was still connecting.
    pub fn on_presence_changed(&mut self, present: bool) -> AnimationChange {
        let was_animating = self.is_animating();
        self.present = present;
        self.animation_change(was_animating)
    }

    fn animation_change(&mut self, was_animating: bool) -> AnimationChange {
        match (was_animating, self.is_animating()) {
            // Already animating, keep the running timer and its frame
            (true, true) | (false, false) => AnimationChange::Keep,
            (false, true) => {
                self.frame = 0;
                AnimationChange::Start
            }
            (true, false) => {
                self.frame = 0;
                AnimationChange::Stop
            }
        }
    }

    /// Advance the connecting animation by one frame.
    ///
    /// Returns `false` when the mode is no longer Connecting or the session
    /// is gone, in which case the timer driving the animation must stop.
    pub fn on_tick(&mut self) -> bool {
        if !self.is_animating() {
            return false;
        }
        self.frame = (self.frame + 1) % ANIMATION_FRAMES;
        true
    }

    /// Derive the complete view from the current state
    pub fn view(&self) -> RenderState {
        let icon = match self.mode {
            ConnectionMode::Connecting => Icon::Connecting(self.frame),
            ConnectionMode::Connected => Icon::Connected,
            ConnectionMode::Disconnected | ConnectionMode::Unknown => Icon::Disconnected,
        };

        let mut menu = Self::menu_for_mode(self.mode);
        menu.show = ItemView {
            visible: true,
            enabled: true,
            checked: self.app_visible,
        };
        menu.quit = ItemView::shown(true);

        if self.modal {
            for item in menu.items_mut() {
                item.enabled = false;
            }
            menu.quit.enabled = true;
        }

        // No session, nothing to act upon
        if !self.present {
            for item in menu.items_mut() {
                item.visible = false;
                item.enabled = false;
            }
        }

        RenderState {
            visible: self.present,
            mode: self.mode,
            icon,
            menu,
            labels: self.labels.clone(),
            icon_theme_path: self.icon_theme_path.clone(),
        }
    }

    fn menu_for_mode(mode: ConnectionMode) -> MenuView {
        let (connecting, connect, disconnect, join_create, information) = match mode {
            ConnectionMode::Connecting => (
                ItemView::shown(false),
                ItemView::hidden(),
                ItemView::hidden(),
                false,
                true,
            ),
            ConnectionMode::Connected => (
                ItemView::hidden(),
                ItemView::hidden(),
                ItemView::shown(true),
                true,
                true,
            ),
            ConnectionMode::Disconnected => (
                ItemView::hidden(),
                ItemView::shown(true),
                ItemView::hidden(),
                false,
                true,
            ),
            ConnectionMode::Unknown => (
                ItemView::hidden(),
                ItemView::shown(false),
                ItemView::hidden(),
                false,
                false,
            ),
        };

        MenuView {
            show: ItemView::shown(true),
            connecting,
            connect,
            disconnect,
            join: ItemView::shown(join_create),
            create: ItemView::shown(join_create),
            information: ItemView::shown(information),
            quit: ItemView::shown(true),
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(Labels::default())
    }
}
