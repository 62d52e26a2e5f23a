//! Haguichi Indicator Library
//!
//! This library mirrors the state of a running Haguichi session (a Hamachi
//! front-end) over the session D-Bus and renders it as a StatusNotifierItem
//! with a dbusmenu popup. User interaction with the item is proxied back to
//! Haguichi as remote method calls.

pub mod animator;
pub mod config;
pub mod config_watcher;
pub mod dbusmenu;
pub mod indicator;
pub mod labels;
pub mod presenter;
pub mod remote;
pub mod sni;
pub mod surface;
pub mod watcher;

/// Connection state reported by Haguichi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// Hamachi is logging in
    Connecting,
    /// Hamachi is logged in
    Connected,
    /// Hamachi is logged out
    Disconnected,
    /// Anything else Haguichi reports (not installed, not configured, ...)
    #[default]
    Unknown,
}

impl ConnectionMode {
    /// Parse the mode string sent by `GetMode` / `ModeChanged`.
    ///
    /// Unrecognised strings collapse to [`ConnectionMode::Unknown`].
    pub fn from_str(s: &str) -> Self {
        match s {
            "Connecting" => ConnectionMode::Connecting,
            "Connected" => ConnectionMode::Connected,
            "Disconnected" => ConnectionMode::Disconnected,
            _ => ConnectionMode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Connecting => "Connecting",
            ConnectionMode::Connected => "Connected",
            ConnectionMode::Disconnected => "Disconnected",
            ConnectionMode::Unknown => "Unknown",
        }
    }
}

/// D-Bus well-known names and paths
pub mod dbus {
    /// Haguichi well-known name
    pub const HAGUICHI_BUS_NAME: &str = "com.github.ztefn.haguichi";
    /// Haguichi object path
    pub const HAGUICHI_OBJECT_PATH: &str = "/com/github/ztefn/haguichi";
    /// Haguichi interface name
    pub const HAGUICHI_INTERFACE: &str = "com.github.ztefn.haguichi";

    /// Name, path and interface used by Haguichi releases before 1.4
    pub const LEGACY_BUS_NAME: &str = "apps.Haguichi";
    pub const LEGACY_OBJECT_PATH: &str = "/apps/Haguichi";
    pub const LEGACY_INTERFACE: &str = "apps.Haguichi";

    /// StatusNotifierWatcher well-known name
    pub const WATCHER_BUS_NAME: &str = "org.kde.StatusNotifierWatcher";

    /// StatusNotifierItem well-known name prefix
    pub const ITEM_BUS_NAME_PREFIX: &str = "org.kde.StatusNotifierItem";
    /// Object path of our StatusNotifierItem
    pub const ITEM_OBJECT_PATH: &str = "/StatusNotifierItem";
    /// Object path of our dbusmenu
    pub const MENU_OBJECT_PATH: &str = "/MenuBar";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ConnectionMode::from_str("Connecting"), ConnectionMode::Connecting);
        assert_eq!(ConnectionMode::from_str("Connected"), ConnectionMode::Connected);
        assert_eq!(ConnectionMode::from_str("Disconnected"), ConnectionMode::Disconnected);
        assert_eq!(ConnectionMode::from_str("Not configured"), ConnectionMode::Unknown);
        assert_eq!(ConnectionMode::from_str(""), ConnectionMode::Unknown);
        // Mode strings are matched exactly
        assert_eq!(ConnectionMode::from_str("connected"), ConnectionMode::Unknown);
    }
}
