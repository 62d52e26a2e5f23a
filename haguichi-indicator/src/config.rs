use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use zbus::names::{InterfaceName, WellKnownName};
use zbus::zvariant::ObjectPath;

use crate::dbus::{HAGUICHI_BUS_NAME, HAGUICHI_INTERFACE, HAGUICHI_OBJECT_PATH};

/// Shortest animation interval accepted from the config file
pub const MIN_ANIMATION_INTERVAL_MS: u64 = 50;

/// Errors found while validating a parsed config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bus name {name:?}: {source}")]
    BusName {
        name: String,
        #[source]
        source: zbus::names::Error,
    },
    #[error("invalid object path {path:?}: {source}")]
    ObjectPath {
        path: String,
        #[source]
        source: zbus::zvariant::Error,
    },
    #[error("invalid interface name {name:?}: {source}")]
    Interface {
        name: String,
        #[source]
        source: zbus::names::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub indicator: IndicatorConfig,
}

/// Where to find the Haguichi session on the bus
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Well-known bus name Haguichi owns
    pub bus_name: String,
    /// Object path of the Haguichi session object
    pub object_path: String,
    /// Interface name of the Haguichi session object
    pub interface: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bus_name: HAGUICHI_BUS_NAME.to_string(),
            object_path: HAGUICHI_OBJECT_PATH.to_string(),
            interface: HAGUICHI_INTERFACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Time between frames of the connecting animation in milliseconds
    pub animation_interval_ms: u64,
    /// Extra directory searched for the haguichi-*-symbolic icons
    /// (empty = icon theme only)
    pub icon_theme_path: String,
    /// Scroll up shows the Haguichi window, scroll down hides it
    pub scroll_actions: bool,
    /// Keep keyboard mnemonics in menu labels
    pub mnemonics: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            animation_interval_ms: 400,
            icon_theme_path: String::new(),
            scroll_actions: true,
            mnemonics: true,
        }
    }
}

impl IndicatorConfig {
    /// Animation interval, clamped to a sane minimum
    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms.max(MIN_ANIMATION_INTERVAL_MS))
    }

    /// Icon theme path with `~` expanded, if one is configured
    pub fn icon_theme_path(&self) -> Option<String> {
        let path = self.icon_theme_path.trim();
        if path.is_empty() {
            return None;
        }

        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return Some(home.join(rest).to_string_lossy().into_owned());
            }
        }
        Some(path.to_string())
    }
}

impl ServiceConfig {
    /// Check that the configured names are valid D-Bus names
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        WellKnownName::try_from(self.bus_name.as_str()).map_err(|source| {
            ConfigError::BusName {
                name: self.bus_name.clone(),
                source,
            }
        })?;
        ObjectPath::try_from(self.object_path.as_str()).map_err(|source| {
            ConfigError::ObjectPath {
                path: self.object_path.clone(),
                source,
            }
        })?;
        InterfaceName::try_from(self.interface.as_str()).map_err(|source| {
            ConfigError::Interface {
                name: self.interface.clone(),
                source,
            }
        })?;
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path (~/.config/haguichi-indicator/config.toml)
    /// Creates the config file with defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    /// Creates the config file with defaults if it doesn't exist
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found at {:?}, creating with defaults", path);
            Self::write_default_config(path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.service.validate()?;
        Ok(config)
    }

    /// Write the default configuration to a file
    fn write_default_config(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, Self::default_config_string())
            .with_context(|| format!("Failed to write default config to {:?}", path))?;

        tracing::info!("Created default config at {:?}", path);
        Ok(())
    }

    /// Generate the default configuration as a TOML string
    fn default_config_string() -> String {
        r#"# Haguichi Indicator Configuration

[service]
bus_name = "com.github.ztefn.haguichi"
object_path = "/com/github/ztefn/haguichi"
interface = "com.github.ztefn.haguichi"

# Haguichi releases before 1.4 used these instead
# bus_name = "apps.Haguichi"
# object_path = "/apps/Haguichi"
# interface = "apps.Haguichi"

[indicator]
# Time between frames of the connecting animation
animation_interval_ms = 400
# Extra directory containing haguichi-*-symbolic icons (empty = icon theme)
icon_theme_path = ""
# Scroll up to show the Haguichi window, scroll down to hide it
scroll_actions = true
# Keep keyboard mnemonics in menu labels
mnemonics = true
"#
        .to_string()
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("haguichi-indicator")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.bus_name, "com.github.ztefn.haguichi");
        assert_eq!(config.indicator.animation_interval(), Duration::from_millis(400));
        assert!(config.indicator.scroll_actions);
        assert!(config.indicator.icon_theme_path().is_none());
    }

    #[test]
    fn test_default_config_string_matches_default() {
        let config = Config::parse(&Config::default_config_string()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_legacy_service() {
        use crate::dbus::{LEGACY_BUS_NAME, LEGACY_INTERFACE, LEGACY_OBJECT_PATH};

        let toml = format!(
            "[service]\nbus_name = \"{}\"\nobject_path = \"{}\"\ninterface = \"{}\"\n",
            LEGACY_BUS_NAME, LEGACY_OBJECT_PATH, LEGACY_INTERFACE
        );
        let config = Config::parse(&toml).unwrap();
        assert_eq!(config.service.bus_name, LEGACY_BUS_NAME);
        assert_eq!(config.service.object_path, LEGACY_OBJECT_PATH);
        assert_eq!(config.indicator, IndicatorConfig::default());
    }

    #[test]
    fn test_parse_indicator_section() {
        let toml = r#"
[indicator]
animation_interval_ms = 10
icon_theme_path = "/usr/share/haguichi/icons"
scroll_actions = false
mnemonics = false
"#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(
            config.indicator.animation_interval(),
            Duration::from_millis(MIN_ANIMATION_INTERVAL_MS)
        );
        assert_eq!(
            config.indicator.icon_theme_path().as_deref(),
            Some("/usr/share/haguichi/icons")
        );
        assert!(!config.indicator.scroll_actions);
        assert!(!config.indicator.mnemonics);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let toml = r#"
[service]
object_path = "not/a/path"
"#;
        assert!(Config::parse(toml).is_err());

        let toml = r#"
[service]
bus_name = "no-dots"
"#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haguichi-indicator").join("config.toml");

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded, config);
    }
}
