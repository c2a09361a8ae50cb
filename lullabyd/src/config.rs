use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, DEFAULT_SOCKET_NAME};

/// Where the freedesktop sound theme keeps its alarm sound.
pub const FREEDESKTOP_ALARM_SOUND: &str =
    "/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Root the sound selectors from the UI are resolved against.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    /// What the alarm service rings, relative to `assets_dir`.
    #[serde(default = "default_alarm_sound")]
    pub alarm_sound: String,
    /// Played when the selected alarm sound can't be.
    #[serde(default = "default_system_alarm_sound")]
    pub system_alarm_sound: PathBuf,
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    #[serde(default)]
    pub notification: NotificationText,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NotificationText {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// What the user allowed the daemon to do.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    #[serde(default = "always_true")]
    pub audio: bool,
    #[serde(default = "always_true")]
    pub vibrate: bool,
    #[serde(default = "always_true")]
    pub notifications: bool,
}

impl Permissions {
    #[must_use]
    pub const fn all_granted(&self) -> bool {
        self.audio && self.vibrate && self.notifications
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            audio: true,
            vibrate: true,
            notifications: true,
        }
    }
}

impl Default for NotificationText {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            app_name: default_app_name(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            alarm_sound: default_alarm_sound(),
            system_alarm_sound: default_system_alarm_sound(),
            socket_name: default_socket_name(),
            notification: NotificationText::default(),
            permissions: Permissions::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the config at `path`. A missing file gives the defaults.
    ///
    /// # Errors
    /// Fails if the file exists but can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(toml::from_str(&config)?)
    }

    /// # Errors
    /// Fails if the config can't be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string(self)?;
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, config).map_err(write_error)
    }

    /// Writes the default config to `path` unless a file is already there
    /// and `force` is off. Returns whether anything was written.
    ///
    /// # Errors
    /// Fails if the config can't be written.
    pub fn init(path: &Path, force: bool) -> Result<bool, ConfigError> {
        if path.exists() && !force {
            return Ok(false);
        }
        Self::new().save(path)?;
        Ok(true)
    }

    /// # Errors
    /// Fails if the platform has no home directory to put the config in.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = project_dirs()?.config_dir().to_path_buf();
        path.push("config.toml");
        Ok(path)
    }
}

fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
    directories::ProjectDirs::from("", "", "lullaby").ok_or(ConfigError::NoProjectDirs)
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

fn default_assets_dir() -> PathBuf {
    project_dirs().map_or_else(
        |_| PathBuf::from("assets"),
        |dirs| dirs.data_dir().join("assets"),
    )
}

fn default_alarm_sound() -> String {
    "sounds/3.mp3".to_string()
}

fn default_system_alarm_sound() -> PathBuf {
    PathBuf::from(FREEDESKTOP_ALARM_SOUND)
}

fn default_socket_name() -> String {
    DEFAULT_SOCKET_NAME.to_string()
}

fn default_title() -> String {
    "Alarm".to_string()
}

fn default_body() -> String {
    "Time to wake up".to_string()
}

fn default_app_name() -> String {
    "lullaby".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.alarm_sound, "sounds/3.mp3");
        assert!(config.permissions.all_granted());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::new();
        config.alarm_sound = "sounds/birds.mp3".to_string();
        config.permissions.vibrate = false;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "assets_dir = \"/opt/lullaby\"\n[permissions]\nnotifications = false\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.assets_dir, PathBuf::from("/opt/lullaby"));
        assert_eq!(config.socket_name, DEFAULT_SOCKET_NAME);
        assert!(config.permissions.audio);
        assert!(!config.permissions.notifications);
        assert_eq!(config.notification, NotificationText::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "alarm_sound = [").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn init_keeps_an_existing_file_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Config::init(&path, false).unwrap());
        assert_eq!(Config::load(&path).unwrap(), Config::new());

        std::fs::write(&path, "alarm_sound = \"sounds/birds.mp3\"\n").unwrap();
        assert!(!Config::init(&path, false).unwrap());
        assert_eq!(Config::load(&path).unwrap().alarm_sound, "sounds/birds.mp3");

        assert!(Config::init(&path, true).unwrap());
        assert_eq!(Config::load(&path).unwrap(), Config::new());
    }
}
