//! User settings.
//!
//! Persistent toggles that survive restarts. Every toggle is saved as soon
//! as it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snap::{GridIncrement, SnapPolicy};

/// Errors from loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot encode settings: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("no configuration directory on this system")]
    NoConfigDir,
}

/// User-facing toggles and their persisted values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mirror of the host's restriction bypass flag
    pub place_anywhere: bool,
    pub use_gizmo: bool,
    pub do_snap: bool,
    pub grid_increment: GridIncrement,
    /// Rotation snap in degrees
    pub rotation_increment: Option<f32>,

    // Auxiliary panels
    pub display_furnishing_list: bool,
    pub display_inventory: bool,

    /// Show the control panel when layout mode starts
    pub auto_visible: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            place_anywhere: false,
            use_gizmo: false,
            do_snap: false,
            grid_increment: GridIncrement::default(),
            rotation_increment: None,

            display_furnishing_list: true,
            display_inventory: true,

            auto_visible: true,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Snap configuration derived from the current toggles.
    pub fn snap_policy(&self) -> SnapPolicy {
        SnapPolicy {
            enabled: self.do_snap,
            grid: self.grid_increment,
            rotation_increment: self.rotation_increment,
        }
    }
}

/// Somewhere settings live.
pub trait SettingsStore {
    fn settings(&self) -> &Settings;

    fn settings_mut(&mut self) -> &mut Settings;

    /// Persist synchronously.
    fn save(&mut self) -> Result<(), SettingsError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn settings(&self) -> &Settings {
        (**self).settings()
    }

    fn settings_mut(&mut self) -> &mut Settings {
        (**self).settings_mut()
    }

    fn save(&mut self) -> Result<(), SettingsError> {
        (**self).save()
    }
}

/// Settings backed by a TOML file.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl FileSettingsStore {
    /// Open the store at `path`. A missing file yields defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::info!("Loaded settings from {:?}", path);
                Settings::from_toml_str(&text)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {:?}, using defaults", path);
                Settings::default()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        Ok(Self { path, settings })
    }

    /// Open the store at [`Self::default_path`].
    pub fn open_default() -> Result<Self, SettingsError> {
        Self::open(Self::default_path().ok_or(SettingsError::NoConfigDir)?)
    }

    /// Get the default settings path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("bdth");
            p.push("settings.toml");
            p
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn save(&mut self) -> Result<(), SettingsError> {
        let text = self.settings.to_toml_string()?;
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, text).map_err(io_err)?;
        log::debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

/// Settings kept in memory. Counts saves.
#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore {
    settings: Settings,
    saves: usize,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self { settings, saves: 0 }
    }

    /// Number of times `save` has been called.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SettingsStore for MemorySettingsStore {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn save(&mut self) -> Result<(), SettingsError> {
        self.saves += 1;
        Ok(())
    }
}
