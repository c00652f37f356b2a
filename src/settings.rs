use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::gesture::GestureConfig;
use crate::prefetch::PrefetchConfig;
use crate::visibility::ChromeConfig;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "folio";

const SETTINGS_HEADER: &str = "\
# folio reader settings
# Durations are milliseconds, distances are CSS pixels.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub gestures: GestureConfig,

    #[serde(default)]
    pub chrome: ChromeConfig,

    #[serde(default)]
    pub prefetch: PrefetchConfig,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            gestures: GestureConfig::default(),
            chrome: ChromeConfig::default(),
            prefetch: PrefetchConfig::default(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load the user's config file, creating it with defaults when missing.
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        save_settings_to_file(&current(), &path);
    }
}

/// Replace the global settings with the contents of `path`. Read or parse
/// failures keep the current settings. Returns true on success.
pub fn load_settings_from_path(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return false;
        }
    };

    let mut settings = match serde_yaml::from_str::<Settings>(&content) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            return false;
        }
    };
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_file(&settings, path);
    }

    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
    true
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) -> bool {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return false;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return false;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => {
            debug!("Saved settings to {path:?}");
            true
        }
        Err(e) => {
            error!("Failed to save settings to {path:?}: {e}");
            false
        }
    }
}

pub fn save_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, cannot save settings");
        return;
    };
    save_settings_to_file(&current(), &path);
}

// Public API for accessing/modifying settings

/// Snapshot of the process-wide settings.
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

/// Change the process-wide settings in place (not persisted).
pub fn update(f: impl FnOnce(&mut Settings)) {
    if let Ok(mut settings) = SETTINGS.write() {
        f(&mut settings);
    }
}

pub fn get_prefetch_radius() -> usize {
    SETTINGS
        .read()
        .map(|s| s.prefetch.radius)
        .unwrap_or_else(|_| PrefetchConfig::default().radius)
}

pub fn set_two_page(two_page: bool) {
    update(|s| s.prefetch.two_page = two_page);
    save_settings();
}
