//! Loading [`Settings`] from a RON file.
//!
//! The file is optional. Missing keys take their defaults, and a file that
//! cannot be read or parsed is reported and replaced by the defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use export_core::Settings;

pub const DEFAULT_SETTINGS_FILE: &str = "auction_export.ron";

pub fn load_settings(path: &Path) -> Settings {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            engine_info!("No settings file at {:?}; using defaults", path);
            return Settings::default();
        }
        Err(err) => {
            engine_warn!("Failed to read settings from {:?}: {}", path, err);
            return Settings::default();
        }
    };

    match ron::from_str::<Settings>(&content) {
        Ok(settings) => {
            engine_info!("Loaded settings from {:?}", path);
            settings
        }
        Err(err) => {
            engine_warn!("Failed to parse settings from {:?}: {}", path, err);
            Settings::default()
        }
    }
}
