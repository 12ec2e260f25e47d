//! Persisted player preferences
//!
//! Settings live in a small JSON file. The engine never reads them directly;
//! front-ends turn them into [`LoadOptions`] and pass those to
//! [`Player::load`](crate::Player::load).

use crate::player::LoadOptions;
use crate::{PlayerError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// User preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Start playing as soon as a disc is loaded
    pub auto_play: bool,
    /// Index buttons move to the adjacent track at the first/last index
    pub index_button_change_track: bool,
    /// Treat index 0 of track 1 as a playable hidden track
    pub allow_skip_hidden_track: bool,
    /// Play data tracks like old, non-compliant players
    pub play_data_tracks: bool,
    /// Generate a TOC for images that lack one
    pub generate_missing_toc: bool,
    /// Default playback volume (0-100)
    pub volume: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_play: false,
            index_button_change_track: false,
            allow_skip_hidden_track: false,
            play_data_tracks: false,
            generate_missing_toc: true,
            volume: 100,
        }
    }
}

impl Settings {
    /// Read settings from `path`
    ///
    /// A missing file yields the defaults, as does a file that does not parse.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!("No settings at {} ({}), using defaults", path.display(), e);
                return Settings::default();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Couldn't parse settings {}, reverting to default: {}", path.display(), e);
            Settings::default()
        })
    }

    /// Write settings to `path` as indented JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PlayerError::Settings(format!("Failed to encode settings: {}", e)))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Options handed to [`Player::load`](crate::Player::load)
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            generate_missing_toc: self.generate_missing_toc,
            load_hidden_tracks: self.allow_skip_hidden_track,
            load_data_tracks: self.play_data_tracks,
            auto_play: self.auto_play,
            default_volume: self.volume,
        }
    }
}
