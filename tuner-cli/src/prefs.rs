//! # Preference Persistence
//!
//! The last-selected instrument, the auto-detect flag, and the last manual
//! note, stored as a small JSON file. Anything unreadable (missing file,
//! corrupt JSON, an instrument that no longer exists) falls back to the
//! defaults with a logged warning; loading never fails.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tuner_core::catalog::{self, Note};

const SETTINGS_FILE: &str = "tuner_settings.json";

/// User preferences, read at startup and written on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Instrument key into the tuning catalog.
    pub tuning: String,
    /// Whether the nearest note is matched automatically.
    pub auto_detect: bool,
    /// The manually chosen target note, if any.
    pub selected_note: Option<Note>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            tuning: catalog::DEFAULT_TUNING.to_string(),
            auto_detect: true,
            selected_note: None,
        }
    }
}

/// Settings file in the working directory unless overridden on the
/// command line.
pub fn default_path() -> PathBuf {
    PathBuf::from(SETTINGS_FILE)
}

/// Loads preferences, substituting defaults for anything unusable.
pub fn load(path: &Path) -> Preferences {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not read {}: {e}; using defaults", path.display());
            }
            return Preferences::default();
        }
    };

    let mut preferences: Preferences = match serde_json::from_str(&raw) {
        Ok(preferences) => preferences,
        Err(e) => {
            log::warn!("could not parse {}: {e}; using defaults", path.display());
            return Preferences::default();
        }
    };

    // A stored instrument the catalog no longer knows reverts to standard.
    if catalog::get(&preferences.tuning).is_none() {
        log::warn!(
            "stored instrument `{}` is not in the catalog; using `{}`",
            preferences.tuning,
            catalog::DEFAULT_TUNING
        );
        preferences.tuning = catalog::DEFAULT_TUNING.to_string();
        preferences.selected_note = None;
    }
    preferences
}

/// Writes preferences as pretty JSON.
pub fn save(path: &Path, preferences: &Preferences) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(preferences)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod test_prefs {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("nope.json"));
        assert_eq!(loaded, Preferences::default());
        assert_eq!(loaded.tuning, "standard");
        assert!(loaded.auto_detect);
    }

    #[test]
    fn corrupt_json_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{not json at all").unwrap();
        assert_eq!(load(&path), Preferences::default());
    }

    #[test]
    fn unknown_instrument_reverts_to_standard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            r#"{"tuning":"hurdyGurdy","auto_detect":false,"selected_note":{"label":"A4","frequency":440.0}}"#,
        )
        .unwrap();
        let loaded = load(&path);
        assert_eq!(loaded.tuning, "standard");
        assert!(loaded.selected_note.is_none());
        // The unrelated flag survives.
        assert!(!loaded.auto_detect);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"tuning":"ukulele"}"#).unwrap();
        let loaded = load(&path);
        assert_eq!(loaded.tuning, "ukulele");
        assert!(loaded.auto_detect);
        assert!(loaded.selected_note.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let preferences = Preferences {
            tuning: "violin".to_string(),
            auto_detect: false,
            selected_note: Some(Note::new("A4", 440.0)),
        };
        save(&path, &preferences).unwrap();
        assert_eq!(load(&path), preferences);
    }
}
