use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("preferences io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key → string storage scoped to the local user profile.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
}

/// Every persisted player preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKey {
    Volume,
    PreviousVolume,
    ShowChapterMarkers,
    CaptionsEnabled,
    CaptionTrack,
}

impl PrefKey {
    pub const ALL: [PrefKey; 5] = [
        PrefKey::Volume,
        PrefKey::PreviousVolume,
        PrefKey::ShowChapterMarkers,
        PrefKey::CaptionsEnabled,
        PrefKey::CaptionTrack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrefKey::Volume => "player.volume",
            PrefKey::PreviousVolume => "player.previous_volume",
            PrefKey::ShowChapterMarkers => "player.show_chapter_markers",
            PrefKey::CaptionsEnabled => "player.captions_enabled",
            PrefKey::CaptionTrack => "player.caption_track",
        }
    }
}

pub const DEFAULT_VOLUME: f64 = 1.0;

/// Typed accessors over an injected [`PreferenceStore`].
///
/// Reads fall back to defaults when a key is absent or unparsable. Writes go
/// straight through to the store; a failed write is logged and the in-memory
/// player state stays authoritative for the session.
pub struct Preferences<S: PreferenceStore> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn volume(&self) -> f64 {
        self.read_f64(PrefKey::Volume)
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_VOLUME)
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.write(PrefKey::Volume, &volume.to_string());
    }

    pub fn previous_volume(&self) -> f64 {
        self.read_f64(PrefKey::PreviousVolume)
            .filter(|v| *v > 0.0)
            .map(|v| v.min(1.0))
            .unwrap_or(DEFAULT_VOLUME)
    }

    pub fn set_previous_volume(&mut self, volume: f64) {
        self.write(PrefKey::PreviousVolume, &volume.to_string());
    }

    pub fn show_chapter_markers(&self) -> bool {
        self.read_bool(PrefKey::ShowChapterMarkers).unwrap_or(true)
    }

    pub fn set_show_chapter_markers(&mut self, show: bool) {
        self.write(PrefKey::ShowChapterMarkers, bool_str(show));
    }

    pub fn captions_enabled(&self) -> bool {
        self.read_bool(PrefKey::CaptionsEnabled).unwrap_or(false)
    }

    pub fn set_captions_enabled(&mut self, enabled: bool) {
        self.write(PrefKey::CaptionsEnabled, bool_str(enabled));
    }

    pub fn caption_track(&self) -> Option<String> {
        self.store
            .get(PrefKey::CaptionTrack.as_str())
            .filter(|label| !label.is_empty())
    }

    pub fn set_caption_track(&mut self, label: &str) {
        self.write(PrefKey::CaptionTrack, label);
    }

    fn read_f64(&self, key: PrefKey) -> Option<f64> {
        self.store
            .get(key.as_str())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    fn read_bool(&self, key: PrefKey) -> Option<bool> {
        match self.store.get(key.as_str())?.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    fn write(&mut self, key: PrefKey, value: &str) {
        if let Err(e) = self.store.set(key.as_str(), value) {
            log::warn!("Failed to persist {}: {e}", key.as_str());
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// In-process store; used by tests and as a fallback when no config dir exists.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Flat JSON object on disk, rewritten synchronously on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// `<config_dir>/marquee/preferences.json`, or None if the platform has no config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marquee").join("preferences.json"))
    }

    /// Open the store at `path`. A missing or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt preferences at {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PrefsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Store selected at startup: on disk when possible, in memory otherwise.
pub enum AnyStore {
    File(JsonFileStore),
    Memory(MemoryStore),
}

impl AnyStore {
    pub fn open_default() -> Self {
        match JsonFileStore::default_path() {
            Some(path) => AnyStore::File(JsonFileStore::open(path)),
            None => {
                log::warn!("No config directory; preferences will not persist");
                AnyStore::Memory(MemoryStore::new())
            }
        }
    }
}

impl PreferenceStore for AnyStore {
    fn get(&self, key: &str) -> Option<String> {
        match self {
            AnyStore::File(s) => s.get(key),
            AnyStore::Memory(s) => s.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        match self {
            AnyStore::File(s) => s.set(key, value),
            AnyStore::Memory(s) => s.set(key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let prefs = Preferences::new(MemoryStore::new());
        assert!((prefs.volume() - 1.0).abs() < 1e-9);
        assert!((prefs.previous_volume() - 1.0).abs() < 1e-9);
        assert!(prefs.show_chapter_markers());
        assert!(!prefs.captions_enabled());
        assert!(prefs.caption_track().is_none());
    }

    #[test]
    fn typed_roundtrip() {
        let mut prefs = Preferences::new(MemoryStore::new());
        prefs.set_volume(0.35);
        prefs.set_previous_volume(0.7);
        prefs.set_show_chapter_markers(false);
        prefs.set_captions_enabled(true);
        prefs.set_caption_track("English");
        assert!((prefs.volume() - 0.35).abs() < 1e-9);
        assert!((prefs.previous_volume() - 0.7).abs() < 1e-9);
        assert!(!prefs.show_chapter_markers());
        assert!(prefs.captions_enabled());
        assert_eq!(prefs.caption_track().as_deref(), Some("English"));
    }

    #[test]
    fn garbage_values_fall_back() {
        let mut store = MemoryStore::new();
        store.set(PrefKey::Volume.as_str(), "loud").unwrap();
        store.set(PrefKey::CaptionsEnabled.as_str(), "yes").unwrap();
        store.set(PrefKey::PreviousVolume.as_str(), "0").unwrap();
        let prefs = Preferences::new(store);
        assert!((prefs.volume() - 1.0).abs() < 1e-9);
        assert!(!prefs.captions_enabled());
        assert!((prefs.previous_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_volume_is_clamped() {
        let mut store = MemoryStore::new();
        store.set(PrefKey::Volume.as_str(), "3.5").unwrap();
        let prefs = Preferences::new(store);
        assert!((prefs.volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn keys_are_distinct() {
        let mut names: Vec<&str> = PrefKey::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), PrefKey::ALL.len());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");
        {
            let mut prefs = Preferences::new(JsonFileStore::open(&path));
            prefs.set_caption_track("English");
            prefs.set_captions_enabled(true);
        }
        let prefs = Preferences::new(JsonFileStore::open(&path));
        assert_eq!(prefs.caption_track().as_deref(), Some("English"));
        assert!(prefs.captions_enabled());
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::open(&path);
        assert!(store.get(PrefKey::Volume.as_str()).is_none());
    }
}
