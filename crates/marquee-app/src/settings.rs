use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::Session;

/// Where and as whom to connect. Flags given on the command line are merged
/// in and saved back, so later launches only need the item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub version: u32,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server_url: None,
            access_token: None,
            user_id: None,
        }
    }
}

impl SettingsConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marquee").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt settings {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    log::warn!("Failed to save settings {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Failed to serialize settings: {e}"),
        }
    }

    /// Overlay non-empty values; returns true when anything changed.
    pub fn merge(
        &mut self,
        server_url: Option<String>,
        access_token: Option<String>,
        user_id: Option<String>,
    ) -> bool {
        let before = self.clone();
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        if let Some(v) = keep(server_url) {
            self.server_url = Some(v);
        }
        if let Some(v) = keep(access_token) {
            self.access_token = Some(v);
        }
        if let Some(v) = keep(user_id) {
            self.user_id = Some(v);
        }
        *self != before
    }

    /// A complete session, or the name of the first missing field.
    pub fn session(&self) -> Result<Session, &'static str> {
        Ok(Session {
            server_url: self.server_url.clone().ok_or("server URL")?,
            access_token: self.access_token.clone().ok_or("access token")?,
            user_id: self.user_id.clone().ok_or("user id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = SettingsConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(s, SettingsConfig::default());
    }

    #[test]
    fn corrupt_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsConfig::load_from(&path), SettingsConfig::default());
    }

    #[test]
    fn save_then_load_in_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marquee").join("settings.json");
        let mut s = SettingsConfig::default();
        s.merge(Some("http://nas:8096".into()), Some("tok".into()), Some("u1".into()));
        s.save_to(&path);
        assert_eq!(SettingsConfig::load_from(&path), s);
    }

    #[test]
    fn merge_ignores_blank_flags() {
        let mut s = SettingsConfig {
            server_url: Some("http://a".into()),
            ..SettingsConfig::default()
        };
        assert!(!s.merge(Some("  ".into()), None, None));
        assert!(s.merge(None, Some("t".into()), None));
        assert_eq!(s.server_url.as_deref(), Some("http://a"));
        assert_eq!(s.access_token.as_deref(), Some("t"));
    }

    #[test]
    fn session_reports_first_missing_field() {
        let mut s = SettingsConfig::default();
        assert_eq!(s.session().unwrap_err(), "server URL");
        s.merge(Some("http://a".into()), Some("t".into()), None);
        assert_eq!(s.session().unwrap_err(), "user id");
        s.merge(None, None, Some("u".into()));
        assert_eq!(s.session().unwrap().user_id, "u");
    }
}
