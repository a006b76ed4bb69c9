//! Opaque key-value settings store (`settings.json`). See spec.md §1
//! ("Settings/credential storage — treated as an opaque key-value store")
//! and §6 (`clientId`, `projectDir`, `accessToken`).
//!
//! Generalises the teacher's typed `ConfigFile` in `config.rs` into a
//! bag of string values, since the engine only ever needs to look one
//! key up at a time and has no business knowing the UI-only keys
//! (`autostart`, window geometry, ...) the host shell also keeps here.

use std::collections::BTreeMap;
use std::path::PathBuf;

const SETTINGS_FILENAME: &str = "settings.json";

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(config_dir: PathBuf) -> Self {
        SettingsStore {
            path: config_dir.join(SETTINGS_FILENAME),
        }
    }

    fn load(&self) -> BTreeMap<String, String> {
        if !self.path.exists() {
            return BTreeMap::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    fn save(&self, map: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&self.path, serde_json::to_string_pretty(map).unwrap_or_default());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.load().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: String) {
        let mut map = self.load();
        map.insert(key.to_string(), value);
        self.save(&map);
    }

    pub fn remove(&self, key: &str) {
        let mut map = self.load();
        map.remove(key);
        self.save(&map);
    }

    pub fn project_dir(&self) -> Option<PathBuf> {
        self.get("projectDir").map(PathBuf::from)
    }

    pub fn set_project_dir(&self, dir: &std::path::Path) {
        self.set("projectDir", dir.to_string_lossy().to_string());
    }

    pub fn client_id(&self) -> Option<String> {
        self.get("clientId")
    }

    pub fn access_token(&self) -> Option<String> {
        self.get("accessToken")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_project_dir_is_none() {
        let dir = crate::fsops::temp_dir().unwrap();
        let store = SettingsStore::new(dir);
        assert!(store.project_dir().is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = crate::fsops::temp_dir().unwrap();
        let store = SettingsStore::new(dir);
        store.set("clientId", "abc-123".to_string());
        assert_eq!(store.client_id(), Some("abc-123".to_string()));
    }
}
