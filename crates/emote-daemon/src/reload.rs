use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use emote_core::storage::JsonAliasStore;
use emote_core::{load_settings, Settings};
use tracing::{info, warn};

use crate::monitor::MonitorTables;

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Load settings for the daemon: a malformed file falls back to defaults.
pub fn load_settings_or_default(path: &Path) -> Settings {
    match load_settings(path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "using default settings");
            Settings::default()
        }
    }
}

/// Watches the alias and settings files and swaps fresh snapshots into the
/// monitor's tables when either changes.
pub struct ConfigWatcher {
    store: JsonAliasStore,
    settings_path: PathBuf,
    tables: MonitorTables,
    aliases_modified: Option<SystemTime>,
    settings_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(store: JsonAliasStore, settings_path: impl Into<PathBuf>, tables: MonitorTables) -> Self {
        let settings_path = settings_path.into();
        Self {
            aliases_modified: modified(store.custom_path()),
            settings_modified: modified(&settings_path),
            store,
            settings_path,
            tables,
        }
    }

    /// Check both files once. Returns whether anything was reloaded.
    pub fn poll(&mut self) -> bool {
        let mut reloaded = false;

        let aliases_modified = modified(self.store.custom_path());
        if aliases_modified != self.aliases_modified {
            self.aliases_modified = aliases_modified;
            let table = self.store.load_table();
            info!(aliases = table.len(), "alias table reloaded");
            self.tables.aliases.replace(table);
            reloaded = true;
        }

        let settings_modified = modified(&self.settings_path);
        if settings_modified != self.settings_modified {
            self.settings_modified = settings_modified;
            let settings = load_settings_or_default(&self.settings_path);
            info!(filter = %settings.filter_mode, insertion = ?settings.insertion, "settings reloaded");
            self.tables.policy.replace(settings.policy());
            self.tables.settings.replace(settings);
            reloaded = true;
        }

        reloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emote_core::{AliasTable, FilterMode};
    use std::time::Duration;
    use tempfile::tempdir;

    fn bump_mtime(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(5))
            .unwrap();
    }

    #[test]
    fn unchanged_files_are_not_reloaded() {
        let dir = tempdir().unwrap();
        let store = JsonAliasStore::new(dir.path().join("custom_aliases.json"));
        store.ensure_custom_file().unwrap();
        let tables = MonitorTables::new(AliasTable::default(), Settings::default());

        let mut watcher = ConfigWatcher::new(store, dir.path().join("settings.json"), tables);
        assert!(!watcher.poll());
    }

    #[test]
    fn edited_aliases_are_swapped_in() {
        let dir = tempdir().unwrap();
        let store = JsonAliasStore::new(dir.path().join("custom_aliases.json"));
        store.ensure_custom_file().unwrap();
        let tables = MonitorTables::new(store.load_table(), Settings::default());
        let mut watcher = ConfigWatcher::new(store.clone(), dir.path().join("settings.json"), tables.clone());

        fs::write(store.custom_path(), r#"{ "lgtm": "👍" }"#).unwrap();
        bump_mtime(store.custom_path());

        assert!(watcher.poll());
        assert_eq!(tables.aliases.load().get("lgtm"), Some("👍"));
    }

    #[test]
    fn new_settings_file_updates_policy() {
        let dir = tempdir().unwrap();
        let store = JsonAliasStore::new(dir.path().join("custom_aliases.json"));
        store.ensure_custom_file().unwrap();
        let settings_path = dir.path().join("settings.json");
        let tables = MonitorTables::new(AliasTable::default(), Settings::default());
        let mut watcher = ConfigWatcher::new(store, &settings_path, tables.clone());

        fs::write(
            &settings_path,
            r#"{ "filter_mode": "allow", "bundle_identifiers": ["com.example.a"] }"#,
        )
        .unwrap();

        assert!(watcher.poll());
        assert_eq!(tables.settings.load().filter_mode, FilterMode::Allow);
        assert!(tables.policy.load().should_process(Some("com.example.a"), false));
        assert!(!tables.policy.load().should_process(Some("com.example.b"), false));
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(load_settings_or_default(&path), Settings::default());
    }
}
