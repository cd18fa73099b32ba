use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::aliases::{is_valid_alias, normalize_aliases, AliasMap, AliasTable};
use crate::config::get_custom_aliases_path;
use crate::error::{EmoteError, Result};
use crate::models::AliasEntry;

/// Read-only defaults compiled into the binary.
const BUNDLED_ALIASES: &str = include_str!("../data/bundled_aliases.json");

/// Written the first time the custom alias file is needed.
const CUSTOM_TEMPLATE: [(&str, &str); 3] = [
    ("partyparrot", "🦜"),
    ("shipit", "🚢"),
    ("shruggie", "¯\\_(ツ)_/¯"),
];

/// Where aliases come from and go to.
pub trait AliasSource {
    /// Bundled defaults merged with user overrides. Never fails: unreadable
    /// sources contribute nothing.
    fn load(&self) -> AliasMap;

    /// Replace the user overrides.
    fn save(&self, aliases: &AliasMap) -> Result<()>;
}

/// Bundled JSON defaults plus a user-editable JSON file.
#[derive(Debug, Clone)]
pub struct JsonAliasStore {
    custom_path: PathBuf,
}

impl JsonAliasStore {
    pub fn new(custom_path: impl Into<PathBuf>) -> Self {
        Self {
            custom_path: custom_path.into(),
        }
    }

    /// Store backed by `~/.emote/custom_aliases.json`.
    pub fn from_config_dir() -> Self {
        Self::new(get_custom_aliases_path())
    }

    pub fn custom_path(&self) -> &Path {
        &self.custom_path
    }

    /// Create the custom file from the template if it does not exist yet.
    pub fn ensure_custom_file(&self) -> Result<&Path> {
        if !self.custom_path.exists() {
            let template = normalize_aliases(CUSTOM_TEMPLATE);
            write_alias_file(&self.custom_path, &template)?;
        }
        Ok(&self.custom_path)
    }

    /// User overrides only, normalized.
    pub fn load_custom(&self) -> Result<AliasMap> {
        self.ensure_custom_file()?;
        read_alias_file(&self.custom_path)
    }

    /// The merged table ready for matching.
    pub fn load_table(&self) -> AliasTable {
        AliasTable::merged(bundled_aliases(), self.load_custom_or_empty())
    }

    fn load_custom_or_empty(&self) -> AliasMap {
        match self.load_custom() {
            Ok(aliases) => aliases,
            Err(e) => {
                warn!(path = %self.custom_path.display(), error = %e, "ignoring unreadable custom aliases");
                AliasMap::new()
            }
        }
    }
}

impl AliasSource for JsonAliasStore {
    fn load(&self) -> AliasMap {
        let mut merged = bundled_aliases();
        merged.extend(self.load_custom_or_empty());
        merged
    }

    fn save(&self, aliases: &AliasMap) -> Result<()> {
        write_alias_file(&self.custom_path, &normalize_aliases(aliases))
    }
}

/// The normalized bundled dictionary.
pub fn bundled_aliases() -> AliasMap {
    match serde_json::from_str::<HashMap<String, String>>(BUNDLED_ALIASES) {
        Ok(raw) => normalize_aliases(raw),
        Err(e) => {
            warn!(error = %e, "bundled alias dictionary is malformed");
            AliasMap::new()
        }
    }
}

/// Read and normalize a `{ "trigger": "replacement" }` JSON file.
pub fn read_alias_file(path: &Path) -> Result<AliasMap> {
    let content = fs::read_to_string(path)?;

    if content.trim().is_empty() {
        return Ok(AliasMap::new());
    }

    let raw: HashMap<String, String> = serde_json::from_str(&content)?;
    Ok(normalize_aliases(raw))
}

/// Write aliases as pretty, key-sorted JSON with a trailing newline.
pub fn write_alias_file(path: &Path, aliases: &AliasMap) -> Result<()> {
    let mut serialized = serde_json::to_string_pretty(aliases)?;
    serialized.push('\n');
    write_atomically(path, serialized.as_bytes())
}

/// Write through a temporary file in the same directory, then rename.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut file = NamedTempFile::new_in(&dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| EmoteError::Io(e.error))?;
    Ok(())
}

/// Add or replace a user alias
pub fn add_alias(store: &JsonAliasStore, trigger: &str, replacement: &str) -> Result<AliasEntry> {
    let entry = AliasEntry::new(trigger, replacement).ok_or_else(|| {
        EmoteError::InvalidConfig(format!(
            "'{}' is not a valid alias (letters, digits, '+', '-', '_' and '::' only) or the replacement is empty",
            trigger
        ))
    })?;

    let mut aliases = store.load_custom()?;
    aliases.insert(entry.trigger.clone(), entry.replacement.clone());
    store.save(&aliases)?;
    Ok(entry)
}

/// Remove a user alias. Bundled aliases cannot be removed.
pub fn remove_alias(store: &JsonAliasStore, trigger: &str) -> Result<()> {
    let trigger = trigger.trim().to_lowercase();
    let mut aliases = store.load_custom()?;

    if aliases.remove(&trigger).is_none() {
        let hint = if is_valid_alias(&trigger) && bundled_aliases().contains_key(&trigger) {
            " (it is a bundled alias; override it with 'emote add' instead)"
        } else {
            ""
        };
        return Err(EmoteError::Other(format!(
            "Alias '{}' not found in custom aliases{}",
            trigger, hint
        )));
    }

    store.save(&aliases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> JsonAliasStore {
        JsonAliasStore::new(dir.join("custom_aliases.json"))
    }

    #[test]
    fn bundled_dictionary_parses() {
        let bundled = bundled_aliases();
        assert!(!bundled.is_empty());
        assert!(bundled.keys().all(|k| is_valid_alias(k)));
        assert!(bundled.contains_key("thumbsup"));
    }

    #[test]
    fn first_load_writes_the_template() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let custom = store.load_custom().unwrap();
        assert!(store.custom_path().exists());
        assert_eq!(custom.get("shipit").map(String::as_str), Some("🚢"));
    }

    #[test]
    fn custom_overrides_bundled() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.custom_path(), r#"{ " ThumbsUp ": " 👌 " }"#).unwrap();

        let merged = store.load();
        assert_eq!(merged.get("thumbsup").map(String::as_str), Some("👌"));
        assert_eq!(store.load_table().get("thumbsup"), Some("👌"));
    }

    #[test]
    fn malformed_custom_file_falls_back_to_bundled() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.custom_path(), "[1, 2, 3").unwrap();

        let merged = store.load();
        assert_eq!(merged, bundled_aliases());
    }

    #[test]
    fn save_normalizes_and_sorts() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut aliases = AliasMap::new();
        aliases.insert(" Zeta ".into(), "z".into());
        aliases.insert("alpha".into(), " a ".into());
        aliases.insert("empty".into(), "  ".into());
        store.save(&aliases).unwrap();

        let written = fs::read_to_string(store.custom_path()).unwrap();
        assert!(written.ends_with('\n'));
        assert!(written.find("alpha").unwrap() < written.find("zeta").unwrap());
        assert!(!written.contains("empty"));
    }

    #[test]
    fn add_and_remove_custom_alias() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let entry = add_alias(&store, "LGTM", "👍 looks good").unwrap();
        assert_eq!(entry.trigger, "lgtm");
        assert_eq!(store.load_table().get("lgtm"), Some("👍 looks good"));

        remove_alias(&store, "lgtm").unwrap();
        assert_eq!(store.load_table().get("lgtm"), None);
        assert!(remove_alias(&store, "lgtm").is_err());
    }

    #[test]
    fn add_rejects_invalid_trigger() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(
            add_alias(&store, "two words", "x"),
            Err(EmoteError::InvalidConfig(_))
        ));
    }
}
