use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::error::{EmoteError, Result};
use crate::matcher::DEFAULT_MAX_TRIGGER_LENGTH;
use crate::policy::{normalize_bundle_ids, ContextPolicy, FilterMode};
use crate::storage::write_atomically;

pub const MIN_BUFFER_CAPACITY: usize = 160;
pub const MAX_BUFFER_CAPACITY: usize = 512;
pub const DEFAULT_CLIPBOARD_RESTORE_DELAY_MS: u64 = 100;
pub const DEFAULT_INJECTION_GRACE_MS: u64 = 200;

/// How the replacement text is inserted after the trigger is erased.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsertionStrategy {
    /// Put the text on the clipboard, send the paste chord, restore later.
    #[default]
    Paste,
    /// Type the text as a synthetic Unicode keyboard event.
    Unicode,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub filter_mode: FilterMode,
    pub bundle_identifiers: Vec<String>,
    pub insertion: InsertionStrategy,
    /// Delay before the previous clipboard contents are put back. A target
    /// that takes longer than this to consume the paste receives the old
    /// contents instead.
    pub clipboard_restore_delay_ms: u64,
    /// How long after an injection incoming keystrokes are still treated as
    /// our own synthetic input.
    pub injection_grace_ms: u64,
    pub buffer_capacity: usize,
    pub max_trigger_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter_mode: FilterMode::Off,
            bundle_identifiers: Vec::new(),
            insertion: InsertionStrategy::Paste,
            clipboard_restore_delay_ms: DEFAULT_CLIPBOARD_RESTORE_DELAY_MS,
            injection_grace_ms: DEFAULT_INJECTION_GRACE_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_trigger_length: DEFAULT_MAX_TRIGGER_LENGTH,
        }
    }
}

impl Settings {
    /// Clamp tunables into range and normalize the identifier list.
    pub fn normalized(mut self) -> Self {
        self.bundle_identifiers = normalize_bundle_ids(&self.bundle_identifiers);
        self.buffer_capacity = self
            .buffer_capacity
            .clamp(MIN_BUFFER_CAPACITY, MAX_BUFFER_CAPACITY);
        if self.max_trigger_length == 0 {
            self.max_trigger_length = DEFAULT_MAX_TRIGGER_LENGTH;
        }
        self
    }

    pub fn policy(&self) -> ContextPolicy {
        ContextPolicy::new(self.filter_mode, &self.bundle_identifiers)
    }

    pub fn clipboard_restore_delay(&self) -> Duration {
        Duration::from_millis(self.clipboard_restore_delay_ms)
    }

    pub fn injection_grace(&self) -> Duration {
        Duration::from_millis(self.injection_grace_ms)
    }
}

/// Load settings; a missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_json::from_str(&content).map_err(|e| {
        EmoteError::InvalidConfig(format!("{}: {}", path.display(), e))
    })?;
    Ok(settings.normalized())
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let mut serialized = serde_json::to_string_pretty(&settings.clone().normalized())?;
    serialized.push('\n');
    write_atomically(path, serialized.as_bytes())
}
