use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::aliases::is_valid_alias;

/// A single trigger → replacement pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    pub trigger: String,
    pub replacement: String,
}

impl AliasEntry {
    /// Build a normalized entry, or `None` when the pair would be dropped by
    /// normalization (empty or invalid trigger, blank replacement).
    pub fn new(trigger: &str, replacement: &str) -> Option<Self> {
        let trigger = trigger.trim().to_lowercase();
        let replacement = replacement.trim();

        if replacement.is_empty() || !is_valid_alias(&trigger) {
            return None;
        }

        Some(Self {
            trigger,
            replacement: replacement.to_string(),
        })
    }
}

/// Outcome of a successful match attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub trigger: String,
    pub replacement: String,
}

impl MatchResult {
    pub fn new(trigger: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            replacement: replacement.into(),
        }
    }

    /// Number of characters to erase from the target application.
    ///
    /// The opening colon always reached the target. The closing colon only
    /// did when the tap could not swallow it.
    pub fn delete_count(&self, closing_colon_swallowed: bool) -> usize {
        let delimiters = if closing_colon_swallowed { 1 } else { 2 };
        self.trigger.chars().count() + delimiters
    }
}

/// A recently performed expansion, kept for `emote status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecentReplacement {
    pub trigger: String,
    pub replacement: String,
    pub timestamp: String,
}

impl RecentReplacement {
    pub fn new(trigger: String, replacement: String) -> Self {
        Self {
            trigger,
            replacement,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    pub fn formatted_time(&self) -> String {
        let entry_time = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|dt| dt.with_timezone(&Local))
            .unwrap_or_else(|_| Local::now());

        let duration = Local::now().signed_duration_since(entry_time);

        if duration.num_seconds() < 60 {
            format!("{}s ago", duration.num_seconds())
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            format!("{}d ago", duration.num_days())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_entry_normalizes_trigger_and_replacement() {
        let entry = AliasEntry::new("  ShipIt ", " 🚢\n").unwrap();
        assert_eq!(entry.trigger, "shipit");
        assert_eq!(entry.replacement, "🚢");
    }

    #[test]
    fn alias_entry_rejects_blank_or_invalid_input() {
        assert!(AliasEntry::new("", "x").is_none());
        assert!(AliasEntry::new("ok", "   ").is_none());
        assert!(AliasEntry::new("party parrot", "🦜").is_none());
        assert!(AliasEntry::new("foo:bar", "x").is_none());
    }

    #[test]
    fn delete_count_depends_on_swallowed_colon() {
        let result = MatchResult::new("shipit", "🚢");
        assert_eq!(result.delete_count(true), 7);
        assert_eq!(result.delete_count(false), 8);
    }

    #[test]
    fn recent_replacement_reports_seconds_for_fresh_entries() {
        let recent = RecentReplacement::new("tada".into(), "🎉".into());
        assert!(recent.formatted_time().ends_with("s ago"));
    }
}
