use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EmoteError;

/// How the bundle identifier list is applied.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Off,
    #[serde(alias = "allowlist")]
    Allow,
    #[serde(alias = "denylist")]
    Deny,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::Off => "off",
            FilterMode::Allow => "allow",
            FilterMode::Deny => "deny",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterMode {
    type Err = EmoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(FilterMode::Off),
            "allow" | "allowlist" => Ok(FilterMode::Allow),
            "deny" | "denylist" => Ok(FilterMode::Deny),
            other => Err(EmoteError::InvalidConfig(format!(
                "unknown filter mode '{}' (expected off, allow or deny)",
                other
            ))),
        }
    }
}

/// Decides whether keystrokes in the current context are examined at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPolicy {
    mode: FilterMode,
    bundle_identifiers: HashSet<String>,
}

impl ContextPolicy {
    pub fn new<I, S>(mode: FilterMode, bundle_identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            mode,
            bundle_identifiers: normalize_bundle_ids(bundle_identifiers)
                .into_iter()
                .collect(),
        }
    }

    /// Secure fields are never processed. Otherwise the filter mode decides;
    /// an unknown foreground application counts as "not listed".
    pub fn should_process(&self, foreground_app: Option<&str>, is_secure_field: bool) -> bool {
        if is_secure_field {
            return false;
        }

        let listed = foreground_app
            .map(|id| self.bundle_identifiers.contains(&id.trim().to_lowercase()))
            .unwrap_or(false);

        match self.mode {
            FilterMode::Off => true,
            FilterMode::Allow => listed,
            FilterMode::Deny => !listed,
        }
    }
}

/// Trim, lower-case, drop empties and de-duplicate, keeping first-seen order.
pub fn normalize_bundle_ids<I, S>(bundle_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();

    for value in bundle_ids {
        let trimmed = value.as_ref().trim().to_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            normalized.push(trimmed);
        }
    }

    normalized
}

/// Parse a comma- or newline-separated list of bundle identifiers.
pub fn parse_bundle_ids(text: &str) -> Vec<String> {
    normalize_bundle_ids(text.split(&[',', '\n'][..]))
}
