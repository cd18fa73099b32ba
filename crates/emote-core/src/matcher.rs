use crate::aliases::{is_valid_alias, AliasTable, ALIAS_DELIMITER};
use crate::models::MatchResult;

pub const DEFAULT_MAX_TRIGGER_LENGTH: usize = 80;

/// Find the longest trigger that the typed buffer closes.
///
/// The buffer must end with the closing colon. Every earlier colon is tried as
/// the opening delimiter; the text between it and the closing colon is the
/// candidate. Longer candidates beat shorter ones so `:wave::skin-tone-2:`
/// wins over `wave`. Ties go to the first one found.
///
/// The monitor calls this at every colon, so while typing a compound trigger
/// fires on its prefix first when the prefix is itself a trigger.
pub fn best_match(buffer: &str, table: &AliasTable, max_trigger_length: usize) -> Option<MatchResult> {
    let body = buffer.strip_suffix(ALIAS_DELIMITER)?;

    let mut best: Option<(String, &str)> = None;
    let mut best_len = 0;

    for (index, c) in body.char_indices() {
        if c != ALIAS_DELIMITER {
            continue;
        }

        let candidate = body[index + c.len_utf8()..].to_lowercase();
        let length = candidate.chars().count();

        if length == 0 || length > max_trigger_length {
            continue;
        }
        if !is_valid_alias(&candidate) {
            continue;
        }
        let Some(replacement) = table.get(&candidate) else {
            continue;
        };

        if best.is_none() || length > best_len {
            best_len = length;
            best = Some((candidate, replacement));
        }
    }

    best.map(|(trigger, replacement)| MatchResult::new(trigger, replacement))
}
