use std::collections::VecDeque;

use crate::aliases::{is_allowed_alias_char, AliasTable, ALIAS_DELIMITER};
use crate::matcher::best_match;
use crate::models::MatchResult;

pub const DEFAULT_BUFFER_CAPACITY: usize = 220;

/// What happened to the buffer after feeding it one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharOutcome {
    /// An alias character was appended.
    Appended,
    /// A colon was appended; a match should be attempted.
    DelimiterAppended,
    /// Whitespace or an unexpected character reset the buffer.
    Cleared,
}

/// Rolling window of recently typed characters.
///
/// Oldest characters are dropped first, so the match-relevant tail is always
/// kept.
#[derive(Debug, Clone)]
pub struct TypedBuffer {
    chars: VecDeque<char>,
    capacity: usize,
}

impl TypedBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chars: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Feed one typed character.
    pub fn on_character(&mut self, c: char) -> CharOutcome {
        if c == ALIAS_DELIMITER {
            self.push(c);
            return CharOutcome::DelimiterAppended;
        }

        if is_allowed_alias_char(c) {
            self.push(c);
            return CharOutcome::Appended;
        }

        // Whitespace and every other character end any trigger in progress.
        self.clear();
        CharOutcome::Cleared
    }

    /// Mirror the user's backspace.
    pub fn on_backspace(&mut self) {
        self.chars.pop_back();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
    }

    /// Run the matcher over the current contents.
    pub fn attempt_match(&self, table: &AliasTable, max_trigger_length: usize) -> Option<MatchResult> {
        if self.chars.back() != Some(&ALIAS_DELIMITER) {
            return None;
        }
        best_match(&self.contents(), table, max_trigger_length)
    }

    pub fn contents(&self) -> String {
        self.chars.iter().collect()
    }

    fn push(&mut self, c: char) {
        self.chars.push_back(c);
        while self.chars.len() > self.capacity {
            self.chars.pop_front();
        }
    }
}

impl Default for TypedBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
