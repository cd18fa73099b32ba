//! Atomically swappable read snapshots.
//!
//! The alias table and the context policy are read on every keystroke and
//! replaced only when their files change. Readers take a cheap `Arc` to the
//! current value and keep using it for the whole match attempt, so a reload
//! never exposes a half-built table.

use std::sync::Arc;

use arc_swap::ArcSwap;

#[derive(Debug)]
pub struct Snapshot<T> {
    inner: ArcSwap<T>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// The current value. Later replacements do not affect the returned `Arc`.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn replace(&self, value: T) {
        self.inner.store(Arc::new(value));
    }
}

impl<T: Default> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::AliasTable;
    use std::thread;

    #[test]
    fn held_snapshot_survives_replacement() {
        let snapshot = Snapshot::new(AliasTable::from_pairs([("old", "1")]));
        let held = snapshot.load();

        snapshot.replace(AliasTable::from_pairs([("new", "2")]));

        assert_eq!(held.get("old"), Some("1"));
        assert_eq!(snapshot.load().get("new"), Some("2"));
        assert_eq!(snapshot.load().get("old"), None);
    }

    #[test]
    fn concurrent_readers_see_whole_tables() {
        let snapshot = Arc::new(Snapshot::new(AliasTable::from_pairs([("a", "1"), ("b", "1")])));

        let writer = {
            let snapshot = Arc::clone(&snapshot);
            thread::spawn(move || {
                for round in 0..200 {
                    let value = round.to_string();
                    snapshot.replace(AliasTable::from_pairs([("a", value.as_str()), ("b", value.as_str())]));
                }
            })
        };

        for _ in 0..2_000 {
            let table = snapshot.load();
            assert_eq!(table.get("a"), table.get("b"));
        }

        writer.join().unwrap();
    }
}
