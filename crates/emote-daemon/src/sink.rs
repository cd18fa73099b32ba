use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use emote_core::storage::write_atomically;
use emote_core::{RecentReplacement, Result};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub const RECENT_LIMIT: usize = 8;

/// Told about every completed expansion. Called on the tap thread.
pub trait ReplacementSink {
    fn notify(&self, trigger: &str, replacement: &str);
}

/// Forwards expansions to a channel so the tap thread never waits on I/O.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<RecentReplacement>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<RecentReplacement>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReplacementSink for ChannelSink {
    fn notify(&self, trigger: &str, replacement: &str) {
        let entry = RecentReplacement::new(trigger.to_string(), replacement.to_string());
        if self.tx.send(entry).is_err() {
            debug!("recent list consumer is gone");
        }
    }
}

/// Newest-first list of recent expansions, mirrored to disk.
#[derive(Debug)]
pub struct RecentLog {
    path: PathBuf,
    entries: VecDeque<RecentReplacement>,
}

impl RecentLog {
    /// Start from whatever is already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_recent(&path)
            .unwrap_or_default()
            .into_iter()
            .take(RECENT_LIMIT)
            .collect();
        Self { path, entries }
    }

    pub fn entries(&self) -> impl Iterator<Item = &RecentReplacement> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: RecentReplacement) -> Result<()> {
        self.entries.push_front(entry);
        self.entries.truncate(RECENT_LIMIT);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let entries: Vec<_> = self.entries.iter().collect();
        let mut serialized = serde_json::to_string_pretty(&entries)?;
        serialized.push('\n');
        write_atomically(&self.path, serialized.as_bytes())
    }

    /// Drain the channel until every sender is dropped.
    pub async fn run(mut self, mut rx: UnboundedReceiver<RecentReplacement>) {
        while let Some(entry) = rx.recv().await {
            if let Err(e) = self.push(entry) {
                warn!(path = %self.path.display(), error = %e, "failed to save recent replacements");
            }
        }
    }
}

/// Read the persisted recent list; a missing file is an empty list.
pub fn load_recent(path: &Path) -> Result<Vec<RecentReplacement>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keeps_newest_first_and_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recent.json");
        let mut log = RecentLog::open(&path);

        for i in 0..(RECENT_LIMIT + 3) {
            log.push(RecentReplacement::new(format!("t{}", i), "x".into()))
                .unwrap();
        }

        let triggers: Vec<_> = log.entries().map(|e| e.trigger.clone()).collect();
        assert_eq!(triggers.len(), RECENT_LIMIT);
        assert_eq!(triggers[0], format!("t{}", RECENT_LIMIT + 2));

        let on_disk = load_recent(&path).unwrap();
        assert_eq!(on_disk.len(), RECENT_LIMIT);
        assert_eq!(on_disk[0].trigger, triggers[0]);
    }

    #[test]
    fn reopening_picks_up_saved_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recent.json");
        RecentLog::open(&path)
            .push(RecentReplacement::new("shipit".into(), "🚢".into()))
            .unwrap();

        let reopened = RecentLog::open(&path);
        assert_eq!(reopened.entries().count(), 1);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_recent(&dir.path().join("recent.json")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn channel_sink_feeds_the_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recent.json");
        let (sink, rx) = ChannelSink::new();

        sink.notify("shipit", "🚢");
        sink.notify("wave", "👋");
        drop(sink);

        RecentLog::open(&path).run(rx).await;

        let saved = load_recent(&path).unwrap();
        assert_eq!(saved[0].trigger, "wave");
        assert_eq!(saved[1].trigger, "shipit");
    }
}
