//! FeedLog for disk serialization of what happened to a simulated feed.

use std::path::Path;

use feedmark_common::FeedVariant;
use serde::{Deserialize, Serialize};

/// Everything done to a `SimulatedFeed`, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedLog {
    pub entries: Vec<LogEntry>,
}

/// A single logged interaction. `at_ms` is time since the feed was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    ScrollTo { at_ms: u64, y: f64, smooth: bool },
    ScrollBy { at_ms: u64, dy: f64 },
    FetchStarted { at_ms: u64, loaded: usize },
    FetchCompleted { at_ms: u64, added: usize, loaded: usize },
    Prepended { at_ms: u64, count: usize },
    Removed { at_ms: u64, id: String, copies: usize },
    Inserted { at_ms: u64, id: String, index: usize },
    VariantSelected { at_ms: u64, variant: FeedVariant },
}

impl FeedLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn scroll_calls(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::ScrollTo { .. } | LogEntry::ScrollBy { .. }))
    }

    pub fn fetches(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::FetchCompleted { .. }))
            .count()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let log: Self = serde_json::from_str(&json)?;
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_preserve_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/feed.json");
        let mut log = FeedLog::new();
        log.push(LogEntry::ScrollBy { at_ms: 800, dy: 960.0 });
        log.push(LogEntry::VariantSelected {
            at_ms: 900,
            variant: FeedVariant::Following,
        });

        log.save(&path).unwrap();
        let loaded = FeedLog::load(&path).unwrap();

        assert_eq!(loaded.entries, log.entries);
        assert_eq!(loaded.scroll_calls().count(), 1);
    }

    #[test]
    fn entries_are_tagged_by_type() {
        let json = serde_json::to_value(LogEntry::ScrollTo {
            at_ms: 0,
            y: 10.0,
            smooth: true,
        })
        .unwrap();
        assert_eq!(json["type"], "scroll_to");
    }
}
