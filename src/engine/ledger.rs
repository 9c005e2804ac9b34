//! Backup Ledger
//!
//! Append-only store of description snapshots, one JSON object per line.
//! A snapshot must be durably on disk before the corresponding remote
//! update is attempted; if the write fails the mutation must not proceed.
//!
//! The file is human-inspectable and recoverable after a crash: loading
//! tolerates a trailing partial line from an interrupted append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One recorded prior state of a video's description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupEntry {
    pub video_id: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// The slice of the ledger the mutator depends on: durable snapshots and
/// latest-entry lookup. Letting callers substitute the store keeps the
/// fail-closed path (snapshot error blocks the remote write) testable.
pub trait SnapshotStore: Send + Sync {
    /// Record a snapshot durably; an `Err` must mean nothing usable was
    /// persisted.
    fn snapshot(&self, video_id: &str, title: &str, description: &str) -> Result<BackupEntry>;

    /// The most recent snapshot for a video, if any.
    fn latest(&self, video_id: &str) -> Option<BackupEntry>;
}

impl SnapshotStore for BackupLedger {
    fn snapshot(&self, video_id: &str, title: &str, description: &str) -> Result<BackupEntry> {
        BackupLedger::snapshot(self, video_id, title, description)
    }

    fn latest(&self, video_id: &str) -> Option<BackupEntry> {
        BackupLedger::latest(self, video_id)
    }
}

struct LedgerInner {
    writer: File,
    /// Per-video history, oldest first (append order)
    entries: HashMap<String, Vec<BackupEntry>>,
}

/// Durable backup store keyed by video id.
///
/// Appends are serialized through a single writer lock, so snapshots for
/// the same video id are strictly ordered.
pub struct BackupLedger {
    path: PathBuf,
    inner: Mutex<LedgerInner>,
}

impl BackupLedger {
    /// Open (or create) the ledger file and load its history
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create backup directory {parent:?}"))?;
        }

        let mut entries: HashMap<String, Vec<BackupEntry>> = HashMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read backup file {path:?}"))?;
            for (lineno, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<BackupEntry>(line) {
                    Ok(entry) => entries.entry(entry.video_id.clone()).or_default().push(entry),
                    Err(e) => {
                        // A torn final line from a crash mid-append is expected;
                        // anything else is still skipped but logged
                        tracing::warn!(line = lineno + 1, error = %e, "skipping unreadable backup line");
                    }
                }
            }
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open backup file {path:?}"))?;

        tracing::debug!(
            videos = entries.len(),
            path = %path.display(),
            "backup ledger loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LedgerInner { writer, entries }),
        })
    }

    /// Append a snapshot and sync it to disk before returning.
    ///
    /// Returns the recorded entry only after the bytes are durable.
    pub fn snapshot(&self, video_id: &str, title: &str, description: &str) -> Result<BackupEntry> {
        let entry = BackupEntry {
            video_id: video_id.to_string(),
            title: title.to_string(),
            timestamp: Utc::now(),
            description: description.to_string(),
        };

        let line = serde_json::to_string(&entry).context("Failed to serialize backup entry")?;

        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        writeln!(inner.writer, "{line}")
            .with_context(|| format!("Failed to append backup for video {video_id}"))?;
        inner
            .writer
            .sync_data()
            .with_context(|| format!("Failed to sync backup for video {video_id}"))?;

        inner
            .entries
            .entry(entry.video_id.clone())
            .or_default()
            .push(entry.clone());

        tracing::debug!(%video_id, "snapshot recorded");
        Ok(entry)
    }

    /// All snapshots for a video, newest first
    pub fn history(&self, video_id: &str) -> Vec<BackupEntry> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        let mut history = inner.entries.get(video_id).cloned().unwrap_or_default();
        history.reverse();
        history
    }

    /// The most recent snapshot for a video, if any
    pub fn latest(&self, video_id: &str) -> Option<BackupEntry> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner
            .entries
            .get(video_id)
            .and_then(|h| h.last())
            .cloned()
    }

    /// Ids of every video with at least one snapshot, sorted
    pub fn video_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        let mut ids: Vec<String> = inner.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove every snapshot for a video. Rewrites the file to a sibling
    /// temp path and swaps it in, so a crash leaves either the old or the
    /// new file intact. Returns the number of entries removed.
    pub fn prune(&self, video_id: &str) -> Result<usize> {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");

        let Some(removed) = inner.entries.remove(video_id) else {
            return Ok(0);
        };

        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)
                .with_context(|| format!("Failed to create temp file {tmp_path:?}"))?;
            let mut all: Vec<&BackupEntry> = inner.entries.values().flatten().collect();
            all.sort_by_key(|e| e.timestamp);
            for entry in all {
                let line =
                    serde_json::to_string(entry).context("Failed to serialize backup entry")?;
                writeln!(tmp, "{line}")?;
            }
            tmp.sync_data()?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace backup file {:?}", self.path))?;

        inner.writer = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to reopen backup file {:?}", self.path))?;

        tracing::info!(%video_id, entries = removed.len(), "backups pruned");
        Ok(removed.len())
    }

    /// Total number of recorded snapshots
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        inner.entries.values().map(|h| h.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_ledger() -> (TempDir, BackupLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = BackupLedger::open(&dir.path().join("backups.jsonl")).unwrap();
        (dir, ledger)
    }

    #[test]
    fn snapshot_then_history_newest_first() {
        let (_dir, ledger) = temp_ledger();

        ledger.snapshot("v1", "Video 1", "first").unwrap();
        ledger.snapshot("v1", "Video 1", "second").unwrap();
        ledger.snapshot("v2", "Video 2", "other").unwrap();

        let history = ledger.history("v1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].description, "second");
        assert_eq!(history[1].description, "first");
        assert_eq!(ledger.latest("v1").unwrap().description, "second");
    }

    #[test]
    fn n_mutations_leave_n_plus_one_states() {
        let (_dir, ledger) = temp_ledger();

        // Original state plus one snapshot per applied mutation
        let states = ["original", "after-1", "after-2"];
        for state in states {
            ledger.snapshot("v1", "Video 1", state).unwrap();
        }

        assert_eq!(ledger.history("v1").len(), states.len());
        // Restore returns the description immediately before the last mutation
        assert_eq!(ledger.latest("v1").unwrap().description, "after-2");
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backups.jsonl");

        {
            let ledger = BackupLedger::open(&path).unwrap();
            ledger.snapshot("v1", "Video 1", "persisted").unwrap();
        }

        let reopened = BackupLedger::open(&path).unwrap();
        assert_eq!(reopened.latest("v1").unwrap().description, "persisted");
    }

    #[test]
    fn tolerates_torn_trailing_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backups.jsonl");

        {
            let ledger = BackupLedger::open(&path).unwrap();
            ledger.snapshot("v1", "Video 1", "good").unwrap();
        }

        // Simulate a crash mid-append
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            write!(f, "{{\"video_id\":\"v2\",\"ti").unwrap();
        }

        let reopened = BackupLedger::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.latest("v1").unwrap().description, "good");
        assert!(reopened.latest("v2").is_none());
    }

    #[test]
    fn prune_removes_only_target_video() {
        let (_dir, ledger) = temp_ledger();

        ledger.snapshot("v1", "Video 1", "a").unwrap();
        ledger.snapshot("v1", "Video 1", "b").unwrap();
        ledger.snapshot("v2", "Video 2", "c").unwrap();

        assert_eq!(ledger.prune("v1").unwrap(), 2);
        assert!(ledger.history("v1").is_empty());
        assert_eq!(ledger.latest("v2").unwrap().description, "c");

        // Still appendable after the rewrite
        ledger.snapshot("v3", "Video 3", "d").unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn prune_unknown_id_is_a_noop() {
        let (_dir, ledger) = temp_ledger();
        ledger.snapshot("v1", "Video 1", "a").unwrap();
        assert_eq!(ledger.prune("missing").unwrap(), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn lines_are_human_inspectable_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backups.jsonl");
        let ledger = BackupLedger::open(&path).unwrap();
        ledger.snapshot("v1", "Video 1", "text").unwrap();
        drop(ledger);

        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["video_id"], "v1");
        assert_eq!(parsed["description"], "text");
        assert!(parsed["timestamp"].as_str().unwrap().contains('T'));
    }
}
