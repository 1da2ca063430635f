//! Snapshot Store
//!
//! Timestamped JSON snapshots under one data directory, one sub-directory per
//! data kind. Writes are plain `fs::write` (not transactional); the one file
//! that is read back, the active block list, tolerates malformed content.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::Result;

/// Sub-directory / file prefix per data kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Alerts,
    Threats,
    /// Live snapshot, written on each publish
    Monitoring,
    /// Full window, counters and source table
    History,
}

impl SnapshotKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            SnapshotKind::Alerts => "alerts",
            SnapshotKind::Threats => "threats",
            SnapshotKind::Monitoring | SnapshotKind::History => "monitoring",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            SnapshotKind::History => "history",
            other => other.dir_name(),
        }
    }

    fn pretty(&self) -> bool {
        !matches!(self, SnapshotKind::Monitoring | SnapshotKind::History)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a kind, created on demand
    pub fn dir(&self, kind: SnapshotKind) -> Result<PathBuf> {
        let dir = self.root.join(kind.dir_name());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.json`
    pub fn write_snapshot<T: Serialize + ?Sized>(
        &self,
        kind: SnapshotKind,
        value: &T,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let filename = format!("{}_{}.json", kind.file_prefix(), at.format("%Y%m%d_%H%M%S"));
        let path = self.dir(kind)?.join(filename);

        let json = if kind.pretty() {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(&path, json)?;

        log::info!("Saved {} snapshot to {:?}", kind.file_prefix(), path);
        Ok(path)
    }

    /// All snapshot files of a kind, oldest first (names sort by timestamp)
    pub fn list_snapshots(&self, kind: SnapshotKind) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(kind.dir_name());
        let mut files = Vec::new();

        if dir.is_dir() {
            let prefix = format!("{}_", kind.file_prefix());
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let matches = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with(&prefix) && n.ends_with(".json"));
                if matches {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Path of a fixed-name document (e.g. the active block list)
    pub fn document_path(&self, kind: SnapshotKind, name: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(name)
    }

    /// Read a JSON list; missing, unreadable or malformed files yield an empty list
    pub fn read_list_or_empty<T: DeserializeOwned>(&self, path: &Path) -> Vec<T> {
        if !path.exists() {
            return Vec::new();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Vec<T>>(&content) {
                Ok(list) => list,
                Err(e) => {
                    log::warn!("Malformed list in {:?}, treating as empty: {}", path, e);
                    Vec::new()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {:?}, treating as empty: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Overwrite a JSON list document
    pub fn write_list<T: Serialize>(&self, path: &Path, list: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(list)?;
        fs::write(path, json)?;
        Ok(())
    }
}
