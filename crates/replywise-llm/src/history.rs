//! Bounded request history.
//!
//! Both stores keep at most [`HISTORY_CAPACITY`] entries and evict the
//! oldest first. Entries are never modified after they are appended.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use replywise_types::HistoryEntry;
use replywise_types::history::HISTORY_CAPACITY;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LlmError, Result};

/// Append-only, bounded log of [`HistoryEntry`] values.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry, evicting the oldest if the store is full.
    async fn append(&self, entry: HistoryEntry) -> Result<()>;

    /// Every retained entry, oldest first.
    async fn entries(&self) -> Result<Vec<HistoryEntry>>;
}

fn push_bounded(log: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, capacity: usize) {
    log.push_back(entry);
    while log.len() > capacity {
        log.pop_front();
    }
}

// ── In-memory ────────────────────────────────────────────────────────────

/// History kept only for the life of the process.
#[derive(Debug)]
pub struct MemoryHistory {
    capacity: usize,
    log: Mutex<VecDeque<HistoryEntry>>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            log: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        push_bounded(&mut *self.log.lock().await, entry, self.capacity);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.log.lock().await.iter().cloned().collect())
    }
}

// ── JSON file ────────────────────────────────────────────────────────────

/// History persisted as a JSON array, rewritten on every append.
///
/// A missing file reads as empty. A corrupt file is logged and replaced on
/// the next append.
#[derive(Debug)]
pub struct JsonFileHistory {
    path: PathBuf,
    capacity: usize,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: HISTORY_CAPACITY,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<VecDeque<HistoryEntry>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VecDeque::new()),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        match serde_json::from_slice::<VecDeque<HistoryEntry>>(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history file unreadable, starting fresh");
                Ok(VecDeque::new())
            }
        }
    }
}

fn io_error(path: &Path, e: std::io::Error) -> LlmError {
    LlmError::Unknown(format!("history file {}: {e}", path.display()))
}

#[async_trait]
impl HistoryStore for JsonFileHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut log = self.load().await?;
        push_bounded(&mut log, entry, self.capacity);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        let json = serde_json::to_vec_pretty(&log)
            .map_err(|e| LlmError::Unknown(format!("history serialization: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        debug!(path = %self.path.display(), entries = log.len(), "history appended");
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into())
    }
}
