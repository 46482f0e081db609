//! Append-only JSONL session log.
//!
//! Grounded on `original_source/src/vibecore/session/jsonl_session.py`'s
//! `JSONLSession`: four operations (`get_items`, `add_items`, `pop_item`,
//! `clear_session`), append-with-flush for writes, read-all-skip-invalid
//! for reads, and an atomic write-to-temp-then-rename for pop.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use super::lock;
use super::path_utils::{self, PathError};
use crate::types::Item;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidSessionId(#[from] PathError),
    #[error("timed out acquiring session lock after {0:?}")]
    LockTimeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(session_id: &str, project_path: &std::path::Path, base_dir: &std::path::Path) -> Result<Self, SessionError> {
        let path = path_utils::session_file_path(session_id, project_path, base_dir)?;
        Ok(Self { path })
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub async fn get_items(&self, limit: Option<usize>) -> Result<Vec<Item>, SessionError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let _guard = timed_lock(&self.path, false).await?;

        let text = std::fs::read_to_string(&self.path)?;
        let items = parse_lines(&text, &self.path);

        Ok(match limit {
            Some(n) if items.len() > n => items[items.len() - n..].to_vec(),
            _ => items,
        })
    }

    pub async fn add_items(&self, items: &[Item]) -> Result<(), SessionError> {
        if items.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let _guard = timed_lock(&self.path, true).await?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        for item in items {
            let line = serde_json::to_string(item).expect("Item serialization is infallible");
            writeln!(file, "{line}")?;
        }
        file.flush()?;

        debug!(path = %self.path.display(), count = items.len(), "appended session items");
        Ok(())
    }

    pub async fn pop_item(&self) -> Result<Option<Item>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let _guard = timed_lock(&self.path, true).await?;

        let text = std::fs::read_to_string(&self.path)?;
        let mut lines: Vec<&str> = text.lines().collect();

        let mut last_valid = None;
        while let Some(candidate) = lines.pop() {
            if candidate.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Item>(candidate) {
                Ok(item) => {
                    last_valid = Some(item);
                    break;
                }
                Err(e) => warn!(line = candidate, error = %e, "skipping invalid JSON line while popping"),
            }
        }

        let Some(item) = last_valid else { return Ok(None) };

        let remaining = lines.join("\n");
        let remaining = if remaining.is_empty() { remaining } else { format!("{remaining}\n") };

        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, remaining)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "popped session item");
        Ok(Some(item))
    }

    pub async fn clear(&self) -> Result<(), SessionError> {
        if !self.path.exists() {
            return Ok(());
        }
        let _guard = timed_lock(&self.path, true).await?;
        std::fs::remove_file(&self.path)?;
        lock::cleanup(&self.path);
        Ok(())
    }
}

async fn timed_lock(path: &std::path::Path, exclusive: bool) -> Result<lock::FileLockGuard, SessionError> {
    match tokio::time::timeout(LOCK_TIMEOUT, lock::acquire(path, exclusive)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SessionError::LockTimeout(LOCK_TIMEOUT)),
    }
}

fn parse_lines(text: &str, path: &std::path::Path) -> Vec<Item> {
    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Item>(line) {
            Ok(item) => items.push(item),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid JSON line in session file"),
        }
    }
    items
}
