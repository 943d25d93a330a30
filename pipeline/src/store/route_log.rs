//! Routing telemetry: an append-only JSONL file shared by all items.
//!
//! Best-effort by contract. Writers append one line per dispatch; readers
//! skip lines that no longer parse rather than failing a report over a
//! truncated tail.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::StoreResult;
use crate::router::RouteDecision;

#[derive(Debug, Clone)]
pub struct RouteLog {
    path: PathBuf,
}

impl RouteLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, decision: &RouteDecision) -> StoreResult<()> {
        let line = serde_json::to_string(decision)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// All decisions in append order. A missing log reads as empty.
    pub fn read_all(&self) -> StoreResult<Vec<RouteDecision>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut decisions = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(decision) => decisions.push(decision),
                Err(err) => {
                    warn!(error = %err, "skipping unparseable route log line");
                }
            }
        }
        Ok(decisions)
    }

    pub fn for_item(&self, item_id: &str) -> StoreResult<Vec<RouteDecision>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|d| d.item_id == item_id)
            .collect())
    }
}
