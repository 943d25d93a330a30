//! Durable state under one data directory.
//!
//! Layout:
//!
//! ```text
//! data/
//!   items/{id}.json            current item record
//!   checkpoints/{id}.json      append-ordered checkpoint log
//!   route_decisions.jsonl      routing telemetry, one JSON object per line
//! ```
//!
//! Item and checkpoint writes go through a temp file and an atomic rename;
//! the telemetry log is plain append.

pub mod checkpoints;
pub mod items;
pub mod route_log;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The checkpoint log already holds a completed record for this stage.
    /// Completed work is never redone or overwritten.
    #[error("item '{item}' already has a completed checkpoint for stage '{stage}'")]
    DuplicateCheckpoint { item: String, stage: String },

    #[error("item '{0}' not found")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolved paths inside the data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Open the layout, creating directories as needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("items"))?;
        fs::create_dir_all(root.join("checkpoints"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn item_path(&self, id: &str) -> PathBuf {
        self.root.join("items").join(format!("{id}.json"))
    }

    pub fn checkpoint_path(&self, id: &str) -> PathBuf {
        self.root.join("checkpoints").join(format!("{id}.json"))
    }

    pub fn route_log_path(&self) -> PathBuf {
        self.root.join("route_decisions.jsonl")
    }
}

/// Write through a sibling temp file and rename into place, so a crash
/// mid-write leaves the previous file intact rather than a torn half.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
