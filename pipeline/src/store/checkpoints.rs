//! Append-only checkpoint log, one file per item.
//!
//! The log is the source of truth for what work is already done. Appending
//! a second completed record for a stage is refused; the orchestrator reuses
//! the existing output instead of re-running the stage.

use std::fs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{write_atomic, DataDir, StoreError, StoreResult};
use crate::error::FailureReason;
use crate::facts::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Done,
    Failed,
    Escalated,
}

/// One progress record. `output` is present only on `Done` and is exactly
/// the facts update the orchestrator merges on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stage: String,
    pub status: CheckpointStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Snapshot>,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl Checkpoint {
    pub fn done(stage: &str, output: Snapshot, attempts: u32) -> Self {
        Self {
            stage: stage.to_string(),
            status: CheckpointStatus::Done,
            output: Some(output),
            attempts,
            recorded_at: Utc::now(),
            failure: None,
        }
    }

    pub fn failed(stage: &str, attempts: u32, reason: FailureReason) -> Self {
        Self {
            stage: stage.to_string(),
            status: CheckpointStatus::Failed,
            output: None,
            attempts,
            recorded_at: Utc::now(),
            failure: Some(reason),
        }
    }

    pub fn escalated(stage: &str, attempts: u32, reason: FailureReason) -> Self {
        Self {
            stage: stage.to_string(),
            status: CheckpointStatus::Escalated,
            output: None,
            attempts,
            recorded_at: Utc::now(),
            failure: Some(reason),
        }
    }
}

/// Load the checkpoint log in append order. A missing file is an empty log.
pub fn load(dir: &DataDir, id: &str) -> StoreResult<Vec<Checkpoint>> {
    let bytes = match fs::read(dir.checkpoint_path(id)) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Append one checkpoint. Refused when the log already holds a `Done`
/// record for the same stage, whatever the incoming status.
pub fn append(dir: &DataDir, id: &str, checkpoint: Checkpoint) -> StoreResult<()> {
    let mut log = load(dir, id)?;
    if log
        .iter()
        .any(|c| c.stage == checkpoint.stage && c.status == CheckpointStatus::Done)
    {
        return Err(StoreError::DuplicateCheckpoint {
            item: id.to_string(),
            stage: checkpoint.stage,
        });
    }
    log.push(checkpoint);
    let bytes = serde_json::to_vec_pretty(&log)?;
    write_atomic(&dir.checkpoint_path(id), &bytes)
}

/// Drop the whole log. Missing file is fine.
pub fn reset(dir: &DataDir, id: &str) -> StoreResult<()> {
    match fs::remove_file(dir.checkpoint_path(id)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::facts::keys;

    fn output_with_ceiling(cents: i64) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.put(keys::BID_CEILING_CENTS, &cents).unwrap();
        snap
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        assert!(load(&dir, "fresh").unwrap().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        append(&dir, "case-1", Checkpoint::done("intake", Snapshot::new(), 1)).unwrap();
        append(
            &dir,
            "case-1",
            Checkpoint::done("title_review", output_with_ceiling(1), 2),
        )
        .unwrap();

        let log = load(&dir, "case-1").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].stage, "intake");
        assert_eq!(log[1].stage, "title_review");
        assert_eq!(log[1].attempts, 2);
        assert!(log[1].output.is_some());
    }

    #[test]
    fn test_completed_stage_refuses_second_append() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        append(&dir, "case-1", Checkpoint::done("intake", Snapshot::new(), 1)).unwrap();

        let err = append(&dir, "case-1", Checkpoint::done("intake", Snapshot::new(), 1))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateCheckpoint { ref stage, .. } if stage == "intake"
        ));

        // Even a failure record cannot land on a completed stage.
        let reason = FailureReason::new(FailureClass::TransientExhausted, "late failure");
        let err = append(&dir, "case-1", Checkpoint::failed("intake", 3, reason)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCheckpoint { .. }));
    }

    #[test]
    fn test_done_after_failed_same_stage_is_allowed() {
        // A failed record does not block later completion of the same stage;
        // only completed work is protected.
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        let reason = FailureReason::new(FailureClass::TransientExhausted, "backend flapping");
        append(&dir, "case-1", Checkpoint::failed("valuation", 4, reason)).unwrap();
        append(&dir, "case-1", Checkpoint::done("valuation", Snapshot::new(), 1)).unwrap();

        let log = load(&dir, "case-1").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].status, CheckpointStatus::Failed);
        assert_eq!(log[1].status, CheckpointStatus::Done);
    }

    #[test]
    fn test_reset_clears_log() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        append(&dir, "case-1", Checkpoint::done("intake", Snapshot::new(), 1)).unwrap();
        reset(&dir, "case-1").unwrap();
        assert!(load(&dir, "case-1").unwrap().is_empty());
        // Resetting an absent log is not an error.
        reset(&dir, "case-1").unwrap();
    }

    #[test]
    fn test_failure_reason_rides_with_terminal_checkpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::open(tmp.path()).unwrap();
        let reason = FailureReason::new(FailureClass::AmbiguousFact, "recording-date tie");
        append(&dir, "case-1", Checkpoint::escalated("lien_priority", 1, reason)).unwrap();

        let log = load(&dir, "case-1").unwrap();
        let failure = log[0].failure.as_ref().unwrap();
        assert_eq!(failure.class, FailureClass::AmbiguousFact);
        assert!(failure.detail.contains("tie"));
    }
}
