//! Item lifecycle state machine.
//!
//! The orchestrator never mutates an item's status directly; every change
//! goes through `advance`, which enforces the legality table below. Stages
//! advance one at a time, terminal states absorb, and an item that stopped
//! mid-flight resumes at its persisted status rather than replaying
//! transitions it already made.
//!
//! ```text
//! Pending      → Running(0)
//! Running(a)   → Running(a+1)
//! Running(last)→ Done
//! Running(a)   → Failed(a) | Escalated(a)
//! Done | Failed | Escalated → (absorbing)
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use pipeline::stage::STAGE_SEQUENCE;
use pipeline::{ItemStatus, PipelineError, PipelineResult};

/// One recorded status change.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub at: DateTime<Utc>,
}

/// Whether `from → to` is a legal status change.
pub fn is_legal_transition(from: &ItemStatus, to: &ItemStatus) -> bool {
    match (from, to) {
        (ItemStatus::Pending, ItemStatus::Running { stage }) => *stage == 0,
        (ItemStatus::Running { stage: a }, ItemStatus::Running { stage: b }) => *b == a + 1,
        (ItemStatus::Running { stage }, ItemStatus::Done) => *stage == STAGE_SEQUENCE.len() - 1,
        (ItemStatus::Running { stage: a }, ItemStatus::Failed { stage: b }) => a == b,
        (ItemStatus::Running { stage: a }, ItemStatus::Escalated { stage: b }) => a == b,
        _ => false,
    }
}

/// Tracks one item's status through a run, with transition history for
/// logging and post-mortems. The durable status lives on the item record;
/// this is the in-memory guard around it.
#[derive(Debug)]
pub struct StateMachine {
    item_id: String,
    current: ItemStatus,
    history: Vec<TransitionRecord>,
}

impl StateMachine {
    /// Fresh machine for an item that has not started.
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            current: ItemStatus::Pending,
            history: Vec::new(),
        }
    }

    /// Rebuild a machine at a previously persisted status. Terminal items
    /// have nothing to resume and are refused.
    pub fn resume(item_id: impl Into<String>, status: ItemStatus) -> PipelineResult<Self> {
        if status.is_terminal() {
            return Err(PipelineError::sequence(format!(
                "cannot resume item in terminal status {status}"
            )));
        }
        Ok(Self {
            item_id: item_id.into(),
            current: status,
            history: Vec::new(),
        })
    }

    pub fn current(&self) -> &ItemStatus {
        &self.current
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Apply one transition, refusing anything outside the legality table.
    pub fn advance(&mut self, to: ItemStatus) -> PipelineResult<()> {
        if !is_legal_transition(&self.current, &to) {
            return Err(PipelineError::sequence(format!(
                "illegal transition {} -> {} for item '{}'",
                self.current, to, self.item_id
            )));
        }
        debug!(item_id = %self.item_id, from = %self.current, to = %to, "status transition");
        self.history.push(TransitionRecord {
            from: self.current.clone(),
            to: to.clone(),
            at: Utc::now(),
        });
        self.current = to;
        Ok(())
    }
}
