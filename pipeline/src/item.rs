//! The unit of work: one auction property candidate.
//!
//! Items are created by a discovery collaborator, mutated exclusively by the
//! orchestrator (single-writer invariant), and archived once terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FailureReason, PipelineResult};
use crate::facts::{keys, Snapshot};
use crate::liens::Lien;

/// Raw facts supplied by the discovery collaborator. Monetary fields are
/// integer minor units (cents); dates inside liens are ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFacts {
    pub address: String,
    pub valuation_cents: i64,
    pub judgment_cents: i64,
    #[serde(default)]
    pub repair_cents: i64,
    pub plaintiff_name: String,
    pub liens: Vec<Lien>,
}

/// Ingestion-side wrapper: discovery may or may not assign an identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSeed {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub facts: RawFacts,
}

/// Item lifecycle status. `Done`, `Failed`, and `Escalated` are terminal;
/// escalation is a terminal outcome handed to a human-review collaborator,
/// not a suspended state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Running { stage: usize },
    Done,
    Failed { stage: usize },
    Escalated { stage: usize },
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Escalated { .. })
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running { stage } => write!(f, "running({stage})"),
            Self::Done => write!(f, "done"),
            Self::Failed { stage } => write!(f, "failed({stage})"),
            Self::Escalated { stage } => write!(f, "escalated({stage})"),
        }
    }
}

/// Durable item record: raw facts plus the accumulated snapshot and the
/// orchestrator's progress through the stage sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub raw: RawFacts,
    pub snapshot: Snapshot,
    pub stage_index: usize,
    pub status: ItemStatus,
    /// Why the item terminated, when it terminated badly. Mirrors the
    /// terminal checkpoint's reason so reports never say just "it failed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl ItemRecord {
    /// Build a fresh record, generating an identifier when discovery did not
    /// assign one. The snapshot starts seeded with the raw facts so stage 0
    /// operates on the same fact keys as every later stage.
    pub fn new(seed: ItemSeed) -> PipelineResult<Self> {
        let id = seed
            .id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let snapshot = Self::seed_snapshot(&seed.facts)?;
        Ok(Self {
            id,
            created_at: Utc::now(),
            raw: seed.facts,
            snapshot,
            stage_index: 0,
            status: ItemStatus::Pending,
            failure: None,
        })
    }

    /// Explicit reset: back to Pending at stage 0 with only the raw facts in
    /// the snapshot. The caller is responsible for clearing checkpoints too.
    pub fn reset(&mut self) -> PipelineResult<()> {
        self.snapshot = Self::seed_snapshot(&self.raw)?;
        self.stage_index = 0;
        self.status = ItemStatus::Pending;
        self.failure = None;
        Ok(())
    }

    fn seed_snapshot(raw: &RawFacts) -> PipelineResult<Snapshot> {
        let mut snapshot = Snapshot::new();
        snapshot.put(keys::ADDRESS, &raw.address)?;
        snapshot.put(keys::VALUATION_CENTS, &raw.valuation_cents)?;
        snapshot.put(keys::JUDGMENT_CENTS, &raw.judgment_cents)?;
        snapshot.put(keys::REPAIR_CENTS, &raw.repair_cents)?;
        snapshot.put(keys::PLAINTIFF_NAME, &raw.plaintiff_name)?;
        snapshot.put(keys::LIENS, &raw.liens)?;
        Ok(snapshot)
    }
}
