//! Stage vocabulary: the fixed sequence, the executor trait, and the
//! execution context handed to every stage.
//!
//! The sequence is configuration, not runtime state. Progress through it is
//! recorded per item in checkpoints; the orchestrator walks the table in
//! order and refuses to skip ahead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::backend::{BackendMap, MlScorer, ReasoningBackend};
use crate::decision::DecisionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::facts::{keys, Snapshot};
use crate::router::policy::Router;
use crate::router::usage::TierUsage;
use crate::router::{ComplexitySignals, RouteDecision, RouteSelection};
use crate::store::route_log::RouteLog;

/// Static description of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDef {
    pub name: &'static str,
    /// Fact keys that must exist before the stage runs. A gap here is a
    /// wiring bug and fails the item without retry.
    pub requires: &'static [&'static str],
    /// Fact keys the stage must emit on success.
    pub produces: &'static [&'static str],
    /// Whether the stage dispatches reasoning work through the router.
    pub reasoning: bool,
}

/// The evaluation sequence. Order is load-bearing: each stage's inputs come
/// from the seed facts or from stages before it.
pub static STAGE_SEQUENCE: [StageDef; 6] = [
    StageDef {
        name: "intake",
        requires: &[
            keys::ADDRESS,
            keys::VALUATION_CENTS,
            keys::JUDGMENT_CENTS,
            keys::REPAIR_CENTS,
            keys::PLAINTIFF_NAME,
            keys::LIENS,
        ],
        produces: &[
            keys::ADDRESS,
            keys::VALUATION_CENTS,
            keys::JUDGMENT_CENTS,
            keys::REPAIR_CENTS,
            keys::PLAINTIFF_NAME,
            keys::LIENS,
        ],
        reasoning: false,
    },
    StageDef {
        name: "title_review",
        requires: &[keys::LIENS, keys::PLAINTIFF_NAME],
        produces: &[
            keys::PLAINTIFF_CLASS,
            keys::CLASSIFICATION_CONFIDENCE,
            keys::TITLE_NOTES,
        ],
        reasoning: true,
    },
    StageDef {
        name: "lien_priority",
        requires: &[keys::LIENS, keys::PLAINTIFF_NAME, keys::PLAINTIFF_CLASS],
        produces: &[keys::SURVIVABILITY, keys::SURVIVING_DEBT_CENTS],
        reasoning: false,
    },
    StageDef {
        name: "valuation",
        requires: &[keys::VALUATION_CENTS, keys::REPAIR_CENTS],
        produces: &[keys::BID_CEILING_CENTS],
        reasoning: false,
    },
    StageDef {
        name: "ml_score",
        requires: &[keys::JUDGMENT_CENTS, keys::BID_CEILING_CENTS, keys::LIENS],
        produces: &[keys::ML_PROBABILITY],
        reasoning: false,
    },
    StageDef {
        name: "decision",
        requires: &[
            keys::SURVIVABILITY,
            keys::BID_CEILING_CENTS,
            keys::JUDGMENT_CENTS,
            keys::ML_PROBABILITY,
            keys::PLAINTIFF_CLASS,
        ],
        produces: &[keys::RECOMMENDATION],
        reasoning: true,
    },
];

pub fn stage_at(index: usize) -> Option<&'static StageDef> {
    STAGE_SEQUENCE.get(index)
}

pub fn index_of(name: &str) -> Option<usize> {
    STAGE_SEQUENCE.iter().position(|def| def.name == name)
}

/// What a stage hands back on a non-error path.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Partial facts update to merge into the snapshot.
    Success(Snapshot),
    /// The stage ran fine but the facts cannot support an automated ruling.
    /// Travels the normal return path; the orchestrator turns it into a
    /// terminal ESCALATED, never into a retry.
    Escalate { detail: String },
}

/// Per-attempt execution context. Everything in here is shared pipeline
/// plumbing; the snapshot itself is passed to `execute` separately because
/// the orchestrator owns it.
pub struct StageContext<'a> {
    pub item_id: &'a str,
    pub attempt: u32,
    pub router: &'a Router,
    pub usage: &'a TierUsage,
    pub backends: &'a BackendMap,
    pub scorer: &'a Arc<dyn MlScorer>,
    pub decision: &'a DecisionConfig,
    pub route_log: &'a RouteLog,
}

impl StageContext<'_> {
    /// Route one reasoning dispatch: select a tier and backend from the
    /// given facts, append the route decision to the telemetry log, count
    /// the dispatch, and resolve the backend handle.
    ///
    /// Telemetry loss is logged and swallowed; a missing backend handle is
    /// a configuration error.
    pub fn reasoning_backend(
        &self,
        def: &StageDef,
        snapshot: &Snapshot,
    ) -> PipelineResult<(Arc<dyn ReasoningBackend>, RouteSelection)> {
        let signals = ComplexitySignals::from_snapshot(snapshot);
        let selection = self
            .router
            .select(def.name, def.reasoning, &signals, self.usage)?;
        let backend = self.backends.get(&selection.backend).cloned().ok_or_else(|| {
            PipelineError::config(format!(
                "backend '{}' selected for tier '{}' is not registered",
                selection.backend, selection.tier
            ))
        })?;

        let decision = RouteDecision {
            item_id: self.item_id.to_string(),
            stage: def.name.to_string(),
            attempt: self.attempt,
            tier: selection.tier,
            backend: selection.backend.clone(),
            reason: selection.reason,
            decided_at: Utc::now(),
        };
        if let Err(err) = self.route_log.append(&decision) {
            warn!(error = %err, item_id = %self.item_id, "route telemetry append failed");
        }
        info!(
            item_id = %self.item_id,
            stage = def.name,
            attempt = self.attempt,
            tier = %selection.tier,
            backend = %selection.backend,
            reason = %selection.reason,
            "routed reasoning dispatch"
        );
        self.usage.record(selection.tier);
        Ok((backend, selection))
    }
}

/// One stage of the pipeline. Implementations are stateless; all per-item
/// state flows through the snapshot and the returned outcome.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn def(&self) -> &'static StageDef;

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome>;
}
