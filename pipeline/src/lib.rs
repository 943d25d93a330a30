//! Core library for the checkpointed auction-evaluation pipeline.
//!
//! Items move through a fixed stage sequence, accumulating facts in a
//! snapshot and leaving an append-only checkpoint behind each completed
//! stage. Reasoning work is routed across cost tiers by [`router`]; the
//! rule engine in [`decision`] turns resolved facts into a categorical
//! recommendation with full provenance. Orchestration, backends, and the
//! CLI live in the binary crate; everything here is deterministic and
//! testable without a network.

pub mod backend;
pub mod classify;
pub mod decision;
pub mod error;
pub mod facts;
pub mod item;
pub mod liens;
pub mod router;
pub mod stage;
pub mod store;

// Re-export the core vocabulary
pub use error::{FailureClass, FailureReason, PipelineError, PipelineResult};
pub use facts::Snapshot;
pub use item::{ItemRecord, ItemSeed, ItemStatus, RawFacts};

// Re-export fact analysis
pub use classify::{classify_plaintiff, Classification, PlaintiffClass};
pub use liens::{Lien, LienClass};

// Re-export the decision surface
pub use decision::engine::{evaluate, EngineOutcome, EvaluationInput};
pub use decision::priority::{resolve_lien_priority, SurvivabilityEntry, SurvivabilityMatrix};
pub use decision::{Category, Citation, DecisionConfig, Recommendation};

// Re-export the routing surface
pub use router::policy::{complexity_score, premium_override, Router, TierBackends};
pub use router::usage::{TierUsage, TierUsageSnapshot};
pub use router::{
    ComplexitySignals, ReasonCode, RouteDecision, RouteSelection, RouteTier, RouterThresholds,
};

// Re-export execution and persistence
pub use backend::{
    BackendMap, BackendReply, MlScorer, ReasoningBackend, ScoreFeatures, StageRequest,
};
pub use stage::{
    index_of, stage_at, StageContext, StageDef, StageExecutor, StageOutcome, STAGE_SEQUENCE,
};
pub use store::checkpoints::{Checkpoint, CheckpointStatus};
pub use store::route_log::RouteLog;
pub use store::{DataDir, StoreError, StoreResult};
