//! Seams to the outside collaborators: reasoning model backends and the
//! auxiliary ML scorer.
//!
//! Everything behind these traits is replaceable in tests; the pipeline
//! itself never talks HTTP directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;
use crate::facts::Snapshot;
use crate::router::RouteTier;

/// One reasoning dispatch to a model backend.
#[derive(Debug, Clone, Serialize)]
pub struct StageRequest {
    pub item_id: String,
    pub stage: String,
    pub tier: RouteTier,
    /// What the backend is asked to do, in prose.
    pub instruction: String,
    /// The fact subset the backend may rely on.
    pub facts: Snapshot,
}

/// Structured backend reply. `fields` is a partial facts update keyed like
/// the snapshot; `narrative` is optional prose for the human report. Both
/// default empty so a minimal reply still parses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendReply {
    #[serde(default)]
    pub fields: Snapshot,
    #[serde(default)]
    pub narrative: Option<String>,
}

/// A model backend capable of reasoning over a fact set.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Registered name, matching the router's backend lists.
    fn name(&self) -> &str;

    async fn infer(&self, request: &StageRequest) -> PipelineResult<BackendReply>;
}

/// Inputs to the auxiliary success-probability model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreFeatures {
    pub judgment_cents: i64,
    pub bid_ceiling_cents: i64,
    pub lien_count: usize,
    pub surviving_debt_cents: i64,
}

/// Auxiliary scorer. Its probability informs confidence reporting only and
/// never decides a category.
#[async_trait]
pub trait MlScorer: Send + Sync {
    async fn score(&self, features: &ScoreFeatures) -> PipelineResult<f64>;
}

/// Registered backends by name.
pub type BackendMap = HashMap<String, Arc<dyn ReasoningBackend>>;
