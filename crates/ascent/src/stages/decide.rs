//! Decision: run the rules engine, then attach an auxiliary narrative.
//!
//! The engine's verdict is final before any backend is consulted. The
//! narrative dispatch explains the verdict for the human report; losing it
//! is a warning, never a failed item.

use async_trait::async_trait;
use tracing::{info, warn};

use pipeline::decision::rules;
use pipeline::facts::keys;
use pipeline::{
    evaluate, Citation, EngineOutcome, EvaluationInput, PipelineResult, Recommendation, Snapshot,
    StageContext, StageDef, StageExecutor, StageOutcome, StageRequest, SurvivabilityMatrix,
    STAGE_SEQUENCE,
};

const NARRATIVE_INSTRUCTION: &str = "Write a short plain-language rationale for the \
     recommendation in the facts. The category is already decided; explain it, do not \
     re-decide it. Return prose in narrative.";

pub struct DecideStage;

#[async_trait]
impl StageExecutor for DecideStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[5]
    }

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let matrix: SurvivabilityMatrix = snapshot.require(stage, keys::SURVIVABILITY)?;
        let judgment_cents: i64 = snapshot.require(stage, keys::JUDGMENT_CENTS)?;
        let bid_ceiling_cents: i64 = snapshot.require(stage, keys::BID_CEILING_CENTS)?;
        let ml_probability: f64 = snapshot.require(stage, keys::ML_PROBABILITY)?;

        let outcome = evaluate(
            ctx.decision,
            EvaluationInput {
                matrix: &matrix,
                judgment_cents,
                bid_ceiling_cents,
                ml_probability,
            },
        );
        let mut recommendation = match outcome {
            EngineOutcome::Ambiguous { reasons } => {
                return Ok(StageOutcome::Escalate {
                    detail: reasons.join("; "),
                })
            }
            EngineOutcome::Decided(recommendation) => recommendation,
        };
        info!(
            item_id = %ctx.item_id,
            category = %recommendation.category,
            confidence = recommendation.confidence,
            "recommendation decided"
        );

        if let Some(narrative) = self.narrative(ctx, snapshot, &recommendation).await {
            recommendation
                .citations
                .push(Citation::new(rules::NARRATIVE, narrative));
        }

        let mut out = Snapshot::new();
        out.put(keys::RECOMMENDATION, &recommendation)?;
        Ok(StageOutcome::Success(out))
    }
}

impl DecideStage {
    /// Best-effort narrative dispatch. Any failure along the way is logged
    /// and the decided recommendation ships without prose.
    async fn narrative(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
        recommendation: &Recommendation,
    ) -> Option<String> {
        let (backend, selection) = match ctx.reasoning_backend(self.def(), snapshot) {
            Ok(routed) => routed,
            Err(err) => {
                warn!(
                    item_id = %ctx.item_id,
                    error = %err,
                    "narrative routing failed, shipping recommendation without prose"
                );
                return None;
            }
        };

        let mut facts = snapshot.subset(&[
            keys::ADDRESS,
            keys::PLAINTIFF_CLASS,
            keys::TITLE_NOTES,
            keys::SURVIVABILITY,
            keys::BID_CEILING_CENTS,
            keys::JUDGMENT_CENTS,
            keys::ML_PROBABILITY,
        ]);
        if let Err(err) = facts.put(keys::RECOMMENDATION, recommendation) {
            warn!(item_id = %ctx.item_id, error = %err, "recommendation not serializable for narrative request");
            return None;
        }
        let request = StageRequest {
            item_id: ctx.item_id.to_string(),
            stage: self.def().name.to_string(),
            tier: selection.tier,
            instruction: NARRATIVE_INSTRUCTION.to_string(),
            facts,
        };

        match backend.infer(&request).await {
            Ok(reply) => {
                if reply.narrative.is_none() {
                    warn!(
                        item_id = %ctx.item_id,
                        backend = %selection.backend,
                        "backend returned no narrative"
                    );
                }
                reply.narrative
            }
            Err(err) => {
                warn!(
                    item_id = %ctx.item_id,
                    backend = %selection.backend,
                    error = %err,
                    "narrative dispatch failed, continuing without"
                );
                None
            }
        }
    }
}
