//! Title review: classify the foreclosing plaintiff and collect
//! encumbrance notes.
//!
//! The deterministic keyword classifier runs first. Two or more agreeing
//! keywords settle the class locally; anything weaker goes to a reasoning
//! backend, with the tentative class carried in the working facts so the
//! router can see a suspected junior plaintiff before survivability is
//! resolved. The two backend sub-queries run concurrently and fan in
//! before the stage returns.

use async_trait::async_trait;
use tracing::{debug, warn};

use pipeline::facts::keys;
use pipeline::{
    classify_plaintiff, Classification, PipelineResult, PlaintiffClass, Snapshot, StageContext,
    StageDef, StageExecutor, StageOutcome, StageRequest, STAGE_SEQUENCE,
};

/// Classifier confidence at which the backend is skipped. One keyword hit
/// scores 0.60 and stays tentative; two agreeing hits reach 0.75.
const CONFIDENCE_FLOOR: f64 = 0.75;

/// Reported confidence for a backend-sourced class when the reply carries
/// none of its own.
const MODEL_CONFIDENCE_FALLBACK: f64 = 0.7;

const CLASSIFY_INSTRUCTION: &str = "Classify the foreclosing plaintiff from the case facts. \
     Return fields.plaintiff_class as one of hoa, lender, tax_authority, judgment_creditor, \
     unknown, and fields.classification_confidence as a number in [0, 1].";

const NOTES_INSTRUCTION: &str = "Summarize the title encumbrances a bidder at the foreclosure \
     sale would care about. Use only the liens in the facts; never invent records. Return prose \
     in narrative.";

pub struct TitleReviewStage;

#[async_trait]
impl StageExecutor for TitleReviewStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[1]
    }

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let plaintiff_name: String = snapshot.require(stage, keys::PLAINTIFF_NAME)?;
        let heuristic = classify_plaintiff(&plaintiff_name);

        if heuristic.confidence >= CONFIDENCE_FLOOR {
            debug!(
                item_id = %ctx.item_id,
                class = %heuristic.class,
                confidence = heuristic.confidence,
                "classifier settled the plaintiff class, no backend consulted"
            );
            let notes = heuristic_notes(&plaintiff_name, &heuristic);
            return Ok(StageOutcome::Success(output(
                heuristic.class,
                heuristic.confidence,
                notes,
            )?));
        }

        // Tentative class goes into the working facts before routing so the
        // premium override can fire on a suspected junior plaintiff.
        let mut working = snapshot.clone();
        working.put(keys::PLAINTIFF_CLASS, &heuristic.class)?;
        let (backend, selection) = ctx.reasoning_backend(self.def(), &working)?;

        let facts = snapshot.subset(&[keys::ADDRESS, keys::PLAINTIFF_NAME, keys::LIENS]);
        let classify_request = request(ctx, stage, &selection, CLASSIFY_INSTRUCTION, facts.clone());
        let notes_request = request(ctx, stage, &selection, NOTES_INSTRUCTION, facts);

        let (class_reply, notes_reply) = tokio::join!(
            backend.infer(&classify_request),
            backend.infer(&notes_request)
        );
        let class_reply = class_reply?;
        let notes_reply = notes_reply?;

        let (class, confidence) = match class_reply
            .fields
            .optional::<PlaintiffClass>(keys::PLAINTIFF_CLASS)
        {
            Ok(Some(model_class)) => {
                let confidence = class_reply
                    .fields
                    .optional::<f64>(keys::CLASSIFICATION_CONFIDENCE)
                    .ok()
                    .flatten()
                    .unwrap_or(MODEL_CONFIDENCE_FALLBACK)
                    .clamp(0.0, 1.0);
                (model_class, confidence)
            }
            Ok(None) => {
                warn!(
                    item_id = %ctx.item_id,
                    backend = %selection.backend,
                    "backend reply carried no plaintiff class, keeping heuristic"
                );
                (heuristic.class, heuristic.confidence)
            }
            Err(err) => {
                warn!(
                    item_id = %ctx.item_id,
                    backend = %selection.backend,
                    error = %err,
                    "backend plaintiff class unusable, keeping heuristic"
                );
                (heuristic.class, heuristic.confidence)
            }
        };

        let notes = notes_reply
            .narrative
            .or_else(|| {
                notes_reply
                    .fields
                    .optional::<String>(keys::TITLE_NOTES)
                    .ok()
                    .flatten()
            })
            .unwrap_or_else(|| format!("no encumbrance notes returned by {}", selection.backend));

        Ok(StageOutcome::Success(output(class, confidence, notes)?))
    }
}

fn request(
    ctx: &StageContext<'_>,
    stage: &str,
    selection: &pipeline::RouteSelection,
    instruction: &str,
    facts: Snapshot,
) -> StageRequest {
    StageRequest {
        item_id: ctx.item_id.to_string(),
        stage: stage.to_string(),
        tier: selection.tier,
        instruction: instruction.to_string(),
        facts,
    }
}

fn heuristic_notes(plaintiff_name: &str, heuristic: &Classification) -> String {
    format!(
        "plaintiff '{}' classified as {} from recorded keywords {:?} (confidence {:.2})",
        plaintiff_name, heuristic.class, heuristic.matched, heuristic.confidence
    )
}

fn output(class: PlaintiffClass, confidence: f64, notes: String) -> PipelineResult<Snapshot> {
    let mut out = Snapshot::new();
    out.put(keys::PLAINTIFF_CLASS, &class)?;
    out.put(keys::CLASSIFICATION_CONFIDENCE, &confidence)?;
    out.put(keys::TITLE_NOTES, &notes)?;
    Ok(out)
}
