//! Lien priority: resolve seniority and survivability of record.
//!
//! Pure rule work, no reasoning dispatch. Ambiguity travels the normal
//! return path as an escalation; a surviving senior mortgage is recorded
//! as fact and logged at error prominence because it flips the outcome.

use async_trait::async_trait;
use tracing::{error, info};

use pipeline::facts::keys;
use pipeline::{
    resolve_lien_priority, Lien, PipelineResult, PlaintiffClass, Snapshot, StageContext, StageDef,
    StageExecutor, StageOutcome, STAGE_SEQUENCE,
};

pub struct PriorityStage;

#[async_trait]
impl StageExecutor for PriorityStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[2]
    }

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let liens: Vec<Lien> = snapshot.require(stage, keys::LIENS)?;
        let plaintiff_name: String = snapshot.require(stage, keys::PLAINTIFF_NAME)?;
        let plaintiff_class: PlaintiffClass = snapshot.require(stage, keys::PLAINTIFF_CLASS)?;

        let matrix = resolve_lien_priority(&liens, &plaintiff_name, plaintiff_class);
        if matrix.ambiguous {
            return Ok(StageOutcome::Escalate {
                detail: matrix.ambiguity_reasons.join("; "),
            });
        }

        if matrix.senior_survives {
            error!(
                item_id = %ctx.item_id,
                surviving_debt_cents = matrix.surviving_debt_cents,
                plaintiff = %plaintiff_name,
                "senior mortgage survives the sale"
            );
        } else {
            info!(
                item_id = %ctx.item_id,
                liens = matrix.entries.len(),
                surviving_debt_cents = matrix.surviving_debt_cents,
                "lien priority resolved"
            );
        }

        let mut out = Snapshot::new();
        out.put(keys::SURVIVABILITY, &matrix)?;
        out.put(keys::SURVIVING_DEBT_CENTS, &matrix.surviving_debt_cents)?;
        Ok(StageOutcome::Success(out))
    }
}
