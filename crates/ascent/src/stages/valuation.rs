//! Valuation: compute the maximum economically sound bid.
//!
//! Straight integer arithmetic over the configured terms; the formula
//! itself lives with the decision policy so the engine and this stage can
//! never disagree about it.

use async_trait::async_trait;
use tracing::debug;

use pipeline::facts::keys;
use pipeline::{
    PipelineResult, Snapshot, StageContext, StageDef, StageExecutor, StageOutcome, STAGE_SEQUENCE,
};

pub struct ValuationStage;

#[async_trait]
impl StageExecutor for ValuationStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[3]
    }

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let valuation_cents: i64 = snapshot.require(stage, keys::VALUATION_CENTS)?;
        let repair_cents: i64 = snapshot.require(stage, keys::REPAIR_CENTS)?;

        let ceiling = ctx.decision.bid_ceiling_cents(valuation_cents, repair_cents);
        debug!(
            item_id = %ctx.item_id,
            valuation_cents,
            repair_cents,
            bid_ceiling_cents = ceiling,
            "bid ceiling computed"
        );

        let mut out = Snapshot::new();
        out.put(keys::BID_CEILING_CENTS, &ceiling)?;
        Ok(StageOutcome::Success(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::Fixture;

    fn snapshot(valuation: i64, repair: i64) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.put(keys::VALUATION_CENTS, &valuation).unwrap();
        snap.put(keys::REPAIR_CENTS, &repair).unwrap();
        snap
    }

    fn ceiling_of(outcome: StageOutcome) -> i64 {
        match outcome {
            StageOutcome::Success(out) => out.require("test", keys::BID_CEILING_CENTS).unwrap(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ceiling_under_default_terms() {
        let fixture = Fixture::without_backend();
        let outcome = ValuationStage
            .execute(&fixture.ctx(), &snapshot(30_000_000, 150_000))
            .await
            .unwrap();
        // 70% of $300k, minus repairs, fixed fee, and 2% of valuation.
        assert_eq!(ceiling_of(outcome), 21_000_000 - 150_000 - 250_000 - 600_000);
    }

    #[tokio::test]
    async fn test_ceiling_saturates_at_zero() {
        let fixture = Fixture::without_backend();
        let outcome = ValuationStage
            .execute(&fixture.ctx(), &snapshot(400_000, 2_000_000))
            .await
            .unwrap();
        assert_eq!(ceiling_of(outcome), 0);
    }
}
