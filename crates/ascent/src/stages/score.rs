//! ML score: ask the auxiliary scorer for a success probability.
//!
//! The probability rides along as confidence on the final recommendation;
//! it never picks a category. Surviving debt is read opportunistically
//! since the scorer treats it as one feature among several.

use async_trait::async_trait;
use tracing::debug;

use pipeline::facts::keys;
use pipeline::{
    Lien, PipelineResult, ScoreFeatures, Snapshot, StageContext, StageDef, StageExecutor,
    StageOutcome, STAGE_SEQUENCE,
};

pub struct ScoreStage;

#[async_trait]
impl StageExecutor for ScoreStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[4]
    }

    async fn execute(
        &self,
        ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let judgment_cents: i64 = snapshot.require(stage, keys::JUDGMENT_CENTS)?;
        let bid_ceiling_cents: i64 = snapshot.require(stage, keys::BID_CEILING_CENTS)?;
        let liens: Vec<Lien> = snapshot.require(stage, keys::LIENS)?;
        let surviving_debt_cents: i64 = snapshot
            .optional(keys::SURVIVING_DEBT_CENTS)?
            .unwrap_or(0);

        let features = ScoreFeatures {
            judgment_cents,
            bid_ceiling_cents,
            lien_count: liens.len(),
            surviving_debt_cents,
        };
        let probability = ctx.scorer.score(&features).await?;
        debug!(
            item_id = %ctx.item_id,
            probability,
            "auxiliary score computed"
        );

        let mut out = Snapshot::new();
        out.put(keys::ML_PROBABILITY, &probability)?;
        Ok(StageOutcome::Success(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::Fixture;
    use pipeline::LienClass;

    fn snapshot(judgment: i64, ceiling: i64, lien_count: usize) -> Snapshot {
        let liens: Vec<Lien> = (0..lien_count)
            .map(|i| Lien {
                class: LienClass::Judgment,
                recorded_on: "2018-01-01".parse().unwrap(),
                amount_cents: 1_000_000,
                holder: format!("Creditor {i}"),
                satisfied: false,
                chain_intact: true,
            })
            .collect();
        let mut snap = Snapshot::new();
        snap.put(keys::JUDGMENT_CENTS, &judgment).unwrap();
        snap.put(keys::BID_CEILING_CENTS, &ceiling).unwrap();
        snap.put(keys::LIENS, &liens).unwrap();
        snap
    }

    async fn probability_of(snap: &Snapshot) -> f64 {
        let fixture = Fixture::without_backend();
        match ScoreStage.execute(&fixture.ctx(), snap).await.unwrap() {
            StageOutcome::Success(out) => out.require("test", keys::ML_PROBABILITY).unwrap(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_probability_stays_in_bounds() {
        let p = probability_of(&snapshot(12_000_000, 20_000_000, 1)).await;
        assert!((0.01..=0.99).contains(&p));
    }

    #[tokio::test]
    async fn test_stronger_ratio_scores_higher() {
        let weak = probability_of(&snapshot(6_000_000, 20_000_000, 1)).await;
        let strong = probability_of(&snapshot(16_000_000, 20_000_000, 1)).await;
        assert!(strong > weak);
    }

    #[tokio::test]
    async fn test_surviving_debt_drags_the_score_down() {
        let base = snapshot(12_000_000, 20_000_000, 1);
        let mut burdened = base.clone();
        burdened
            .put(keys::SURVIVING_DEBT_CENTS, &18_000_000_i64)
            .unwrap();
        assert!(probability_of(&burdened).await < probability_of(&base).await);
    }
}
