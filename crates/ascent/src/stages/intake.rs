//! Intake: validate and normalize the raw seed facts.
//!
//! Everything downstream assumes intake has already rejected garbage, so
//! the checks here are strict and every failure is fatal for the item. No
//! reasoning work; money stays in integer cents.

use async_trait::async_trait;

use pipeline::facts::keys;
use pipeline::{
    Lien, PipelineError, PipelineResult, Snapshot, StageContext, StageDef, StageExecutor,
    StageOutcome, STAGE_SEQUENCE,
};

pub struct IntakeStage;

#[async_trait]
impl StageExecutor for IntakeStage {
    fn def(&self) -> &'static StageDef {
        &STAGE_SEQUENCE[0]
    }

    async fn execute(
        &self,
        _ctx: &StageContext<'_>,
        snapshot: &Snapshot,
    ) -> PipelineResult<StageOutcome> {
        let stage = self.def().name;
        let address: String = snapshot.require(stage, keys::ADDRESS)?;
        let valuation_cents: i64 = snapshot.require(stage, keys::VALUATION_CENTS)?;
        let judgment_cents: i64 = snapshot.require(stage, keys::JUDGMENT_CENTS)?;
        let repair_cents: i64 = snapshot.require(stage, keys::REPAIR_CENTS)?;
        let plaintiff_name: String = snapshot.require(stage, keys::PLAINTIFF_NAME)?;
        let liens: Vec<Lien> = snapshot.require(stage, keys::LIENS)?;

        let address = address.trim();
        if address.is_empty() {
            return Err(PipelineError::invalid_fact(keys::ADDRESS, "address is empty"));
        }
        let plaintiff_name = plaintiff_name.trim();
        if plaintiff_name.is_empty() {
            return Err(PipelineError::invalid_fact(
                keys::PLAINTIFF_NAME,
                "plaintiff name is empty",
            ));
        }
        check_non_negative(keys::VALUATION_CENTS, valuation_cents)?;
        check_non_negative(keys::JUDGMENT_CENTS, judgment_cents)?;
        check_non_negative(keys::REPAIR_CENTS, repair_cents)?;

        let mut normalized = Vec::with_capacity(liens.len());
        for (index, lien) in liens.into_iter().enumerate() {
            if lien.amount_cents < 0 {
                return Err(PipelineError::invalid_fact(
                    keys::LIENS,
                    format!(
                        "lien {index} has negative amount {} cents",
                        lien.amount_cents
                    ),
                ));
            }
            let holder = lien.holder.trim().to_string();
            if holder.is_empty() {
                return Err(PipelineError::invalid_fact(
                    keys::LIENS,
                    format!("lien {index} has no holder of record"),
                ));
            }
            normalized.push(Lien { holder, ..lien });
        }

        let mut out = Snapshot::new();
        out.put(keys::ADDRESS, &address)?;
        out.put(keys::VALUATION_CENTS, &valuation_cents)?;
        out.put(keys::JUDGMENT_CENTS, &judgment_cents)?;
        out.put(keys::REPAIR_CENTS, &repair_cents)?;
        out.put(keys::PLAINTIFF_NAME, &plaintiff_name)?;
        out.put(keys::LIENS, &normalized)?;
        Ok(StageOutcome::Success(out))
    }
}

fn check_non_negative(key: &str, cents: i64) -> PipelineResult<()> {
    if cents < 0 {
        return Err(PipelineError::invalid_fact(
            key,
            format!("{cents} cents is negative"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testutil::Fixture;
    use pipeline::LienClass;

    fn lien(amount: i64, holder: &str) -> Lien {
        Lien {
            class: LienClass::Mortgage,
            recorded_on: "2014-03-01".parse().unwrap(),
            amount_cents: amount,
            holder: holder.to_string(),
            satisfied: false,
            chain_intact: true,
        }
    }

    fn seed(liens: &[Lien]) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.put(keys::ADDRESS, &"  114 Bayshore Dr  ").unwrap();
        snap.put(keys::VALUATION_CENTS, &30_000_000_i64).unwrap();
        snap.put(keys::JUDGMENT_CENTS, &12_000_000_i64).unwrap();
        snap.put(keys::REPAIR_CENTS, &500_000_i64).unwrap();
        snap.put(keys::PLAINTIFF_NAME, &"Coastal Bank, N.A. ").unwrap();
        snap.put(keys::LIENS, &liens).unwrap();
        snap
    }

    #[tokio::test]
    async fn test_intake_normalizes_and_reemits_all_keys() {
        let fixture = Fixture::without_backend();
        let outcome = IntakeStage
            .execute(&fixture.ctx(), &seed(&[lien(18_000_000, " Coastal Bank, N.A. ")]))
            .await
            .unwrap();

        let out = match outcome {
            StageOutcome::Success(out) => out,
            other => panic!("unexpected outcome: {other:?}"),
        };
        for key in STAGE_SEQUENCE[0].produces {
            assert!(out.contains(key), "missing produced key '{key}'");
        }
        let address: String = out.require("test", keys::ADDRESS).unwrap();
        assert_eq!(address, "114 Bayshore Dr");
        let plaintiff: String = out.require("test", keys::PLAINTIFF_NAME).unwrap();
        assert_eq!(plaintiff, "Coastal Bank, N.A.");
        let liens: Vec<Lien> = out.require("test", keys::LIENS).unwrap();
        assert_eq!(liens[0].holder, "Coastal Bank, N.A.");
    }

    #[tokio::test]
    async fn test_negative_money_is_invalid() {
        let fixture = Fixture::without_backend();
        let mut snap = seed(&[lien(18_000_000, "Coastal Bank")]);
        snap.put(keys::REPAIR_CENTS, &-1_i64).unwrap();

        let err = IntakeStage.execute(&fixture.ctx(), &snap).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFact { ref key, .. } if key == keys::REPAIR_CENTS));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_negative_lien_amount_is_invalid() {
        let fixture = Fixture::without_backend();
        let snap = seed(&[lien(-5, "Coastal Bank")]);

        let err = IntakeStage.execute(&fixture.ctx(), &snap).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFact { ref key, .. } if key == keys::LIENS));
    }

    #[tokio::test]
    async fn test_blank_plaintiff_is_invalid() {
        let fixture = Fixture::without_backend();
        let mut snap = seed(&[lien(18_000_000, "Coastal Bank")]);
        snap.put(keys::PLAINTIFF_NAME, &"   ").unwrap();

        let err = IntakeStage.execute(&fixture.ctx(), &snap).await.unwrap_err();
        assert!(
            matches!(err, PipelineError::InvalidFact { ref key, .. } if key == keys::PLAINTIFF_NAME)
        );
    }

    #[tokio::test]
    async fn test_missing_seed_key_is_missing_input() {
        let fixture = Fixture::without_backend();
        let err = IntakeStage
            .execute(&fixture.ctx(), &Snapshot::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }
}
