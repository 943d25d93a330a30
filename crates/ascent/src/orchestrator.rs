//! Orchestrator: drives items through the fixed stage sequence.
//!
//! One item at a time the flow is strictly sequential: mark the item
//! running, pre-check required inputs, execute the stage under a deadline
//! with retry on transient failures, append the checkpoint, merge the
//! output, persist, advance. Across items a bounded worker pool runs the
//! same loop concurrently; items are disjoint so no finer locking exists.
//!
//! Resume is replay: completed checkpoint outputs are folded back into the
//! snapshot before any stage runs, so an item interrupted between the
//! checkpoint write and the item write heals itself on the next run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pipeline::store::{checkpoints, items};
use pipeline::{
    stage_at, BackendMap, Checkpoint, CheckpointStatus, DataDir, FailureClass, FailureReason,
    ItemRecord, ItemSeed, ItemStatus, MlScorer, PipelineError, PipelineResult, RouteDecision,
    RouteLog, Router, StageContext, StageDef, StageExecutor, StageOutcome, TierUsage,
    TierUsageSnapshot, STAGE_SEQUENCE,
};

use crate::config::AscentConfig;
use crate::stages::executor_table;
use crate::state_machine::StateMachine;

/// Outcome counts for one batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
    pub escalated: usize,
    /// Items left non-terminal, normally by cancellation.
    pub interrupted: usize,
    /// Host-level faults (storage, wiring) where the run itself errored.
    pub errors: usize,
}

/// Read-only view for reporting: the item plus its full history.
#[derive(Debug, Serialize)]
pub struct ItemReport {
    pub item: ItemRecord,
    pub checkpoints: Vec<Checkpoint>,
    pub routes: Vec<RouteDecision>,
}

pub struct Orchestrator {
    config: AscentConfig,
    data: DataDir,
    router: Router,
    usage: TierUsage,
    backends: BackendMap,
    scorer: Arc<dyn MlScorer>,
    executors: HashMap<&'static str, Arc<dyn StageExecutor>>,
    route_log: RouteLog,
    cancel: Arc<CancellationToken>,
}

impl Orchestrator {
    /// Wire up the pipeline against `config`. Backends and the scorer are
    /// injected so tests can run the full loop without a network.
    pub fn new(
        config: AscentConfig,
        backends: BackendMap,
        scorer: Arc<dyn MlScorer>,
    ) -> PipelineResult<Self> {
        let data = DataDir::open(&config.data_dir)?;
        let router = Router::new(config.tier_backends(), config.router.clone())?;
        let route_log = RouteLog::new(data.route_log_path());
        Ok(Self {
            config,
            data,
            router,
            usage: TierUsage::new(),
            backends,
            scorer,
            executors: executor_table(),
            route_log,
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    /// Token checked between stages; cancelling leaves in-flight stages to
    /// finish and items at their last persisted state.
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    pub fn usage(&self) -> TierUsageSnapshot {
        self.usage.snapshot()
    }

    /// Run one seed to a terminal status. A seed whose identifier is already
    /// on disk resumes the persisted record; its stored facts win.
    pub async fn run_seed(&self, seed: ItemSeed) -> PipelineResult<ItemRecord> {
        let item = self.load_or_create(seed)?;
        self.run_item(item).await
    }

    fn load_or_create(&self, seed: ItemSeed) -> PipelineResult<ItemRecord> {
        if let Some(id) = seed.id.as_deref() {
            if items::exists(&self.data, id) {
                info!(item_id = %id, "known item, resuming persisted state");
                return Ok(items::load(&self.data, id)?);
            }
        }
        let item = ItemRecord::new(seed)?;
        items::save(&self.data, &item)?;
        info!(item_id = %item.id, "item ingested");
        Ok(item)
    }

    /// Drive one item until it is terminal, resuming from its checkpoint
    /// log. Re-entry on an already-terminal item is a no-op.
    pub async fn run_item(&self, mut item: ItemRecord) -> PipelineResult<ItemRecord> {
        if item.status.is_terminal() {
            info!(item_id = %item.id, status = %item.status, "item already terminal");
            return Ok(item);
        }

        let log = checkpoints::load(&self.data, &item.id)?;
        let resume_index = replay_checkpoints(&mut item, &log)?;
        let mut machine = match item.status {
            ItemStatus::Pending => StateMachine::new(&item.id),
            ref status => StateMachine::resume(&item.id, status.clone())?,
        };

        for index in resume_index..STAGE_SEQUENCE.len() {
            if self.cancel.is_cancelled() {
                warn!(item_id = %item.id, stage = index, "cancelled between stages");
                items::save(&self.data, &item)?;
                return Ok(item);
            }
            let def = &STAGE_SEQUENCE[index];
            self.mark_running(&mut machine, &mut item, index)?;

            // A missing required key is a wiring bug, never retried.
            let precheck = def
                .requires
                .iter()
                .find(|key| !item.snapshot.contains(key))
                .map(|key| PipelineError::missing_input(def.name, *key));
            let (result, attempts) = match precheck {
                Some(err) => (Err(err), 0),
                None => self.execute_with_retry(def, &item).await,
            };
            // A stage that omits a declared output poisons every stage after
            // it, so it fails here rather than at the consumer.
            let result = match result {
                Ok(StageOutcome::Success(update)) => {
                    match def.produces.iter().find(|key| !update.contains(key)) {
                        Some(key) => Err(PipelineError::config(format!(
                            "stage '{}' completed without producing '{key}'",
                            def.name
                        ))),
                        None => Ok(StageOutcome::Success(update)),
                    }
                }
                other => other,
            };

            match result {
                Ok(StageOutcome::Success(update)) => {
                    let checkpoint = Checkpoint::done(def.name, update.clone(), attempts);
                    checkpoints::append(&self.data, &item.id, checkpoint)?;
                    item.snapshot.merge(&update);
                    item.stage_index = index + 1;
                    items::save(&self.data, &item)?;
                    info!(item_id = %item.id, stage = def.name, attempts, "stage complete");
                }
                Ok(StageOutcome::Escalate { detail }) => {
                    let reason = FailureReason::new(FailureClass::AmbiguousFact, detail);
                    warn!(
                        item_id = %item.id,
                        stage = def.name,
                        reason = %reason,
                        "stage escalated for human review"
                    );
                    let checkpoint = Checkpoint::escalated(def.name, attempts, reason.clone());
                    checkpoints::append(&self.data, &item.id, checkpoint)?;
                    machine.advance(ItemStatus::Escalated { stage: index })?;
                    item.status = machine.current().clone();
                    item.failure = Some(reason);
                    items::save(&self.data, &item)?;
                    return Ok(item);
                }
                Err(err) => {
                    let reason = FailureReason::new(err.failure_class(), err.to_string());
                    error!(
                        item_id = %item.id,
                        stage = def.name,
                        class = %reason.class,
                        attempts,
                        error = %err,
                        "stage failed"
                    );
                    let checkpoint = Checkpoint::failed(def.name, attempts, reason.clone());
                    checkpoints::append(&self.data, &item.id, checkpoint)?;
                    machine.advance(ItemStatus::Failed { stage: index })?;
                    item.status = machine.current().clone();
                    item.failure = Some(reason);
                    items::save(&self.data, &item)?;
                    return Ok(item);
                }
            }
        }

        machine.advance(ItemStatus::Done)?;
        item.status = ItemStatus::Done;
        items::save(&self.data, &item)?;
        info!(item_id = %item.id, "item complete");
        Ok(item)
    }

    /// Process seeds across the bounded worker pool. Items are independent;
    /// one worker's failure or panic never stops the others.
    pub async fn run_batch(self: &Arc<Self>, seeds: Vec<ItemSeed>) -> BatchSummary {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_items));
        let mut join_set: JoinSet<PipelineResult<ItemRecord>> = JoinSet::new();

        for seed in seeds {
            let sem = sem.clone();
            let orchestrator = self.clone();
            join_set.spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                orchestrator.run_seed(seed).await
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(Ok(item)) => match item.status {
                    ItemStatus::Done => summary.done += 1,
                    ItemStatus::Failed { .. } => summary.failed += 1,
                    ItemStatus::Escalated { .. } => summary.escalated += 1,
                    _ => summary.interrupted += 1,
                },
                Ok(Err(err)) => {
                    error!(error = %err, "item run errored");
                    summary.errors += 1;
                }
                Err(err) => {
                    warn!(error = %err, "item worker panicked");
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    /// The item plus its checkpoint history and routing telemetry.
    pub fn report(&self, id: &str) -> PipelineResult<ItemReport> {
        let item = items::load(&self.data, id)?;
        let checkpoints = checkpoints::load(&self.data, id)?;
        let routes = self.route_log.for_item(id)?;
        Ok(ItemReport {
            item,
            checkpoints,
            routes,
        })
    }

    /// Explicit reset: wipe the checkpoint log and return the item to
    /// Pending with only its raw facts. The one sanctioned way to re-run
    /// completed stages.
    pub fn reset(&self, id: &str) -> PipelineResult<ItemRecord> {
        let mut item = items::load(&self.data, id)?;
        item.reset()?;
        checkpoints::reset(&self.data, &item.id)?;
        items::save(&self.data, &item)?;
        info!(item_id = %id, "item reset to pending");
        Ok(item)
    }

    fn mark_running(
        &self,
        machine: &mut StateMachine,
        item: &mut ItemRecord,
        index: usize,
    ) -> PipelineResult<()> {
        let target = ItemStatus::Running { stage: index };
        // Already persisted as running this stage by an interrupted run.
        if *machine.current() == target {
            return Ok(());
        }
        machine.advance(target)?;
        item.status = machine.current().clone();
        item.stage_index = index;
        items::save(&self.data, item)?;
        Ok(())
    }

    /// Execute one stage under the per-attempt deadline, retrying transient
    /// failures with exponential backoff. Returns the result and how many
    /// attempts it took.
    async fn execute_with_retry(
        &self,
        def: &'static StageDef,
        item: &ItemRecord,
    ) -> (PipelineResult<StageOutcome>, u32) {
        let executor = match self.executors.get(def.name) {
            Some(executor) => executor.clone(),
            None => {
                return (
                    Err(PipelineError::config(format!(
                        "no executor registered for stage '{}'",
                        def.name
                    ))),
                    0,
                )
            }
        };
        let deadline = self.config.stage_timeout();
        let max_retries = self.config.retry.max_retries;

        let mut last_err = None;
        for attempt in 0..=max_retries {
            let ctx = StageContext {
                item_id: &item.id,
                attempt,
                router: &self.router,
                usage: &self.usage,
                backends: &self.backends,
                scorer: &self.scorer,
                decision: &self.config.decision,
                route_log: &self.route_log,
            };
            let result = match tokio::time::timeout(
                deadline,
                executor.execute(&ctx, &item.snapshot),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PipelineError::DeadlineExpired {
                    stage: def.name.to_string(),
                    secs: deadline.as_secs(),
                }),
            };
            match result {
                Ok(outcome) => return (Ok(outcome), attempt + 1),
                Err(err) => {
                    if !err.is_transient() || attempt == max_retries {
                        return (Err(err), attempt + 1);
                    }
                    let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                    warn!(
                        item_id = %item.id,
                        stage = def.name,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "transient stage failure, retrying"
                    );
                    last_err = Some(err);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        (Err(last_err.unwrap()), max_retries + 1)
    }
}

/// Verify the completed checkpoints form a prefix of the stage sequence and
/// fold their outputs back into the snapshot. Returns the index of the first
/// stage without a completed checkpoint.
fn replay_checkpoints(item: &mut ItemRecord, log: &[Checkpoint]) -> PipelineResult<usize> {
    let mut next = 0;
    for checkpoint in log {
        match checkpoint.status {
            CheckpointStatus::Done => {
                let expected = stage_at(next).map(|def| def.name);
                if expected != Some(checkpoint.stage.as_str()) {
                    return Err(PipelineError::sequence(format!(
                        "checkpoint log for item '{}' holds '{}' where stage {} ('{}') was expected",
                        item.id,
                        checkpoint.stage,
                        next,
                        expected.unwrap_or("<end of sequence>"),
                    )));
                }
                if let Some(output) = &checkpoint.output {
                    item.snapshot.merge(output);
                }
                next += 1;
            }
            // Failed and escalated records from earlier runs stay in the log
            // as history; the item record decides whether to run again.
            CheckpointStatus::Failed | CheckpointStatus::Escalated => continue,
        }
    }
    if item.stage_index < next {
        item.stage_index = next;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::facts::keys;
    use pipeline::{RawFacts, Snapshot};

    fn item() -> ItemRecord {
        ItemRecord::new(ItemSeed {
            id: Some("case-1".into()),
            facts: RawFacts {
                address: "12 Ridge Rd".into(),
                valuation_cents: 30_000_000,
                judgment_cents: 12_000_000,
                repair_cents: 0,
                plaintiff_name: "First National Bank".into(),
                liens: Vec::new(),
            },
        })
        .unwrap()
    }

    fn done(stage: &str, key: &str, value: i64) -> Checkpoint {
        let mut out = Snapshot::new();
        out.put(key, &value).unwrap();
        Checkpoint::done(stage, out, 1)
    }

    #[test]
    fn test_replay_merges_outputs_in_prefix_order() {
        let mut item = item();
        let log = vec![
            done("intake", keys::VALUATION_CENTS, 31_000_000),
            done("title_review", keys::CLASSIFICATION_CONFIDENCE, 1),
        ];
        let next = replay_checkpoints(&mut item, &log).unwrap();
        assert_eq!(next, 2);
        assert_eq!(item.stage_index, 2);
        let valuation: i64 = item.snapshot.require("test", keys::VALUATION_CENTS).unwrap();
        assert_eq!(valuation, 31_000_000);
        assert!(item.snapshot.contains(keys::CLASSIFICATION_CONFIDENCE));
    }

    #[test]
    fn test_replay_skips_failed_records() {
        let mut item = item();
        let reason = FailureReason::new(FailureClass::TransientExhausted, "flapping");
        let log = vec![
            done("intake", keys::VALUATION_CENTS, 31_000_000),
            Checkpoint::failed("title_review", 4, reason),
            done("title_review", keys::CLASSIFICATION_CONFIDENCE, 1),
        ];
        let next = replay_checkpoints(&mut item, &log).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn test_replay_rejects_out_of_order_log() {
        let mut item = item();
        let log = vec![done("valuation", keys::BID_CEILING_CENTS, 1)];
        let err = replay_checkpoints(&mut item, &log).unwrap_err();
        assert!(matches!(err, PipelineError::SequenceViolation { .. }));
    }

    #[test]
    fn test_replay_empty_log_starts_at_zero() {
        let mut item = item();
        assert_eq!(replay_checkpoints(&mut item, &[]).unwrap(), 0);
        assert_eq!(item.stage_index, 0);
    }
}
