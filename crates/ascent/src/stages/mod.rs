//! The six stage executors, one per entry in the fixed sequence.
//!
//! Executors are stateless; everything they need arrives through the
//! [`StageContext`] and the snapshot. The orchestrator looks them up by
//! stage name in the table built here.

mod decide;
mod intake;
mod priority;
mod score;
mod title;
mod valuation;

pub use decide::DecideStage;
pub use intake::IntakeStage;
pub use priority::PriorityStage;
pub use score::ScoreStage;
pub use title::TitleReviewStage;
pub use valuation::ValuationStage;

use std::collections::HashMap;
use std::sync::Arc;

use pipeline::StageExecutor;

/// Executor table keyed by stage name. Covers the whole sequence; the
/// orchestrator treats a missing entry as a configuration error.
pub fn executor_table() -> HashMap<&'static str, Arc<dyn StageExecutor>> {
    let executors: [Arc<dyn StageExecutor>; 6] = [
        Arc::new(IntakeStage),
        Arc::new(TitleReviewStage),
        Arc::new(PriorityStage),
        Arc::new(ValuationStage),
        Arc::new(ScoreStage),
        Arc::new(DecideStage),
    ];
    executors
        .into_iter()
        .map(|executor| (executor.def().name, executor))
        .collect()
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use async_trait::async_trait;
    use mockall::mock;
    use tempfile::TempDir;

    use pipeline::{
        BackendMap, BackendReply, DecisionConfig, MlScorer, PipelineResult, ReasoningBackend,
        RouteLog, Router, RouterThresholds, StageContext, StageRequest, TierBackends, TierUsage,
    };

    use crate::scorer::HeuristicScorer;

    mock! {
        pub Backend {}

        #[async_trait]
        impl ReasoningBackend for Backend {
            fn name(&self) -> &str;
            async fn infer(&self, request: &StageRequest) -> PipelineResult<BackendReply>;
        }
    }

    /// Owns everything a [`StageContext`] borrows, so stage tests can build
    /// a context with one call.
    pub struct Fixture {
        pub router: Router,
        pub usage: TierUsage,
        pub backends: BackendMap,
        pub scorer: Arc<dyn MlScorer>,
        pub decision: DecisionConfig,
        pub route_log: RouteLog,
        _tmp: TempDir,
    }

    impl Fixture {
        /// One backend per tier, named `scout-0` / `analyst-0` / `counsel-0`,
        /// all resolving to `backend`.
        pub fn with_backend(backend: Arc<dyn ReasoningBackend>) -> Self {
            let tmp = TempDir::new().unwrap();
            let names = ["scout-0", "analyst-0", "counsel-0"];
            let mut backends = BackendMap::new();
            for name in names {
                backends.insert(name.to_string(), backend.clone());
            }
            Self {
                router: Router::new(
                    TierBackends {
                        scout: vec!["scout-0".into()],
                        analyst: vec!["analyst-0".into()],
                        counsel: vec!["counsel-0".into()],
                    },
                    RouterThresholds::default(),
                )
                .unwrap(),
                usage: TierUsage::new(),
                backends,
                scorer: Arc::new(HeuristicScorer),
                decision: DecisionConfig::default(),
                route_log: RouteLog::new(tmp.path().join("routes.jsonl")),
                _tmp: tmp,
            }
        }

        /// Fixture for stages that must not touch a backend at all.
        pub fn without_backend() -> Self {
            let mut f = Self::with_backend(Arc::new(PanicBackend));
            f.backends.clear();
            f
        }

        pub fn ctx(&self) -> StageContext<'_> {
            StageContext {
                item_id: "item-under-test",
                attempt: 0,
                router: &self.router,
                usage: &self.usage,
                backends: &self.backends,
                scorer: &self.scorer,
                decision: &self.decision,
                route_log: &self.route_log,
            }
        }
    }

    /// Fails the test if any stage dispatches reasoning work through it.
    pub struct PanicBackend;

    #[async_trait]
    impl ReasoningBackend for PanicBackend {
        fn name(&self) -> &str {
            "panic-backend"
        }

        async fn infer(&self, request: &StageRequest) -> PipelineResult<BackendReply> {
            panic!("stage '{}' dispatched unexpectedly", request.stage);
        }
    }
}
