//! Auxiliary success-probability model.
//!
//! Fixed-weight logistic over the resolved economics. The output rides on
//! the recommendation as reporting confidence; the category itself comes
//! from the rules engine alone.

use async_trait::async_trait;

use pipeline::{MlScorer, PipelineResult, ScoreFeatures};

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MlScorer for HeuristicScorer {
    async fn score(&self, features: &ScoreFeatures) -> PipelineResult<f64> {
        if features.bid_ceiling_cents <= 0 {
            return Ok(0.05);
        }
        let ratio = features.judgment_cents.max(0) as f64 / features.bid_ceiling_cents as f64;
        // Centered on the middle of the review band (ratio 0.675).
        let mut z = 3.0 * (ratio - 0.675);
        z -= 0.15 * features.lien_count.saturating_sub(1) as f64;
        if features.surviving_debt_cents > 0 {
            z -= 1.0;
        }
        let probability = 1.0 / (1.0 + (-z).exp());
        Ok(probability.clamp(0.01, 0.99))
    }
}
