//! Tier selection policy.
//!
//! Selection is a pure function of the stage kind, the routing signals, and
//! the usage counters, so identical arguments always produce the identical
//! backend. Nothing here performs IO or mutates state.

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

use super::usage::TierUsage;
use super::{ComplexitySignals, ReasonCode, RouteSelection, RouteTier, RouterThresholds};

/// Backend names configured per tier, in round-robin order.
#[derive(Debug, Clone, Default)]
pub struct TierBackends {
    pub scout: Vec<String>,
    pub analyst: Vec<String>,
    pub counsel: Vec<String>,
}

impl TierBackends {
    pub fn for_tier(&self, tier: RouteTier) -> &[String] {
        match tier {
            RouteTier::Scout => &self.scout,
            RouteTier::Analyst => &self.analyst,
            RouteTier::Counsel => &self.counsel,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scout.is_empty() && self.analyst.is_empty() && self.counsel.is_empty()
    }
}

/// The non-negotiable premium predicate: a junior-class plaintiff is
/// foreclosing while an unsatisfied mortgage is of record and survivability
/// has not yet been resolved. Misreading that setup buys a property with the
/// senior debt still attached, so the work always goes to Counsel.
pub fn premium_override(signals: &ComplexitySignals) -> bool {
    signals.junior_plaintiff && signals.unsatisfied_mortgage && !signals.survivability_resolved
}

/// Additive complexity score. Each signal contributes independently; the sum
/// maps to a tier in [`Router::select`].
pub fn complexity_score(signals: &ComplexitySignals, thresholds: &RouterThresholds) -> u32 {
    let mut score = 0;
    if signals.lien_count >= thresholds.complex_lien_count {
        score += 1;
    }
    if signals.lien_count >= thresholds.heavy_lien_count {
        score += 1;
    }
    if signals.judgment_cents >= thresholds.high_impact_cents {
        score += 1;
    }
    if signals.priority_conflict {
        score += 1;
    }
    score
}

#[derive(Debug)]
pub struct Router {
    backends: TierBackends,
    thresholds: RouterThresholds,
}

impl Router {
    pub fn new(backends: TierBackends, thresholds: RouterThresholds) -> PipelineResult<Self> {
        if backends.is_empty() {
            return Err(PipelineError::config("router has no backends configured"));
        }
        Ok(Self {
            backends,
            thresholds,
        })
    }

    pub fn thresholds(&self) -> &RouterThresholds {
        &self.thresholds
    }

    /// Pick the tier and backend for one dispatch.
    ///
    /// Non-reasoning stages are always Scout work. For reasoning stages the
    /// premium override wins outright; otherwise the complexity score maps
    /// 0 to Scout, 1 to Analyst, and 2 or more to Counsel. A tier with no
    /// configured backends resolves upward to the next more capable tier,
    /// never downward. Counters are read, not written; the caller records
    /// usage after the dispatch goes out.
    pub fn select(
        &self,
        stage: &str,
        reasoning: bool,
        signals: &ComplexitySignals,
        usage: &TierUsage,
    ) -> PipelineResult<RouteSelection> {
        let (preferred, reason) = if !reasoning {
            (RouteTier::Scout, ReasonCode::CostOptimal)
        } else if premium_override(signals) {
            (RouteTier::Counsel, ReasonCode::EscalatedRisk)
        } else {
            match complexity_score(signals, &self.thresholds) {
                0 => (RouteTier::Scout, ReasonCode::CostOptimal),
                1 => (RouteTier::Analyst, ReasonCode::EscalatedComplexity),
                _ => (RouteTier::Counsel, ReasonCode::EscalatedComplexity),
            }
        };

        let tier = self.resolve_tier(preferred, stage)?;
        if tier != preferred {
            debug!(stage, %preferred, %tier, "tier has no backends, resolved upward");
        }

        let pool = self.backends.for_tier(tier);
        let index = (usage.get(tier) % pool.len() as u64) as usize;
        Ok(RouteSelection {
            tier,
            backend: pool[index].clone(),
            reason,
        })
    }

    /// First tier at or above `preferred` with at least one backend.
    fn resolve_tier(&self, preferred: RouteTier, stage: &str) -> PipelineResult<RouteTier> {
        let candidate = RouteTier::ALL
            .iter()
            .copied()
            .filter(|tier| tier.cost_rank() >= preferred.cost_rank())
            .find(|tier| !self.backends.for_tier(*tier).is_empty());
        candidate.ok_or_else(|| {
            PipelineError::config(format!(
                "no backend configured at or above tier '{preferred}' required by stage '{stage}'"
            ))
        })
    }
}
