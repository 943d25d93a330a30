//! Cost-tiered routing of reasoning work across model backends.
//!
//! Selection policy lives in [`policy`]; cumulative per-tier counters in
//! [`usage`]. This module defines the routing vocabulary shared with the
//! executor and the telemetry log.

pub mod policy;
pub mod usage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::PlaintiffClass;
use crate::facts::{keys, Snapshot};
use crate::liens::{has_recording_tie, Lien};

/// Capability/cost tier. Scout is the cheap default; Counsel is reserved for
/// work where a wrong answer is expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTier {
    Scout,
    Analyst,
    Counsel,
}

impl RouteTier {
    pub const ALL: [RouteTier; 3] = [Self::Scout, Self::Analyst, Self::Counsel];

    /// Ordinal cost rank, cheapest first.
    pub fn cost_rank(&self) -> u8 {
        match self {
            Self::Scout => 0,
            Self::Analyst => 1,
            Self::Counsel => 2,
        }
    }
}

impl std::fmt::Display for RouteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scout => "scout",
            Self::Analyst => "analyst",
            Self::Counsel => "counsel",
        };
        write!(f, "{s}")
    }
}

/// Why the router picked the tier it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    CostOptimal,
    EscalatedComplexity,
    EscalatedRisk,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CostOptimal => "cost_optimal",
            Self::EscalatedComplexity => "escalated_complexity",
            Self::EscalatedRisk => "escalated_risk",
        };
        write!(f, "{s}")
    }
}

/// Raw routing signals extracted from the accumulated facts. Extraction never
/// fails: absent or malformed facts read as empty, and the stage executor's
/// own input validation is what rejects bad data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplexitySignals {
    pub lien_count: usize,
    pub judgment_cents: i64,
    /// Recording-date tie among unsatisfied liens, or a broken chain.
    pub priority_conflict: bool,
    /// Plaintiff classified as a junior-lien-type creditor (HOA, judgment).
    pub junior_plaintiff: bool,
    /// An unsatisfied mortgage is of record. Seniority relative to the
    /// foreclosing lien is not yet known at routing time.
    pub unsatisfied_mortgage: bool,
    /// Lien survivability has already been resolved for this item.
    pub survivability_resolved: bool,
}

impl ComplexitySignals {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let liens: Vec<Lien> = snapshot
            .optional(keys::LIENS)
            .ok()
            .flatten()
            .unwrap_or_default();
        let judgment_cents: i64 = snapshot
            .optional(keys::JUDGMENT_CENTS)
            .ok()
            .flatten()
            .unwrap_or(0);
        let junior_plaintiff = snapshot
            .optional::<PlaintiffClass>(keys::PLAINTIFF_CLASS)
            .ok()
            .flatten()
            .map(|class| class.is_junior_lien_type())
            .unwrap_or(false);
        let priority_conflict =
            has_recording_tie(&liens) || liens.iter().any(|lien| !lien.chain_intact);
        let unsatisfied_mortgage = liens
            .iter()
            .any(|lien| lien.class == crate::liens::LienClass::Mortgage && !lien.satisfied);
        Self {
            lien_count: liens.len(),
            judgment_cents,
            priority_conflict,
            junior_plaintiff,
            unsatisfied_mortgage,
            survivability_resolved: snapshot.contains(keys::SURVIVABILITY),
        }
    }
}

fn default_complex_lien_count() -> usize {
    4
}

fn default_heavy_lien_count() -> usize {
    8
}

fn default_high_impact_cents() -> i64 {
    25_000_000
}

/// Tunable complexity thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterThresholds {
    /// Lien count at which the case stops being routine.
    #[serde(default = "default_complex_lien_count")]
    pub complex_lien_count: usize,
    /// Lien count at which the case counts twice.
    #[serde(default = "default_heavy_lien_count")]
    pub heavy_lien_count: usize,
    /// Judgment size that makes a wrong answer expensive.
    #[serde(default = "default_high_impact_cents")]
    pub high_impact_cents: i64,
}

impl Default for RouterThresholds {
    fn default() -> Self {
        Self {
            complex_lien_count: default_complex_lien_count(),
            heavy_lien_count: default_heavy_lien_count(),
            high_impact_cents: default_high_impact_cents(),
        }
    }
}

/// What `select` returns: which backend to call and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSelection {
    pub tier: RouteTier,
    pub backend: String,
    pub reason: ReasonCode,
}

/// One appended line of routing telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub item_id: String,
    pub stage: String,
    pub attempt: u32,
    pub tier: RouteTier,
    pub backend: String,
    pub reason: ReasonCode,
    pub decided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liens::LienClass;

    fn snapshot_with(liens: &[Lien], judgment: i64, class: Option<PlaintiffClass>) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.put(keys::LIENS, &liens).unwrap();
        snap.put(keys::JUDGMENT_CENTS, &judgment).unwrap();
        if let Some(class) = class {
            snap.put(keys::PLAINTIFF_CLASS, &class).unwrap();
        }
        snap
    }

    fn lien(class: LienClass, recorded: &str, satisfied: bool) -> Lien {
        Lien {
            class,
            recorded_on: recorded.parse().unwrap(),
            amount_cents: 1_000_000,
            holder: "Holder".to_string(),
            satisfied,
            chain_intact: true,
        }
    }

    #[test]
    fn test_signals_from_empty_snapshot_are_inert() {
        let signals = ComplexitySignals::from_snapshot(&Snapshot::new());
        assert_eq!(signals, ComplexitySignals::default());
    }

    #[test]
    fn test_signals_pick_up_mortgage_and_plaintiff_class() {
        let liens = vec![
            lien(LienClass::Mortgage, "2011-05-05", false),
            lien(LienClass::Hoa, "2019-01-01", false),
        ];
        let snap = snapshot_with(&liens, 30_000_000, Some(PlaintiffClass::Hoa));
        let signals = ComplexitySignals::from_snapshot(&snap);
        assert_eq!(signals.lien_count, 2);
        assert_eq!(signals.judgment_cents, 30_000_000);
        assert!(signals.junior_plaintiff);
        assert!(signals.unsatisfied_mortgage);
        assert!(!signals.priority_conflict);
        assert!(!signals.survivability_resolved);
    }

    #[test]
    fn test_satisfied_mortgage_does_not_set_signal() {
        let liens = vec![lien(LienClass::Mortgage, "2011-05-05", true)];
        let snap = snapshot_with(&liens, 1_000_000, Some(PlaintiffClass::Lender));
        let signals = ComplexitySignals::from_snapshot(&snap);
        assert!(!signals.unsatisfied_mortgage);
        assert!(!signals.junior_plaintiff);
    }

    #[test]
    fn test_recording_tie_flags_priority_conflict() {
        let liens = vec![
            lien(LienClass::Mortgage, "2014-09-09", false),
            lien(LienClass::Judgment, "2014-09-09", false),
        ];
        let snap = snapshot_with(&liens, 1_000_000, None);
        assert!(ComplexitySignals::from_snapshot(&snap).priority_conflict);
    }

    #[test]
    fn test_survivability_fact_marks_resolved() {
        let mut snap = Snapshot::new();
        snap.put(keys::SURVIVABILITY, &serde_json::json!({"entries": []}))
            .unwrap();
        assert!(ComplexitySignals::from_snapshot(&snap).survivability_resolved);
    }

    #[test]
    fn test_tier_order_and_display() {
        assert!(RouteTier::Scout.cost_rank() < RouteTier::Analyst.cost_rank());
        assert!(RouteTier::Analyst.cost_rank() < RouteTier::Counsel.cost_rank());
        assert_eq!(RouteTier::Counsel.to_string(), "counsel");
        assert_eq!(
            serde_json::to_string(&RouteTier::Analyst).unwrap(),
            r#""analyst""#
        );
    }
}
