//! Recommendation vocabulary and the tunable decision policy.
//!
//! The decision engine itself lives in [`engine`]; lien seniority resolution
//! in [`priority`]. This module holds the shared types both emit.

pub mod engine;
pub mod priority;

use serde::{Deserialize, Serialize};

/// Rule identifiers cited in recommendation provenance.
pub mod rules {
    pub const LIEN_PRIORITY: &str = "lien_priority";
    pub const SENIOR_SURVIVOR_OVERRIDE: &str = "senior_survivor_override";
    pub const BID_CEILING: &str = "bid_ceiling";
    pub const JUDGMENT_RATIO: &str = "judgment_ratio";
    pub const ML_PROBABILITY: &str = "ml_probability";
    /// Auxiliary free-text rationale. Always last, never decides anything.
    pub const NARRATIVE: &str = "narrative";
}

/// Categorical recommendation for one auction property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Bid,
    Review,
    Skip,
    DoNotBid,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bid => "BID",
            Self::Review => "REVIEW",
            Self::Skip => "SKIP",
            Self::DoNotBid => "DO_NOT_BID",
        };
        write!(f, "{s}")
    }
}

/// One provenance entry: which rule fired and the concrete numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub rule: String,
    pub detail: String,
}

impl Citation {
    pub fn new(rule: &str, detail: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            detail: detail.into(),
        }
    }
}

/// The decision stage's product. Citations are ordered by rule application;
/// when the seniority override fires it is always cited first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: Category,
    pub confidence: f64,
    pub citations: Vec<Citation>,
}

fn default_max_bid_pct() -> u32 {
    70
}

fn default_fixed_fee_cents() -> i64 {
    250_000
}

fn default_fee_pct() -> u32 {
    2
}

fn default_bid_threshold_pct() -> u32 {
    75
}

fn default_review_threshold_pct() -> u32 {
    60
}

/// Tunable decision policy. Percentages are whole percents so threshold
/// comparisons stay in integer arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Ceiling as a percentage of valuation, before costs.
    #[serde(default = "default_max_bid_pct")]
    pub max_bid_pct: u32,
    /// Flat transaction cost deducted from every ceiling.
    #[serde(default = "default_fixed_fee_cents")]
    pub fixed_fee_cents: i64,
    /// Percentage-of-valuation cost deducted from every ceiling.
    #[serde(default = "default_fee_pct")]
    pub fee_pct: u32,
    /// Judgment-to-ceiling ratio at or above which the category is BID.
    #[serde(default = "default_bid_threshold_pct")]
    pub bid_threshold_pct: u32,
    /// Judgment-to-ceiling ratio at or above which the category is REVIEW.
    #[serde(default = "default_review_threshold_pct")]
    pub review_threshold_pct: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            max_bid_pct: default_max_bid_pct(),
            fixed_fee_cents: default_fixed_fee_cents(),
            fee_pct: default_fee_pct(),
            bid_threshold_pct: default_bid_threshold_pct(),
            review_threshold_pct: default_review_threshold_pct(),
        }
    }
}

impl DecisionConfig {
    /// Maximum economically sound bid, in cents, saturating at zero when
    /// costs exceed the discounted valuation. A zero ceiling means the
    /// property is uneconomic at any price. Intermediate math is widened so
    /// large valuations cannot overflow.
    pub fn bid_ceiling_cents(&self, valuation_cents: i64, repair_cents: i64) -> i64 {
        let valuation = valuation_cents as i128;
        let ceiling = valuation * self.max_bid_pct as i128 / 100
            - repair_cents as i128
            - self.fixed_fee_cents as i128
            - valuation * self.fee_pct as i128 / 100;
        ceiling.clamp(0, i64::MAX as i128) as i64
    }
}
