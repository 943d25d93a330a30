//! The rule-based decision engine.
//!
//! Deterministic evaluation over resolved seniority, the bid ceiling, and the
//! judgment amount. The model probability rides along as auxiliary confidence
//! and never changes the category.

use super::priority::SurvivabilityMatrix;
use super::{rules, Category, Citation, DecisionConfig, Recommendation};

/// Everything the engine needs, already resolved by earlier stages.
#[derive(Debug, Clone)]
pub struct EvaluationInput<'a> {
    pub matrix: &'a SurvivabilityMatrix,
    pub judgment_cents: i64,
    pub bid_ceiling_cents: i64,
    pub ml_probability: f64,
}

/// Engine verdict. Ambiguity is a first-class outcome, not an error: the
/// caller escalates it to human review.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Decided(Recommendation),
    Ambiguous { reasons: Vec<String> },
}

/// Evaluate one property.
///
/// Rule order is fixed. An ambiguous seniority matrix escalates before any
/// economics are computed. A surviving senior mortgage is DO_NOT_BID
/// regardless of how attractive the numbers look; no ratio is computed for
/// it and the override is cited first. Otherwise the judgment-to-ceiling
/// ratio picks the category, compared in integer cross-multiplication so no
/// float rounding sits on a threshold boundary.
pub fn evaluate(cfg: &DecisionConfig, input: EvaluationInput<'_>) -> EngineOutcome {
    let matrix = input.matrix;
    if matrix.ambiguous {
        return EngineOutcome::Ambiguous {
            reasons: matrix.ambiguity_reasons.clone(),
        };
    }

    if matrix.senior_survives {
        return EngineOutcome::Decided(Recommendation {
            category: Category::DoNotBid,
            confidence: 1.0,
            citations: vec![
                Citation::new(
                    rules::SENIOR_SURVIVOR_OVERRIDE,
                    format!(
                        "unsatisfied senior mortgage survives the sale; surviving debt {} cents",
                        matrix.surviving_debt_cents
                    ),
                ),
                lien_priority_citation(matrix),
            ],
        });
    }

    let ceiling = input.bid_ceiling_cents;
    if ceiling <= 0 {
        return EngineOutcome::Decided(Recommendation {
            category: Category::Skip,
            confidence: input.ml_probability,
            citations: vec![
                lien_priority_citation(matrix),
                Citation::new(
                    rules::BID_CEILING,
                    format!("bid ceiling {ceiling} cents is not positive; uneconomic at any price"),
                ),
                ml_citation(input.ml_probability),
            ],
        });
    }

    let judgment = input.judgment_cents.max(0) as i128;
    let ceiling_wide = ceiling as i128;
    let category = if judgment * 100 >= ceiling_wide * cfg.bid_threshold_pct as i128 {
        Category::Bid
    } else if judgment * 100 >= ceiling_wide * cfg.review_threshold_pct as i128 {
        Category::Review
    } else {
        Category::Skip
    };
    let ratio_pct = judgment * 100 / ceiling_wide;

    EngineOutcome::Decided(Recommendation {
        category,
        confidence: input.ml_probability,
        citations: vec![
            lien_priority_citation(matrix),
            Citation::new(rules::BID_CEILING, format!("bid ceiling {ceiling} cents")),
            Citation::new(
                rules::JUDGMENT_RATIO,
                format!(
                    "judgment {} cents over ceiling {} cents = {}% (bid >= {}%, review >= {}%)",
                    input.judgment_cents, ceiling, ratio_pct, cfg.bid_threshold_pct, cfg.review_threshold_pct
                ),
            ),
            ml_citation(input.ml_probability),
        ],
    })
}

fn lien_priority_citation(matrix: &SurvivabilityMatrix) -> Citation {
    let surviving = matrix.entries.iter().filter(|e| e.survives).count();
    Citation::new(
        rules::LIEN_PRIORITY,
        format!(
            "{} of {} liens survive the sale; surviving debt {} cents",
            surviving,
            matrix.entries.len(),
            matrix.surviving_debt_cents
        ),
    )
}

fn ml_citation(probability: f64) -> Citation {
    Citation::new(
        rules::ML_PROBABILITY,
        format!("model success probability {probability:.3} (auxiliary; does not set category)"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PlaintiffClass;
    use crate::decision::priority::resolve_lien_priority;
    use crate::liens::{Lien, LienClass};

    fn lien(class: LienClass, recorded: &str, amount: i64, holder: &str) -> Lien {
        Lien {
            class,
            recorded_on: recorded.parse().unwrap(),
            amount_cents: amount,
            holder: holder.to_string(),
            satisfied: false,
            chain_intact: true,
        }
    }

    fn clean_matrix() -> SurvivabilityMatrix {
        let liens = vec![
            lien(LienClass::Mortgage, "2010-06-01", 18_000_000, "First National Bank"),
            lien(LienClass::Hoa, "2019-02-14", 900_000, "Harbor Lights Condominium Association"),
        ];
        resolve_lien_priority(&liens, "First National Bank", PlaintiffClass::Lender)
    }

    fn decided(outcome: EngineOutcome) -> Recommendation {
        match outcome {
            EngineOutcome::Decided(rec) => rec,
            EngineOutcome::Ambiguous { reasons } => {
                panic!("expected a decision, got ambiguity: {reasons:?}")
            }
        }
    }

    #[test]
    fn test_ratio_at_review_threshold_is_review() {
        let matrix = clean_matrix();
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 12_000_000,
                bid_ceiling_cents: 20_000_000,
                ml_probability: 0.7,
            },
        ));
        assert_eq!(rec.category, Category::Review);
        assert_eq!(rec.confidence, 0.7);
        let rules_cited: Vec<&str> = rec.citations.iter().map(|c| c.rule.as_str()).collect();
        assert_eq!(
            rules_cited,
            vec!["lien_priority", "bid_ceiling", "judgment_ratio", "ml_probability"]
        );
    }

    #[test]
    fn test_ratio_at_bid_threshold_is_bid() {
        let matrix = clean_matrix();
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 15_000_000,
                bid_ceiling_cents: 20_000_000,
                ml_probability: 0.8,
            },
        ));
        assert_eq!(rec.category, Category::Bid);
    }

    #[test]
    fn test_ratio_below_review_threshold_is_skip() {
        let matrix = clean_matrix();
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 11_999_999,
                bid_ceiling_cents: 20_000_000,
                ml_probability: 0.5,
            },
        ));
        assert_eq!(rec.category, Category::Skip);
    }

    #[test]
    fn test_senior_survivor_overrides_attractive_ratio() {
        let liens = vec![
            lien(LienClass::Mortgage, "2010-06-01", 18_000_000, "First National Bank"),
            lien(LienClass::Hoa, "2019-02-14", 900_000, "Harbor Lights Condominium Association"),
        ];
        let matrix = resolve_lien_priority(
            &liens,
            "Harbor Lights Condominium Association",
            PlaintiffClass::Hoa,
        );
        assert!(matrix.senior_survives);

        // Ratio 0.90 would normally be a strong BID.
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 18_000_000,
                bid_ceiling_cents: 20_000_000,
                ml_probability: 0.94,
            },
        ));
        assert_eq!(rec.category, Category::DoNotBid);
        assert_eq!(rec.confidence, 1.0);
        assert_eq!(rec.citations[0].rule, "senior_survivor_override");
        assert!(!rec
            .citations
            .iter()
            .any(|c| c.rule == "judgment_ratio"), "override must skip ratio math");
    }

    #[test]
    fn test_non_positive_ceiling_is_skip() {
        let matrix = clean_matrix();
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 5_000_000,
                bid_ceiling_cents: -120_000,
                ml_probability: 0.4,
            },
        ));
        assert_eq!(rec.category, Category::Skip);
        assert!(rec.citations.iter().any(|c| c.rule == "bid_ceiling"));
        assert!(!rec.citations.iter().any(|c| c.rule == "judgment_ratio"));
    }

    #[test]
    fn test_ambiguous_matrix_escalates_before_economics() {
        let matrix = SurvivabilityMatrix {
            ambiguous: true,
            ambiguity_reasons: vec!["no liens of record".to_string()],
            ..Default::default()
        };
        let outcome = evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: 15_000_000,
                bid_ceiling_cents: 20_000_000,
                ml_probability: 0.9,
            },
        );
        assert_eq!(
            outcome,
            EngineOutcome::Ambiguous {
                reasons: vec!["no liens of record".to_string()]
            }
        );
    }

    #[test]
    fn test_threshold_comparison_has_no_float_drift() {
        // 3/4 of 1e18 cents overflows f64 mantissa precision but not i128.
        let matrix = clean_matrix();
        let ceiling = 1_000_000_000_000_000_000_i64;
        let rec = decided(evaluate(
            &DecisionConfig::default(),
            EvaluationInput {
                matrix: &matrix,
                judgment_cents: ceiling / 100 * 75,
                bid_ceiling_cents: ceiling,
                ml_probability: 0.5,
            },
        ));
        assert_eq!(rec.category, Category::Bid);
    }
}
