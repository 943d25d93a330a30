//! Lien seniority resolution.
//!
//! Pure seniority analysis over the recorded lien set: establishes recording
//! order, locates the foreclosing plaintiff's lien, and marks which
//! encumbrances survive the foreclosure. Anything the record cannot support
//! is reported as ambiguity for human review, never guessed at.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify::{normalize_name, PlaintiffClass};
use crate::liens::{has_recording_tie, seniority_order, Lien, LienClass};

/// Survivability verdict for a single lien.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivabilityEntry {
    /// Index into the item's lien list, not the seniority order.
    pub lien_index: usize,
    pub class: LienClass,
    pub holder: String,
    pub recorded_on: NaiveDate,
    pub amount_cents: i64,
    pub satisfied: bool,
    pub survives: bool,
    pub reason: String,
}

/// Resolved seniority picture for one property.
///
/// When `ambiguous` is set the matrix carries no entries and no debt figure;
/// downstream consumers escalate instead of interpreting a partial result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SurvivabilityMatrix {
    pub entries: Vec<SurvivabilityEntry>,
    /// Index of the foreclosing plaintiff's lien in the item's lien list.
    pub foreclosing_index: Option<usize>,
    /// True when an unsatisfied mortgage senior to the foreclosing lien
    /// survives the sale. This is the hazard the decision engine treats as
    /// non-negotiable.
    pub senior_survives: bool,
    /// Sum of all surviving unsatisfied debt, regardless of class.
    pub surviving_debt_cents: i64,
    pub ambiguous: bool,
    pub ambiguity_reasons: Vec<String>,
}

impl SurvivabilityMatrix {
    fn ambiguous_because(reasons: Vec<String>) -> Self {
        Self {
            ambiguous: true,
            ambiguity_reasons: reasons,
            ..Default::default()
        }
    }
}

/// Resolve lien priority for a foreclosure brought by `plaintiff_name`.
///
/// Seniority is recording order: earlier `recorded_on` is senior. Satisfied
/// liens never survive. The foreclosing lien merges into the judgment.
/// Unsatisfied liens senior to the foreclosing lien survive; junior ones are
/// extinguished by the sale.
///
/// Ambiguity, not error, when the record cannot support a ruling: an empty
/// lien set, a broken recording chain, a recording-date tie among unsatisfied
/// liens, or a plaintiff that matches no lien or more than one.
pub fn resolve_lien_priority(
    liens: &[Lien],
    plaintiff_name: &str,
    plaintiff_class: PlaintiffClass,
) -> SurvivabilityMatrix {
    if liens.is_empty() {
        return SurvivabilityMatrix::ambiguous_because(vec!["no liens of record".to_string()]);
    }

    let mut reasons = Vec::new();
    for lien in liens {
        if !lien.chain_intact {
            reasons.push(format!("recording chain broken for {}", lien.holder));
        }
    }
    if has_recording_tie(liens) {
        reasons.push("recording-date tie among unsatisfied liens".to_string());
    }
    if !reasons.is_empty() {
        return SurvivabilityMatrix::ambiguous_because(reasons);
    }

    let foreclosing_index = match match_plaintiff(liens, plaintiff_name, plaintiff_class) {
        Ok(idx) => idx,
        Err(reason) => return SurvivabilityMatrix::ambiguous_because(vec![reason]),
    };
    let foreclosing_date = liens[foreclosing_index].recorded_on;

    let mut entries = Vec::with_capacity(liens.len());
    let mut senior_survives = false;
    let mut surviving_debt_cents: i64 = 0;
    for idx in seniority_order(liens) {
        let lien = &liens[idx];
        let (survives, reason) = if lien.satisfied {
            (false, "satisfied of record".to_string())
        } else if idx == foreclosing_index {
            (false, "foreclosing lien merges into the judgment".to_string())
        } else if lien.recorded_on < foreclosing_date {
            (true, "senior to the foreclosing lien".to_string())
        } else {
            (false, "extinguished by foreclosure of senior lien".to_string())
        };
        if survives {
            surviving_debt_cents = surviving_debt_cents.saturating_add(lien.amount_cents);
            if lien.class == LienClass::Mortgage {
                senior_survives = true;
            }
        }
        entries.push(SurvivabilityEntry {
            lien_index: idx,
            class: lien.class,
            holder: lien.holder.clone(),
            recorded_on: lien.recorded_on,
            amount_cents: lien.amount_cents,
            satisfied: lien.satisfied,
            survives,
            reason,
        });
    }

    SurvivabilityMatrix {
        entries,
        foreclosing_index: Some(foreclosing_index),
        senior_survives,
        surviving_debt_cents,
        ambiguous: false,
        ambiguity_reasons: Vec::new(),
    }
}

/// Locate the foreclosing plaintiff's lien by normalized name containment,
/// narrowing by lien class when several holders match. `Err` carries the
/// ambiguity reason.
fn match_plaintiff(
    liens: &[Lien],
    plaintiff_name: &str,
    plaintiff_class: PlaintiffClass,
) -> Result<usize, String> {
    let needle = normalize_name(plaintiff_name);
    if needle.is_empty() {
        return Err("plaintiff name is empty".to_string());
    }

    let candidates: Vec<usize> = liens
        .iter()
        .enumerate()
        .filter(|(_, lien)| {
            let holder = normalize_name(&lien.holder);
            holder.contains(&needle) || needle.contains(&holder)
        })
        .map(|(idx, _)| idx)
        .collect();

    match candidates.len() {
        0 => Err(format!(
            "foreclosing plaintiff '{plaintiff_name}' matches no lien of record"
        )),
        1 => Ok(candidates[0]),
        _ => {
            let narrowed: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&idx| class_compatible(plaintiff_class, liens[idx].class))
                .collect();
            if narrowed.len() == 1 {
                Ok(narrowed[0])
            } else {
                Err(format!(
                    "foreclosing plaintiff '{plaintiff_name}' matches {} liens of record",
                    candidates.len()
                ))
            }
        }
    }
}

fn class_compatible(plaintiff: PlaintiffClass, lien: LienClass) -> bool {
    matches!(
        (plaintiff, lien),
        (PlaintiffClass::Hoa, LienClass::Hoa)
            | (PlaintiffClass::Lender, LienClass::Mortgage)
            | (PlaintiffClass::TaxAuthority, LienClass::Tax)
            | (PlaintiffClass::JudgmentCreditor, LienClass::Judgment)
            | (PlaintiffClass::Unknown, _)
    )
}
