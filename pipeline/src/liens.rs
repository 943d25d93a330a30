//! Lien records.
//!
//! Liens are facts, not derived state: immutable once ingested for an item.
//! Priority is a function of recording date (ascending = most senior), never
//! of lien class.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Priority class of a recorded lien.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LienClass {
    Mortgage,
    Hoa,
    Tax,
    Judgment,
    Other,
}

impl std::fmt::Display for LienClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mortgage => "mortgage",
            Self::Hoa => "hoa",
            Self::Tax => "tax",
            Self::Judgment => "judgment",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// A recorded lien against the property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lien {
    pub class: LienClass,
    /// Recording date; seniority is ascending on this field.
    pub recorded_on: NaiveDate,
    pub amount_cents: i64,
    pub holder: String,
    /// Satisfied liens are released of record and out of contention.
    #[serde(default)]
    pub satisfied: bool,
    /// False when the assignment chain into the current holder is broken.
    /// A broken chain is an ambiguity, never silently resolved.
    #[serde(default = "default_chain_intact")]
    pub chain_intact: bool,
}

fn default_chain_intact() -> bool {
    true
}

/// Indices into `liens` ordered most-senior-first (recording date ascending,
/// ties kept in input order — tie handling is the priority engine's job).
pub fn seniority_order(liens: &[Lien]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..liens.len()).collect();
    order.sort_by_key(|&i| liens[i].recorded_on);
    order
}

/// Whether two unsatisfied liens share a recording date. Satisfied liens are
/// released and cannot contend for priority, so ties involving them are inert.
pub fn has_recording_tie(liens: &[Lien]) -> bool {
    let mut dates: Vec<NaiveDate> = liens
        .iter()
        .filter(|l| !l.satisfied)
        .map(|l| l.recorded_on)
        .collect();
    dates.sort();
    dates.windows(2).any(|w| w[0] == w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lien(class: LienClass, date: &str, satisfied: bool) -> Lien {
        Lien {
            class,
            recorded_on: date.parse().unwrap(),
            amount_cents: 1_000_000,
            holder: "Holder".into(),
            satisfied,
            chain_intact: true,
        }
    }

    #[test]
    fn test_seniority_order_by_recording_date() {
        let liens = vec![
            lien(LienClass::Hoa, "2019-06-01", false),
            lien(LienClass::Mortgage, "2012-03-15", false),
            lien(LienClass::Judgment, "2021-01-10", false),
        ];
        assert_eq!(seniority_order(&liens), vec![1, 0, 2]);
    }

    #[test]
    fn test_recording_tie_detection() {
        let liens = vec![
            lien(LienClass::Mortgage, "2015-05-05", false),
            lien(LienClass::Judgment, "2015-05-05", false),
        ];
        assert!(has_recording_tie(&liens));

        let liens = vec![
            lien(LienClass::Mortgage, "2015-05-05", false),
            lien(LienClass::Judgment, "2016-05-05", false),
        ];
        assert!(!has_recording_tie(&liens));
    }

    #[test]
    fn test_tie_with_satisfied_lien_is_inert() {
        let liens = vec![
            lien(LienClass::Mortgage, "2015-05-05", true),
            lien(LienClass::Judgment, "2015-05-05", false),
        ];
        assert!(!has_recording_tie(&liens));
    }

    #[test]
    fn test_chain_intact_defaults_true() {
        let json = r#"{
            "class": "mortgage",
            "recorded_on": "2012-03-15",
            "amount_cents": 18000000,
            "holder": "Coastal Bank"
        }"#;
        let lien: Lien = serde_json::from_str(json).unwrap();
        assert!(lien.chain_intact);
        assert!(!lien.satisfied);
    }
}
