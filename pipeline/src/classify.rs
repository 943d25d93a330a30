//! Plaintiff classification from the foreclosing party's name.
//!
//! A deterministic keyword pass over the plaintiff string. The title-review
//! stage tries this first and only consults a reasoning backend when the
//! classifier comes back unconfident, so most items never pay for a model
//! call just to learn that "…Homeowners Association" is an HOA.

use serde::{Deserialize, Serialize};

/// What kind of party is foreclosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaintiffClass {
    Hoa,
    Lender,
    TaxAuthority,
    JudgmentCreditor,
    Unknown,
}

impl PlaintiffClass {
    /// Classes that typically hold junior liens. Drives the router's
    /// premium-tier override, not the decision engine (which works from
    /// recording dates, not labels).
    pub fn is_junior_lien_type(&self) -> bool {
        matches!(self, Self::Hoa | Self::JudgmentCreditor)
    }
}

impl std::fmt::Display for PlaintiffClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Hoa => "hoa",
            Self::Lender => "lender",
            Self::TaxAuthority => "tax_authority",
            Self::JudgmentCreditor => "judgment_creditor",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Classifier output: the class, a confidence score, and which keywords hit.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub class: PlaintiffClass,
    /// 0.0 for unknown; otherwise scales with keyword agreement, capped at 0.95.
    pub confidence: f64,
    pub matched: Vec<&'static str>,
}

/// Keywords that indicate a homeowners/condo association plaintiff.
const HOA_KEYWORDS: &[&str] = &[
    "homeowners",
    "homeowner's",
    "hoa",
    "condominium",
    "condo association",
    "owners association",
    "community association",
    "property owners",
    "master association",
    "villas",
];

/// Keywords that indicate an institutional mortgage lender.
const LENDER_KEYWORDS: &[&str] = &[
    "bank",
    "mortgage",
    "lending",
    "loan trust",
    "savings",
    "credit union",
    "n.a.",
    "fsb",
    "home loans",
    "financial corp",
    "as trustee",
];

/// Keywords that indicate a taxing authority.
const TAX_KEYWORDS: &[&str] = &[
    "tax collector",
    "county of",
    "city of",
    "treasurer",
    "department of revenue",
    "municipality",
    "tax certificate",
];

/// Keywords that indicate a money-judgment creditor.
const JUDGMENT_KEYWORDS: &[&str] = &[
    "judgment",
    "recovery",
    "collections",
    "asset acceptance",
    "funding llc",
    "portfolio",
];

fn score(name_lower: &str, keywords: &[&'static str]) -> (usize, Vec<&'static str>) {
    let matched: Vec<&'static str> = keywords
        .iter()
        .copied()
        .filter(|kw| name_lower.contains(kw))
        .collect();
    (matched.len(), matched)
}

/// Classify a plaintiff name. Deterministic; ties between classes come back
/// as `Unknown` rather than a guess.
pub fn classify_plaintiff(name: &str) -> Classification {
    let lower = name.to_ascii_lowercase();

    let candidates = [
        (PlaintiffClass::Hoa, score(&lower, HOA_KEYWORDS)),
        (PlaintiffClass::Lender, score(&lower, LENDER_KEYWORDS)),
        (PlaintiffClass::TaxAuthority, score(&lower, TAX_KEYWORDS)),
        (
            PlaintiffClass::JudgmentCreditor,
            score(&lower, JUDGMENT_KEYWORDS),
        ),
    ];

    let best = candidates
        .iter()
        .max_by_key(|(_, (hits, _))| *hits)
        .map(|(class, (hits, _))| (*class, *hits))
        .unwrap_or((PlaintiffClass::Unknown, 0));

    let (class, hits) = best;
    if hits == 0 {
        return Classification {
            class: PlaintiffClass::Unknown,
            confidence: 0.0,
            matched: Vec::new(),
        };
    }

    let tied = candidates
        .iter()
        .filter(|(_, (h, _))| *h == hits)
        .count()
        > 1;
    if tied {
        return Classification {
            class: PlaintiffClass::Unknown,
            confidence: 0.0,
            matched: Vec::new(),
        };
    }

    let matched = candidates
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, (_, m))| m.clone())
        .unwrap_or_default();

    Classification {
        class,
        confidence: (0.6 + 0.15 * (hits.saturating_sub(1)) as f64).min(0.95),
        matched,
    }
}

/// Collapse a party name for matching: lowercase, alphanumerics only.
/// "BANK OF AMERICA, N.A." and "Bank of America NA" compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hoa_classification() {
        let c = classify_plaintiff("Palm Grove Homeowners Association, Inc.");
        assert_eq!(c.class, PlaintiffClass::Hoa);
        assert!(c.confidence >= 0.6);
        assert!(!c.matched.is_empty());
    }

    #[test]
    fn test_lender_classification() {
        let c = classify_plaintiff("First National Bank, N.A., as Trustee");
        assert_eq!(c.class, PlaintiffClass::Lender);
        // Multiple keyword hits raise confidence.
        assert!(c.confidence > 0.6);
    }

    #[test]
    fn test_tax_authority_classification() {
        let c = classify_plaintiff("County of Marlow Tax Collector");
        assert_eq!(c.class, PlaintiffClass::TaxAuthority);
    }

    #[test]
    fn test_judgment_creditor_classification() {
        let c = classify_plaintiff("Midland Judgment Recovery LLC");
        assert_eq!(c.class, PlaintiffClass::JudgmentCreditor);
    }

    #[test]
    fn test_unknown_name_gets_zero_confidence() {
        let c = classify_plaintiff("John Q. Smith");
        assert_eq!(c.class, PlaintiffClass::Unknown);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_cross_class_tie_is_unknown() {
        // One HOA hit and one lender hit — refuse to guess.
        let c = classify_plaintiff("Homeowners Savings");
        assert_eq!(c.class, PlaintiffClass::Unknown);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify_plaintiff("Palm Grove Homeowners Association");
        let b = classify_plaintiff("Palm Grove Homeowners Association");
        assert_eq!(a.class, b.class);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.matched, b.matched);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(
            normalize_name("BANK OF AMERICA, N.A."),
            normalize_name("Bank of America NA")
        );
        assert_eq!(normalize_name("Palm-Grove H.O.A."), "palmgrovehoa");
    }

    #[test]
    fn test_junior_lien_type_classes() {
        assert!(PlaintiffClass::Hoa.is_junior_lien_type());
        assert!(PlaintiffClass::JudgmentCreditor.is_junior_lien_type());
        assert!(!PlaintiffClass::Lender.is_junior_lien_type());
        assert!(!PlaintiffClass::TaxAuthority.is_junior_lien_type());
        assert!(!PlaintiffClass::Unknown.is_junior_lien_type());
    }
}
