//! Accumulated-facts snapshot.
//!
//! A flat fact-key → JSON value map. Each stage contributes its declared
//! produced keys; later stages read earlier keys by name. Backed by a
//! `BTreeMap` so persisted JSON serializes byte-identically across runs,
//! which is what makes the idempotent-resume guarantee checkable.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

/// Well-known fact keys shared between stage definitions and executors.
pub mod keys {
    pub const ADDRESS: &str = "address";
    pub const VALUATION_CENTS: &str = "valuation_cents";
    pub const JUDGMENT_CENTS: &str = "judgment_cents";
    pub const REPAIR_CENTS: &str = "repair_cents";
    pub const PLAINTIFF_NAME: &str = "plaintiff_name";
    pub const LIENS: &str = "liens";
    pub const PLAINTIFF_CLASS: &str = "plaintiff_class";
    pub const CLASSIFICATION_CONFIDENCE: &str = "classification_confidence";
    pub const TITLE_NOTES: &str = "title_notes";
    pub const SURVIVABILITY: &str = "survivability";
    pub const SURVIVING_DEBT_CENTS: &str = "surviving_debt_cents";
    pub const BID_CEILING_CENTS: &str = "bid_ceiling_cents";
    pub const ML_PROBABILITY: &str = "ml_probability";
    pub const RECOMMENDATION: &str = "recommendation";
}

/// Ordered fact map. Also used for stage output updates, which are merged
/// into the item's snapshot by the orchestrator after a successful stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Serialize `value` and store it under `key`.
    pub fn put<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> PipelineResult<()> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Fetch and deserialize a required fact. Absence is a `MissingInput`
    /// error (wiring bug); a present-but-wrong-shape value is `InvalidFact`.
    pub fn require<T: DeserializeOwned>(&self, stage: &str, key: &str) -> PipelineResult<T> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| PipelineError::missing_input(stage, key))?;
        serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::invalid_fact(key, e.to_string()))
    }

    /// Fetch and deserialize an optional fact; wrong shapes are still errors.
    pub fn optional<T: DeserializeOwned>(&self, key: &str) -> PipelineResult<Option<T>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PipelineError::invalid_fact(key, e.to_string())),
        }
    }

    /// Merge another snapshot into this one, overwriting existing keys.
    pub fn merge(&mut self, update: &Snapshot) {
        for (k, v) in &update.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Project the subset of facts a stage is allowed to see. Requests to
    /// reasoning backends carry only this projection, never the full corpus.
    pub fn subset(&self, keys: &[&str]) -> Snapshot {
        let mut out = BTreeMap::new();
        for key in keys {
            if let Some(v) = self.0.get(*key) {
                out.insert((*key).to_string(), v.clone());
            }
        }
        Snapshot(out)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}
