//! Cumulative per-tier dispatch counters.
//!
//! Plain atomics, shared by reference across stage executors. The router
//! reads them for round-robin placement but never writes; callers record
//! after a dispatch actually happens, so a failed selection leaves the
//! counters untouched and re-selection stays deterministic.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::RouteTier;

#[derive(Debug, Default)]
pub struct TierUsage {
    scout: AtomicU64,
    analyst: AtomicU64,
    counsel: AtomicU64,
}

/// Point-in-time copy for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierUsageSnapshot {
    pub scout: u64,
    pub analyst: u64,
    pub counsel: u64,
}

impl TierUsage {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, tier: RouteTier) -> &AtomicU64 {
        match tier {
            RouteTier::Scout => &self.scout,
            RouteTier::Analyst => &self.analyst,
            RouteTier::Counsel => &self.counsel,
        }
    }

    /// Count one dispatch to `tier`.
    pub fn record(&self, tier: RouteTier) {
        self.cell(tier).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, tier: RouteTier) -> u64 {
        self.cell(tier).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TierUsageSnapshot {
        TierUsageSnapshot {
            scout: self.get(RouteTier::Scout),
            analyst: self.get(RouteTier::Analyst),
            counsel: self.get(RouteTier::Counsel),
        }
    }

    pub fn total(&self) -> u64 {
        let snap = self.snapshot();
        snap.scout + snap.analyst + snap.counsel
    }
}
