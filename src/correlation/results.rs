//! Per-spike classification outcomes and the aggregated result tables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::topology::UNREACHABLE;

use super::stats::SpikeClassStats;

/// Outcome of the threshold-based classifier for one spike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicClassificationResult {
    pub single: bool,
    pub size: usize,
    /// Updates in the spike whose prefix was seen from another AS.
    pub corroborated_prefixes: usize,
}

/// Outcome of the topology-aware classifier for one spike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvancedClassificationResult {
    pub single: bool,
    pub size: usize,
    pub visibility: f64,
    /// Largest hop distance to an AS with a significant duplicate, when the
    /// group had significant partners and the distance was determinable.
    pub max_distance: Option<u8>,
    /// Largest time offset to a significant duplicate, in seconds.
    pub max_time_difference: Option<i64>,
    pub origin_as_count: usize,
}

/// Counters kept by the basic classifier, merged across shards.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DuplicationStats {
    pub single_spikes: u64,
    pub single_prefixes: u64,
    pub correlated_spikes: u64,
    pub correlated_prefixes: u64,
    pub corroborated_prefixes: u64,
}

impl DuplicationStats {
    pub fn add(&mut self, result: &BasicClassificationResult) {
        if result.single {
            self.single_spikes += 1;
            self.single_prefixes += result.size as u64;
        } else {
            self.correlated_spikes += 1;
            self.correlated_prefixes += result.size as u64;
        }
        self.corroborated_prefixes += result.corroborated_prefixes as u64;
    }

    pub fn merge(&mut self, other: &DuplicationStats) {
        self.single_spikes += other.single_spikes;
        self.single_prefixes += other.single_prefixes;
        self.correlated_spikes += other.correlated_spikes;
        self.correlated_prefixes += other.correlated_prefixes;
        self.corroborated_prefixes += other.corroborated_prefixes;
    }

    pub fn total_spikes(&self) -> u64 {
        self.single_spikes + self.correlated_spikes
    }
}

/// Everything accumulated over one run: the basic counters plus the advanced
/// classes, with single spikes banded by source-AS visibility and correlated
/// spikes bucketed by their maximum hop distance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationResults {
    pub basic: DuplicationStats,
    pub single_low_visibility: SpikeClassStats,
    pub single_mid_visibility: SpikeClassStats,
    pub single_high_visibility: SpikeClassStats,
    pub correlated_by_hop: BTreeMap<u8, SpikeClassStats>,
    pub correlated_unreachable: SpikeClassStats,
}

impl ClassificationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_basic(&mut self, result: &BasicClassificationResult) {
        self.basic.add(result);
    }

    pub fn add_advanced(&mut self, result: &AdvancedClassificationResult) {
        if result.single {
            let stats = if result.visibility <= 0.33 {
                &mut self.single_low_visibility
            } else if result.visibility <= 0.66 {
                &mut self.single_mid_visibility
            } else {
                &mut self.single_high_visibility
            };
            stats.add(result.size, result.max_time_difference, result.origin_as_count);
            return;
        }
        let stats = match result.max_distance {
            Some(hop) if hop < UNREACHABLE => self.correlated_by_hop.entry(hop).or_default(),
            _ => &mut self.correlated_unreachable,
        };
        stats.add(result.size, result.max_time_difference, result.origin_as_count);
    }

    pub fn merge(&mut self, other: &ClassificationResults) {
        self.basic.merge(&other.basic);
        self.single_low_visibility.merge(&other.single_low_visibility);
        self.single_mid_visibility.merge(&other.single_mid_visibility);
        self.single_high_visibility.merge(&other.single_high_visibility);
        for (hop, stats) in &other.correlated_by_hop {
            self.correlated_by_hop.entry(*hop).or_default().merge(stats);
        }
        self.correlated_unreachable.merge(&other.correlated_unreachable);
    }

    pub fn single_spikes(&self) -> u64 {
        self.single_low_visibility.spikes
            + self.single_mid_visibility.spikes
            + self.single_high_visibility.spikes
    }

    pub fn correlated_spikes(&self) -> u64 {
        self.correlated_by_hop.values().map(|s| s.spikes).sum::<u64>()
            + self.correlated_unreachable.spikes
    }

    /// The largest hop distance any correlated spike reached, if any did.
    pub fn max_hop(&self) -> Option<u8> {
        self.correlated_by_hop.keys().next_back().copied()
    }
}
