//! A target spike together with every spike duplicated with it, and the two
//! classifiers that decide whether the target is single or correlated.

use std::collections::BTreeMap;

use log::{error, trace};

use crate::spikes::{ObserverAs, SingleAsSpikes, Spike};
use crate::topology::{AnalyzedAses, DistanceOracle, UNREACHABLE};

use super::matcher::DuplicationMatcher;
use super::results::{AdvancedClassificationResult, BasicClassificationResult};

/// The group of spikes duplicated with one target spike, with the aggregates
/// both classifiers work from. The target's own pair is a group member.
#[derive(Debug, Clone)]
pub struct SpikeGroup {
    source: ObserverAs,
    spike_size: usize,
    origin_as_count: usize,
    members: BTreeMap<ObserverAs, SingleAsSpikes>,

    /// Updates across all member pairs, target included.
    group_sum: u64,
    /// Updates received from the target's AS, through any observer.
    same_as_sum: u64,
    /// Biggest spike among the target's AS pairs.
    same_as_max: u64,
    /// Biggest spike among pairs monitoring a different AS.
    other_as_max: u64,
    total_pairs: usize,
    same_as_pairs: usize,
    /// Updates in the target whose prefix was seen from a different AS
    /// within the window, duplication test aside.
    corroborated_prefixes: usize,
}

impl SpikeGroup {
    pub fn build(
        matcher: &DuplicationMatcher<'_>,
        source: &ObserverAs,
        time: i64,
        spike: &Spike,
    ) -> Self {
        trace!(
            "grouping spike at {time} with {} prefixes from AS {} seen by {}",
            spike.size(),
            source.as_number,
            source.observer
        );

        let mut members = matcher.find_duplicates(spike, time, source);
        members
            .entry(source.clone())
            .or_default()
            .add_spike(time, spike.clone());

        let total_pairs = members.len();
        let same_as_pairs = members
            .keys()
            .filter(|pair| pair.as_number == source.as_number)
            .count();

        let group_sum: u64 = members.values().map(|s| s.update_sum()).sum();

        let mut same_as_sum = 0u64;
        let mut same_as_max = 0u64;
        let mut other_as_max = 0u64;
        for (pair, spikes) in &members {
            let biggest = spikes.biggest_spike().map_or(0, |s| s.size() as u64);
            if pair.as_number == source.as_number {
                same_as_sum += spikes.update_sum();
                same_as_max = same_as_max.max(biggest);
            } else {
                other_as_max = other_as_max.max(biggest);
            }
        }

        let foreign = matcher.corroborated_prefixes(spike, time, source);
        let corroborated_prefixes = spike
            .destinations()
            .iter()
            .filter(|d| foreign.contains(&d.prefix))
            .count();

        Self {
            source: source.clone(),
            spike_size: spike.size(),
            origin_as_count: spike.origin_as_count(),
            members,
            group_sum,
            same_as_sum,
            same_as_max,
            other_as_max,
            total_pairs,
            same_as_pairs,
            corroborated_prefixes,
        }
    }

    pub fn total_pairs(&self) -> usize {
        self.total_pairs
    }

    pub fn group_sum(&self) -> u64 {
        self.group_sum
    }

    /// Threshold-based classification. A spike is single when the foreign
    /// share of the group stays below `threshold` relative to its own AS,
    /// unless enough of its prefixes were individually corroborated.
    pub fn classify_basic(&self, threshold: f64) -> BasicClassificationResult {
        let foreign_sum = (self.group_sum - self.same_as_sum) as f64;
        let single = if foreign_sum < threshold * self.same_as_sum as f64
            && (self.other_as_max as f64) < threshold * self.same_as_max as f64
        {
            true
        } else {
            // The group looks duplicated. Require the target's own prefixes
            // to be corroborated before trusting that.
            self.corroborated_prefixes as f64 <= threshold * self.spike_size as f64
        };

        BasicClassificationResult {
            single,
            size: self.spike_size,
            corroborated_prefixes: self.corroborated_prefixes,
        }
    }

    /// Topology-aware classification. Correlated spikes additionally get the
    /// maximum hop distance and time offset among the group's significant
    /// pairs.
    pub fn classify_advanced(
        &self,
        oracle: &mut DistanceOracle<'_>,
        ases: &AnalyzedAses,
    ) -> AdvancedClassificationResult {
        let visibility = ases.visibility(self.source.as_number);

        let threshold =
            ((self.total_pairs - self.same_as_pairs) as f64 / self.total_pairs as f64) / 2.0;

        let foreign_sum = (self.group_sum - self.same_as_sum) as f64;
        if threshold == 0.0
            || (foreign_sum < threshold * self.same_as_sum as f64
                && (self.other_as_max as f64) < 0.33 * self.same_as_max as f64)
        {
            trace!("spike classified as single");
            return AdvancedClassificationResult {
                single: true,
                size: self.spike_size,
                visibility,
                max_distance: None,
                max_time_difference: None,
                origin_as_count: self.origin_as_count,
            };
        }

        // A pair is significant when it carries more than its even share of
        // the group, or a spike comparable to the target AS's biggest.
        let threshold = (1.0 / self.total_pairs as f64) / 2.0;
        let significant: Vec<&ObserverAs> = self
            .members
            .iter()
            .filter(|(_, spikes)| self.is_significant(spikes, threshold))
            .map(|(pair, _)| pair)
            .collect();

        let mut min_time = None;
        let mut max_time = None;
        let mut max_distance = 0u8;
        let mut infinite = false;
        for &pair in &significant {
            let spikes = &self.members[pair];
            min_time = min_time
                .into_iter()
                .chain(spikes.min_time())
                .min();
            max_time = max_time
                .into_iter()
                .chain(spikes.max_time())
                .max();

            for &second in &significant {
                let distance = oracle.distance(pair.as_number, second.as_number);
                if distance != UNREACHABLE {
                    max_distance = max_distance.max(distance);
                } else {
                    infinite = true;
                }
            }
        }

        let max_distance = if max_distance == 0 {
            // Distinct significant ASes always yield either a finite positive
            // distance or an unreachable one.
            if !infinite && significant.len() > 1 {
                error!(
                    "no distance found among {} significant pairs of the group at AS {}",
                    significant.len(),
                    self.source.as_number
                );
            }
            None
        } else {
            Some(max_distance)
        };

        let max_time_difference = match (min_time, max_time) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        };

        trace!("spike classified as correlated");
        AdvancedClassificationResult {
            single: false,
            size: self.spike_size,
            visibility,
            max_distance,
            max_time_difference,
            origin_as_count: self.origin_as_count,
        }
    }

    fn is_significant(&self, spikes: &SingleAsSpikes, threshold: f64) -> bool {
        let biggest = spikes.biggest_spike().map_or(0, |s| s.size() as u64);
        spikes.update_sum() as f64 > threshold * self.group_sum as f64
            || biggest as f64 > 0.33 * self.same_as_max as f64
    }
}
