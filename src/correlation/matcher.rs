//! Windowed search for spikes duplicated with a target spike.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::spikes::{ObserverAs, SingleAsSpikes, Spike, SpikeStore};

/// Finds spikes whose prefix overlap with a target spike exceeds a
/// configured fraction, within a symmetric time window around the target.
#[derive(Debug, Clone, Copy)]
pub struct DuplicationMatcher<'a> {
    store: &'a SpikeStore,
    window: i64,
    fraction: f64,
}

impl<'a> DuplicationMatcher<'a> {
    pub fn new(store: &'a SpikeStore, window: i64, fraction: f64) -> Self {
        Self {
            store,
            window,
            fraction,
        }
    }

    pub fn store(&self) -> &'a SpikeStore {
        self.store
    }

    /// All spikes within `time ± window` that pass the duplication test
    /// against `spike`, grouped by pair. The (source, time) slot itself is
    /// skipped: a spike never matches itself. Pairs monitoring the same AS
    /// through a different observer are included.
    pub fn find_duplicates(
        &self,
        spike: &Spike,
        time: i64,
        source: &ObserverAs,
    ) -> BTreeMap<ObserverAs, SingleAsSpikes> {
        let mut duplicates: BTreeMap<ObserverAs, SingleAsSpikes> = BTreeMap::new();

        for (pair, spikes) in self.store.iter() {
            for (&second, candidate) in spikes.window(time - self.window, time + self.window) {
                if pair == source && second == time {
                    continue;
                }
                if candidate.is_duplicated_with(spike, self.fraction) {
                    duplicates
                        .entry(pair.clone())
                        .or_default()
                        .add_spike(second, candidate.clone());
                }
            }
        }

        duplicates
    }

    /// The set of `spike`'s unique prefixes that appear in any spike from a
    /// *different* AS within the window. Every candidate spike contributes,
    /// whether or not it passes the duplication test; this measures how much
    /// of the target is corroborated by genuinely foreign feeds.
    pub fn corroborated_prefixes(
        &self,
        spike: &Spike,
        time: i64,
        source: &ObserverAs,
    ) -> HashSet<Ipv4Addr> {
        let mut corroborated = HashSet::new();

        for (pair, spikes) in self.store.iter() {
            if pair.as_number == source.as_number {
                continue;
            }
            for (_, candidate) in spikes.window(time - self.window, time + self.window) {
                corroborated.extend(spike.prefixes_duplicated_with(candidate));
            }
        }

        corroborated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(n: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, n, 0)
    }

    fn spike_of(prefixes: &[u8]) -> Spike {
        let mut spike = Spike::new();
        for &n in prefixes {
            spike.add_prefix(prefix(n));
        }
        spike
    }

    fn sample_store() -> (SpikeStore, ObserverAs) {
        let mut store = SpikeStore::new();
        let source = ObserverAs::new("rrc00", 100);
        store.add_spike(source.clone(), 1000, spike_of(&[1, 2, 3]));
        // Same AS, different observer, inside the window.
        store.add_spike(ObserverAs::new("rrc01", 100), 1005, spike_of(&[1, 2, 3]));
        // Different AS, inside the window.
        store.add_spike(ObserverAs::new("rrc01", 200), 1010, spike_of(&[1, 2, 3, 4]));
        // Different AS, outside the window.
        store.add_spike(ObserverAs::new("rrc02", 300), 2000, spike_of(&[1, 2, 3]));
        // Different AS, inside the window but barely overlapping.
        store.add_spike(ObserverAs::new("rrc03", 400), 1002, spike_of(&[1, 8, 9]));
        (store, source)
    }

    #[test]
    fn test_find_duplicates_skips_target_slot() {
        let (store, source) = sample_store();
        let matcher = DuplicationMatcher::new(&store, 60, 0.9);
        let target = store.spike_at(&source, 1000).unwrap().clone();

        let duplicates = matcher.find_duplicates(&target, 1000, &source);
        assert!(!duplicates.contains_key(&source));
        assert!(duplicates.contains_key(&ObserverAs::new("rrc01", 100)));
        assert!(duplicates.contains_key(&ObserverAs::new("rrc01", 200)));
        assert!(!duplicates.contains_key(&ObserverAs::new("rrc02", 300)));
        assert!(!duplicates.contains_key(&ObserverAs::new("rrc03", 400)));
    }

    #[test]
    fn test_find_duplicates_honors_fraction() {
        let (store, source) = sample_store();
        let target = store.spike_at(&source, 1000).unwrap().clone();

        // At 1/3 overlap the barely-overlapping spike matches too.
        let matcher = DuplicationMatcher::new(&store, 60, 0.3);
        let duplicates = matcher.find_duplicates(&target, 1000, &source);
        assert!(duplicates.contains_key(&ObserverAs::new("rrc03", 400)));
    }

    #[test]
    fn test_corroborated_prefixes_ignores_same_as_pairs() {
        let (store, source) = sample_store();
        let matcher = DuplicationMatcher::new(&store, 60, 0.99);
        let target = store.spike_at(&source, 1000).unwrap().clone();

        let corroborated = matcher.corroborated_prefixes(&target, 1000, &source);
        // All three target prefixes appear in the AS 200 spike; the AS 400
        // spike contributes prefix 1 regardless of the duplication test.
        // The same-AS rrc01 feed contributes nothing.
        assert_eq!(corroborated.len(), 3);
        assert!(corroborated.contains(&prefix(1)));
        assert!(corroborated.contains(&prefix(2)));
        assert!(corroborated.contains(&prefix(3)));
    }
}
