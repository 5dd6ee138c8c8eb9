//! Time-indexed spike collections, keyed by (observer, AS) pair.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use log::info;

use crate::topology::AsNumber;

use super::spike::{Destination, Spike};

/// A vantage point paired with the AS it monitors. The aggregation key for
/// every spike collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverAs {
    pub observer: String,
    pub as_number: AsNumber,
}

impl ObserverAs {
    pub fn new(observer: impl Into<String>, as_number: AsNumber) -> Self {
        Self {
            observer: observer.into(),
            as_number,
        }
    }
}

/// All spikes from exactly one (observer, AS) pair, indexed by second.
#[derive(Debug, Clone, Default)]
pub struct SingleAsSpikes {
    spikes: BTreeMap<i64, Spike>,
}

impl SingleAsSpikes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spike at `time`. Fails if that second is already occupied;
    /// the existing spike is left untouched.
    pub fn add_spike(&mut self, time: i64, spike: Spike) -> bool {
        if self.spikes.contains_key(&time) {
            return false;
        }
        self.spikes.insert(time, spike);
        true
    }

    pub fn spike_at(&self, time: i64) -> Option<&Spike> {
        self.spikes.get(&time)
    }

    pub fn spike_at_mut(&mut self, time: i64) -> Option<&mut Spike> {
        self.spikes.get_mut(&time)
    }

    pub fn has_spike_at(&self, time: i64) -> bool {
        self.spikes.contains_key(&time)
    }

    pub fn spike_count(&self) -> usize {
        self.spikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spikes.is_empty()
    }

    /// Total number of prefix updates across all spikes of this pair.
    pub fn update_sum(&self) -> u64 {
        self.spikes.values().map(|s| s.size() as u64).sum()
    }

    /// The spike with the most updates, if any.
    pub fn biggest_spike(&self) -> Option<&Spike> {
        self.spikes.values().max_by_key(|s| s.size())
    }

    pub fn min_time(&self) -> Option<i64> {
        self.spikes.keys().next().copied()
    }

    pub fn max_time(&self) -> Option<i64> {
        self.spikes.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &Spike)> {
        self.spikes.iter()
    }

    /// Spikes within `[start, end]`, inclusive on both ends.
    pub fn window(&self, start: i64, end: i64) -> impl Iterator<Item = (&i64, &Spike)> {
        self.spikes.range(start..=end)
    }

    /// Drop every spike outside `[start, end]`.
    pub fn synchronise(&mut self, start: i64, end: i64) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.spikes.retain(|&time, _| time >= start && time <= end);
    }
}

/// The full spike dataset: one [`SingleAsSpikes`] per (observer, AS) pair.
/// Built once by the loaders and read-only during classification.
#[derive(Debug, Clone, Default)]
pub struct SpikeStore {
    pairs: BTreeMap<ObserverAs, SingleAsSpikes>,
}

impl SpikeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a complete spike. Fails if the pair already has a spike at
    /// that second.
    pub fn add_spike(&mut self, pair: ObserverAs, time: i64, spike: Spike) -> bool {
        self.pairs.entry(pair).or_default().add_spike(time, spike)
    }

    /// Append one destination to the spike at (pair, time), creating the
    /// spike if this is the first update of that second.
    pub fn record(&mut self, pair: ObserverAs, time: i64, destination: Destination) {
        let spikes = self.pairs.entry(pair).or_default();
        match spikes.spike_at_mut(time) {
            Some(spike) => spike.add_destination(destination),
            None => {
                let mut spike = Spike::new();
                spike.add_destination(destination);
                spikes.add_spike(time, spike);
            }
        }
    }

    pub fn get(&self, pair: &ObserverAs) -> Option<&SingleAsSpikes> {
        self.pairs.get(pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObserverAs, &SingleAsSpikes)> {
        self.pairs.iter()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn spike_count(&self) -> usize {
        self.pairs.values().map(|s| s.spike_count()).sum()
    }

    pub fn update_sum(&self) -> u64 {
        self.pairs.values().map(|s| s.update_sum()).sum()
    }

    /// The distinct monitored AS numbers present in the store.
    pub fn monitored_ases(&self) -> Vec<AsNumber> {
        let set: BTreeSet<AsNumber> = self.pairs.keys().map(|p| p.as_number).collect();
        set.into_iter().collect()
    }

    /// The spike at one exact (pair, second) slot.
    pub fn spike_at(&self, pair: &ObserverAs, time: i64) -> Option<&Spike> {
        self.pairs.get(pair).and_then(|s| s.spike_at(time))
    }

    /// Spikes whose size falls in `[min_size, max_size)`, as a sub-store.
    pub fn select_by_size(&self, min_size: usize, max_size: usize) -> SpikeStore {
        let mut selected = SpikeStore::new();
        for (pair, spikes) in &self.pairs {
            for (&time, spike) in spikes.iter() {
                if spike.size() >= min_size && spike.size() < max_size {
                    selected.add_spike(pair.clone(), time, spike.clone());
                }
            }
        }
        selected
    }

    /// Keep only pairs whose AS is in `ases`.
    pub fn retain_ases(&mut self, ases: &BTreeSet<AsNumber>) {
        self.pairs.retain(|pair, _| ases.contains(&pair.as_number));
    }

    /// Align all pairs to their common overlap window: the latest first
    /// spike and the earliest last spike across pairs. Coverage gaps at the
    /// edges of individual feeds would otherwise skew aggregate statistics.
    /// Pairs left empty after pruning are dropped.
    pub fn synchronise(&mut self) {
        let start = self.pairs.values().filter_map(|s| s.min_time()).max();
        let end = self.pairs.values().filter_map(|s| s.max_time()).min();
        let (Some(start), Some(end)) = (start, end) else {
            return;
        };
        info!("synchronising all pairs to [{start}, {end}]");
        for spikes in self.pairs.values_mut() {
            spikes.synchronise(start, end);
        }
        self.pairs.retain(|_, spikes| !spikes.is_empty());
    }
}
