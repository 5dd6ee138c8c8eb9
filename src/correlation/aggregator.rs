//! Bucketed, sharded classification over the whole spike store.
//!
//! Spikes are processed in buckets of similar size so that results can be
//! checkpointed per bucket and reruns can resume from where a run stopped.
//! Within a bucket the (observer, AS) pairs are split into contiguous shards
//! classified in parallel; each shard produces an immutable partial result
//! that the coordinator merges.

use color_eyre::eyre::Result;
use log::{debug, info};
use rayon::prelude::*;

use crate::spikes::{ObserverAs, SpikeStore};
use crate::topology::{AnalyzedAses, DistanceOracle};

use super::group::SpikeGroup;
use super::matcher::DuplicationMatcher;
use super::results::ClassificationResults;

/// Which classifier runs over the groups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationMode {
    /// Threshold-based classification without topology.
    Basic { threshold: f64 },
    /// Topology-aware classification with hop distances.
    Advanced,
}

/// The merged results of one size bucket, `[min_size, max_size)`.
#[derive(Debug, Clone)]
pub struct BucketResult {
    pub min_size: usize,
    pub max_size: usize,
    pub results: ClassificationResults,
}

/// Drives classification across buckets and shards.
pub struct Aggregator<'a> {
    store: &'a SpikeStore,
    ases: &'a AnalyzedAses,
    window: i64,
    fraction: f64,
    mode: ClassificationMode,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        store: &'a SpikeStore,
        ases: &'a AnalyzedAses,
        window: i64,
        fraction: f64,
        mode: ClassificationMode,
    ) -> Self {
        Self {
            store,
            ases,
            window,
            fraction,
            mode,
        }
    }

    /// Classify every spike whose size falls in one of the buckets
    /// `first..last`, where bucket `k` covers sizes
    /// `[stride * (k - 1), stride * k)`. `on_bucket` runs after each bucket
    /// is merged, before the next one starts; a checkpoint failure aborts
    /// the run.
    pub fn classify_all(
        &self,
        first_bucket: usize,
        last_bucket: usize,
        stride: usize,
        threads: usize,
        mut on_bucket: impl FnMut(&BucketResult) -> Result<()>,
    ) -> Result<ClassificationResults> {
        let mut totals = ClassificationResults::new();

        for bucket in first_bucket..last_bucket {
            let min_size = stride * (bucket - 1);
            let max_size = stride * bucket;

            let selection = self.store.select_by_size(min_size, max_size);
            if selection.is_empty() {
                debug!("bucket [{min_size}, {max_size}) holds no spikes, skipping");
                continue;
            }
            info!(
                "classifying bucket [{min_size}, {max_size}): {} spikes across {} pairs",
                selection.spike_count(),
                selection.pair_count()
            );

            let results = self.classify_selection(&selection, threads);
            totals.merge(&results);

            on_bucket(&BucketResult {
                min_size,
                max_size,
                results,
            })?;
        }

        Ok(totals)
    }

    /// Classify one bucket's selection in parallel shards.
    fn classify_selection(&self, selection: &SpikeStore, threads: usize) -> ClassificationResults {
        let pairs: Vec<&ObserverAs> = selection.iter().map(|(pair, _)| pair).collect();
        let shards = shard_pairs(&pairs, threads);

        let partials: Vec<ClassificationResults> = shards
            .par_iter()
            .map(|shard| self.classify_shard(selection, shard))
            .collect();

        let mut merged = ClassificationResults::new();
        for partial in &partials {
            merged.merge(partial);
        }
        merged
    }

    fn classify_shard(
        &self,
        selection: &SpikeStore,
        shard: &[&ObserverAs],
    ) -> ClassificationResults {
        // Duplicates are searched in the full store; the selection only
        // decides which spikes get classified in this bucket.
        let matcher = DuplicationMatcher::new(self.store, self.window, self.fraction);
        let mut oracle = DistanceOracle::new(self.ases.graph());
        let mut results = ClassificationResults::new();

        for pair in shard {
            let Some(spikes) = selection.get(pair) else {
                continue;
            };
            for (&time, spike) in spikes.iter() {
                let group = SpikeGroup::build(&matcher, pair, time, spike);
                match self.mode {
                    ClassificationMode::Basic { threshold } => {
                        results.add_basic(&group.classify_basic(threshold));
                    }
                    ClassificationMode::Advanced => {
                        results.add_advanced(&group.classify_advanced(&mut oracle, self.ases));
                    }
                }
            }
        }

        results
    }
}

/// Split `pairs` into at most `threads` contiguous shards. The last shard
/// absorbs the remainder; fewer pairs than threads yields fewer shards.
fn shard_pairs<'p>(pairs: &[&'p ObserverAs], threads: usize) -> Vec<Vec<&'p ObserverAs>> {
    let threads = threads.max(1);
    if pairs.is_empty() {
        return Vec::new();
    }
    if pairs.len() <= threads {
        return pairs.iter().map(|&p| vec![p]).collect();
    }

    let per_shard = pairs.len() / threads;
    let mut shards = Vec::with_capacity(threads);
    for i in 0..threads {
        let start = i * per_shard;
        let end = if i == threads - 1 {
            pairs.len()
        } else {
            start + per_shard
        };
        shards.push(pairs[start..end].to_vec());
    }
    shards
}
