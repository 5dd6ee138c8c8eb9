//! Aggregate statistics over a class of spikes, and the quartile summaries
//! reported for them.

use serde::Serialize;

/// Five-number summary of a sample. Quartiles follow the weighted-average
/// definition: for rank p on n sorted values, np = n * p; when np is integral
/// the quartile is the mean of the values at positions np and np + 1,
/// otherwise the value at position ceil(np).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub min: i64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: i64,
}

impl Quartiles {
    /// Compute the summary for a non-empty sample. The input is sorted here.
    pub fn from_sample(mut sample: Vec<i64>) -> Option<Self> {
        if sample.is_empty() {
            return None;
        }
        sample.sort_unstable();
        Some(Self {
            min: sample[0],
            q1: rank(&sample, 0.25),
            median: rank(&sample, 0.5),
            q3: rank(&sample, 0.75),
            max: sample[sample.len() - 1],
        })
    }
}

fn rank(sorted: &[i64], p: f64) -> f64 {
    let n = sorted.len();
    let np = n as f64 * p;
    let j = np.floor() as usize;
    let g = np - j as f64;
    if g == 0.0 {
        // j is at least 1 here: g == 0 with j == 0 needs np == 0, and both
        // n and p are positive.
        (sorted[j - 1] + sorted[j.min(n - 1)]) as f64 / 2.0
    } else {
        sorted[j] as f64
    }
}

/// Running statistics for one class of spikes: how many there were, how many
/// updates they carried, and the samples later summarised as quartiles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpikeClassStats {
    pub spikes: u64,
    pub prefixes: u64,
    max_group_times: Vec<i64>,
    origin_counts: Vec<i64>,
}

impl SpikeClassStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classified spike. `max_group_time` is absent for spikes
    /// whose group had no significant partner.
    pub fn add(&mut self, size: usize, max_group_time: Option<i64>, origin_count: usize) {
        self.spikes += 1;
        self.prefixes += size as u64;
        if let Some(time) = max_group_time {
            self.max_group_times.push(time);
        }
        self.origin_counts.push(origin_count as i64);
    }

    /// Fold another partial into this one. Used when merging shard results;
    /// the operation is commutative up to sample ordering, which the sort in
    /// [`Quartiles::from_sample`] erases.
    pub fn merge(&mut self, other: &SpikeClassStats) {
        self.spikes += other.spikes;
        self.prefixes += other.prefixes;
        self.max_group_times.extend_from_slice(&other.max_group_times);
        self.origin_counts.extend_from_slice(&other.origin_counts);
    }

    pub fn is_empty(&self) -> bool {
        self.spikes == 0
    }

    pub fn time_quartiles(&self) -> Option<Quartiles> {
        Quartiles::from_sample(self.max_group_times.clone())
    }

    pub fn origins_quartiles(&self) -> Option<Quartiles> {
        Quartiles::from_sample(self.origin_counts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quartiles_even_sample() {
        let q = Quartiles::from_sample(vec![550, 100, 300, 500, 200, 400]).unwrap();
        assert_eq!(q.min, 100);
        assert_eq!(q.q1, 200.0);
        assert_eq!(q.median, 350.0);
        assert_eq!(q.q3, 500.0);
        assert_eq!(q.max, 550);
    }

    #[test]
    fn test_quartiles_single_value() {
        let q = Quartiles::from_sample(vec![42]).unwrap();
        assert_eq!(q.min, 42);
        assert_eq!(q.median, 42.0);
        assert_eq!(q.max, 42);
    }

    #[test]
    fn test_quartiles_empty_sample() {
        assert!(Quartiles::from_sample(vec![]).is_none());
    }

    #[test]
    fn test_stats_add_and_merge() {
        let mut a = SpikeClassStats::new();
        a.add(10, Some(5), 2);
        a.add(20, None, 1);

        let mut b = SpikeClassStats::new();
        b.add(30, Some(15), 3);

        a.merge(&b);
        assert_eq!(a.spikes, 3);
        assert_eq!(a.prefixes, 60);

        let times = a.time_quartiles().unwrap();
        assert_eq!(times.min, 5);
        assert_eq!(times.max, 15);

        let origins = a.origins_quartiles().unwrap();
        assert_eq!(origins.min, 1);
        assert_eq!(origins.max, 3);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let mut a = SpikeClassStats::new();
        a.add(1, Some(3), 1);
        let mut b = SpikeClassStats::new();
        b.add(2, Some(7), 2);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_eq!(ab.spikes, ba.spikes);
        assert_eq!(ab.prefixes, ba.prefixes);
        assert_eq!(ab.time_quartiles(), ba.time_quartiles());
        assert_eq!(ab.origins_quartiles(), ba.origins_quartiles());
    }

    #[test]
    fn test_merge_is_associative() {
        let mut a = SpikeClassStats::new();
        a.add(1, Some(3), 1);
        let mut b = SpikeClassStats::new();
        b.add(2, Some(7), 2);
        let mut c = SpikeClassStats::new();
        c.add(4, None, 5);

        // (a + b) + c
        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        // a + (b + c)
        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left.spikes, right.spikes);
        assert_eq!(left.prefixes, right.prefixes);
        assert_eq!(left.time_quartiles(), right.time_quartiles());
        assert_eq!(left.origins_quartiles(), right.origins_quartiles());
    }
}
