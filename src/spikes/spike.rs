//! A spike: the prefix updates received from one AS by one vantage point
//! within a single second.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::topology::AsNumber;

/// One announced or withdrawn destination prefix, optionally tagged with the
/// origin AS extracted from the announcement's AS path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub prefix: Ipv4Addr,
    pub origin: Option<AsNumber>,
}

impl Destination {
    pub fn new(prefix: Ipv4Addr) -> Self {
        Self {
            prefix,
            origin: None,
        }
    }

    pub fn with_origin(prefix: Ipv4Addr, origin: AsNumber) -> Self {
        Self {
            prefix,
            origin: Some(origin),
        }
    }
}

/// An unordered collection of destinations from one observer/AS pair in one
/// second. Duplicate prefixes are retained on purpose: every received update
/// counts towards the spike size, and the overlap arithmetic below depends on
/// that.
#[derive(Debug, Clone, Default)]
pub struct Spike {
    destinations: Vec<Destination>,
    prefixes: HashSet<Ipv4Addr>,
    origins: HashSet<AsNumber>,
}

impl Spike {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_destinations(destinations: Vec<Destination>) -> Self {
        let mut spike = Self::new();
        for destination in destinations {
            spike.add_destination(destination);
        }
        spike
    }

    pub fn add_destination(&mut self, destination: Destination) {
        self.prefixes.insert(destination.prefix);
        if let Some(origin) = destination.origin {
            self.origins.insert(origin);
        }
        self.destinations.push(destination);
    }

    /// Add a bare prefix without origin information.
    pub fn add_prefix(&mut self, prefix: Ipv4Addr) {
        self.add_destination(Destination::new(prefix));
    }

    /// Number of prefix updates in the spike, duplicates included.
    pub fn size(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn contains_prefix(&self, prefix: Ipv4Addr) -> bool {
        self.prefixes.contains(&prefix)
    }

    /// Number of distinct origin ASes across all destinations.
    pub fn origin_as_count(&self) -> usize {
        self.origins.len()
    }

    /// Whether two spikes share enough prefixes to count as duplicated.
    ///
    /// The smaller spike is taken as the reference: the overlap is the count
    /// of its destinations whose prefix also appears in the larger spike,
    /// and the spikes are duplicated iff overlap / smaller size reaches
    /// `fraction`. Swapping operands when self is larger makes the test
    /// symmetric by construction.
    pub fn is_duplicated_with(&self, other: &Spike, fraction: f64) -> bool {
        if self.size() > other.size() {
            return other.is_duplicated_with(self, fraction);
        }
        if self.is_empty() {
            return false;
        }
        let overlap = self
            .destinations
            .iter()
            .filter(|d| other.contains_prefix(d.prefix))
            .count();
        overlap as f64 / self.size() as f64 >= fraction
    }

    /// The set of self's unique prefixes that also appear in `other`. This
    /// measures how much of a spike is corroborated, as opposed to the
    /// pass/fail test above.
    pub fn prefixes_duplicated_with(&self, other: &Spike) -> HashSet<Ipv4Addr> {
        self.prefixes
            .iter()
            .copied()
            .filter(|&p| other.contains_prefix(p))
            .collect()
    }
}
