//! AS-level topology graph and shortest-path distance oracle.
//!
//! The graph is an undirected simple graph over AS numbers. Several
//! independently collected topology sources can be merged by intersection,
//! keeping only links corroborated by every source. Hop distances are
//! resolved by a memoizing BFS oracle; every worker builds its own oracle
//! over the shared graph so no locking is needed around the memo.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Autonomous System number. Valid values are 1..=65535; the loaders reject
/// anything outside that range before it reaches the graph.
pub type AsNumber = u32;

/// Hop distance sentinel for unreachable AS pairs.
pub const UNREACHABLE: u8 = 127;

/// Undirected simple graph of AS adjacencies.
///
/// Adjacency is kept in ordered maps so vertex iteration order is
/// deterministic, which keeps sharding and component selection reproducible
/// across runs.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    adjacency: BTreeMap<AsNumber, BTreeSet<AsNumber>>,
    edge_count: usize,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex without any edges. No-op if already present.
    pub fn add_vertex(&mut self, as_number: AsNumber) {
        self.adjacency.entry(as_number).or_default();
    }

    /// Add an undirected edge. Returns false for self-loops and edges that
    /// are already present.
    pub fn add_edge(&mut self, a: AsNumber, b: AsNumber) -> bool {
        if a == b {
            return false;
        }
        let inserted = self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        if inserted {
            self.edge_count += 1;
        }
        inserted
    }

    pub fn contains_vertex(&self, as_number: AsNumber) -> bool {
        self.adjacency.contains_key(&as_number)
    }

    pub fn contains_edge(&self, a: AsNumber, b: AsNumber) -> bool {
        self.adjacency
            .get(&a)
            .map(|n| n.contains(&b))
            .unwrap_or(false)
    }

    /// Neighbor set of an AS, or None if the AS is not in the graph.
    pub fn neighbors(&self, as_number: AsNumber) -> Option<&BTreeSet<AsNumber>> {
        self.adjacency.get(&as_number)
    }

    pub fn vertices(&self) -> impl Iterator<Item = AsNumber> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Intersection merge with another topology source: the result contains
    /// only edges present in both graphs, and only the endpoints of those
    /// edges. Each source is trusted only where another source confirms it.
    pub fn intersect_with(&self, other: &TopologyGraph) -> TopologyGraph {
        let mut merged = TopologyGraph::new();
        for (&a, neighbors) in &self.adjacency {
            for &b in neighbors.iter().filter(|&&b| b > a) {
                if other.contains_edge(a, b) {
                    merged.add_edge(a, b);
                }
            }
        }
        merged
    }

    /// Number of vertices reachable from `start`, including `start` itself.
    /// Zero if `start` is not in the graph.
    pub fn reachable_count(&self, start: AsNumber) -> usize {
        if !self.contains_vertex(start) {
            return 0;
        }
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::new();
        found.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if let Some(neighbors) = self.neighbors(current) {
                for &n in neighbors {
                    if found.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        found.len()
    }

    /// The connected component containing `start` as an induced subgraph.
    /// Cross-edges between vertices already visited are kept.
    pub fn connected_component(&self, start: AsNumber) -> TopologyGraph {
        let mut component = TopologyGraph::new();
        if !self.contains_vertex(start) {
            return component;
        }
        component.add_vertex(start);
        let mut queue = VecDeque::new();
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if let Some(neighbors) = self.neighbors(current) {
                for &n in neighbors {
                    if !component.contains_vertex(n) {
                        component.add_vertex(n);
                        component.add_edge(current, n);
                        queue.push_back(n);
                    } else {
                        component.add_edge(current, n);
                    }
                }
            }
        }
        component
    }
}

/// Memoizing BFS shortest-path oracle over a [`TopologyGraph`].
///
/// A query from `a` caches every distance discovered from `a`, so repeated
/// queries with the same source are answered from the memo. The memo is
/// private to the oracle; concurrent workers each construct their own oracle
/// over the shared graph.
#[derive(Debug)]
pub struct DistanceOracle<'a> {
    graph: &'a TopologyGraph,
    cache: HashMap<AsNumber, HashMap<AsNumber, u8>>,
}

impl<'a> DistanceOracle<'a> {
    pub fn new(graph: &'a TopologyGraph) -> Self {
        Self {
            graph,
            cache: HashMap::new(),
        }
    }

    /// Hop distance between two ASes, or [`UNREACHABLE`] if no path exists.
    /// An AS absent from the graph simply has no neighbors; it is never an
    /// error.
    pub fn distance(&mut self, from: AsNumber, to: AsNumber) -> u8 {
        if let Some(d) = self.cache.get(&from).and_then(|known| known.get(&to)) {
            return *d;
        }
        if from == to {
            self.cache.entry(from).or_default().insert(to, 0);
            return 0;
        }

        // BFS with a local visited map; the cache may hold a partial view
        // from an earlier early-exited search and cannot seed the frontier.
        let mut discovered = HashMap::new();
        discovered.insert(from, 0u8);
        let mut queue = VecDeque::new();
        queue.push_back(from);
        let mut found = None;

        'search: while let Some(current) = queue.pop_front() {
            let base = discovered[&current];
            let next = if base >= UNREACHABLE {
                UNREACHABLE
            } else {
                base + 1
            };
            if let Some(neighbors) = self.graph.neighbors(current) {
                for &n in neighbors {
                    if !discovered.contains_key(&n) {
                        discovered.insert(n, next);
                        queue.push_back(n);
                        if n == to {
                            found = Some(next);
                            break 'search;
                        }
                    }
                }
            }
        }

        let known = self.cache.entry(from).or_default();
        known.extend(discovered);
        match found {
            Some(d) => d,
            None => {
                // BFS exhausted the component without reaching `to`.
                known.insert(to, UNREACHABLE);
                UNREACHABLE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph(ases: &[AsNumber]) -> TopologyGraph {
        let mut graph = TopologyGraph::new();
        for pair in ases.windows(2) {
            graph.add_edge(pair[0], pair[1]);
        }
        graph
    }

    #[test]
    fn test_add_edge_rejects_self_loops() {
        let mut graph = TopologyGraph::new();
        assert!(!graph.add_edge(7, 7));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut graph = TopologyGraph::new();
        assert!(graph.add_edge(1, 2));
        assert!(!graph.add_edge(2, 1));
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_edge(2, 1));
    }

    #[test]
    fn test_intersect_keeps_only_corroborated_edges() {
        let mut first = TopologyGraph::new();
        first.add_edge(1, 2);
        first.add_edge(2, 3);
        first.add_edge(3, 4);

        let mut second = TopologyGraph::new();
        second.add_edge(2, 3);
        second.add_edge(3, 4);
        second.add_edge(4, 5);

        let merged = first.intersect_with(&second);
        assert_eq!(merged.edge_count(), 2);
        assert!(merged.contains_edge(2, 3));
        assert!(merged.contains_edge(3, 4));
        assert!(!merged.contains_vertex(1));
        assert!(!merged.contains_vertex(5));
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let graph = line_graph(&[1, 2, 3]);
        let mut oracle = DistanceOracle::new(&graph);
        assert_eq!(oracle.distance(2, 2), 0);
        assert_eq!(oracle.distance(2, 2), 0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let graph = line_graph(&[10, 20, 30, 40]);
        let mut oracle = DistanceOracle::new(&graph);
        assert_eq!(oracle.distance(10, 40), 3);
        assert_eq!(oracle.distance(40, 10), 3);
        assert_eq!(oracle.distance(20, 40), oracle.distance(40, 20));
    }

    #[test]
    fn test_distance_unreachable_and_unknown_as() {
        let mut graph = line_graph(&[1, 2]);
        graph.add_edge(8, 9);
        let mut oracle = DistanceOracle::new(&graph);
        assert_eq!(oracle.distance(1, 9), UNREACHABLE);
        // AS 999 is not in the graph at all.
        assert_eq!(oracle.distance(1, 999), UNREACHABLE);
        assert_eq!(oracle.distance(999, 1), UNREACHABLE);
    }

    #[test]
    fn test_distance_memo_survives_early_exit() {
        let graph = line_graph(&[1, 2, 3, 4, 5]);
        let mut oracle = DistanceOracle::new(&graph);
        // The first query stops as soon as AS 3 is reached, but everything
        // discovered on the way stays cached.
        assert_eq!(oracle.distance(1, 3), 2);
        assert_eq!(oracle.distance(1, 2), 1);
        assert_eq!(oracle.distance(1, 5), 4);
    }

    #[test]
    fn test_connected_component_keeps_cross_edges() {
        let mut graph = TopologyGraph::new();
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        graph.add_edge(3, 1);
        graph.add_edge(9, 10);

        let component = graph.connected_component(1);
        assert_eq!(component.vertex_count(), 3);
        assert_eq!(component.edge_count(), 3);
        assert!(component.contains_edge(3, 1));
    }
}
