//! Selection of analyzable ASes by neighbor visibility.
//!
//! An AS is only worth analyzing if enough of its topological neighbors are
//! also monitored; otherwise a spike seen from it cannot be corroborated.
//! Two policies are supported: keep every monitored AS, or keep only ASes
//! whose monitored-neighbor fraction reaches a threshold.

use std::collections::HashMap;

use log::warn;

use super::graph::{AsNumber, TopologyGraph};

/// How the analyzable AS subset is derived from the monitored set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibilityMode {
    /// Every monitored AS is analyzed, regardless of neighbor coverage.
    AllMonitored,
    /// Keep an AS only if the fraction of its neighbors that are also
    /// monitored is at least this value.
    Threshold(f64),
}

/// The analyzable AS subset with its induced topology and per-AS visibility.
///
/// Visibilities for the whole monitored set are computed up front, so lookups
/// during classification are plain reads and the structure can be shared
/// across worker threads without locking.
#[derive(Debug, Clone)]
pub struct AnalyzedAses {
    graph: TopologyGraph,
    visibilities: HashMap<AsNumber, f64>,
}

impl AnalyzedAses {
    pub fn new(map: &TopologyGraph, monitored: &[AsNumber], mode: VisibilityMode) -> Self {
        let mut visibilities = HashMap::with_capacity(monitored.len());
        for &as_number in monitored {
            visibilities.insert(as_number, compute_visibility(map, monitored, as_number));
        }

        let mut graph = TopologyGraph::new();
        for &as_number in monitored {
            let retained = match mode {
                VisibilityMode::AllMonitored => true,
                VisibilityMode::Threshold(v) => visibilities[&as_number] >= v,
            };
            if retained {
                graph.add_vertex(as_number);
            }
        }

        // Connect retained ASes with the links the topology map knows about.
        let retained: Vec<AsNumber> = graph.vertices().collect();
        for &a in &retained {
            if let Some(neighbors) = map.neighbors(a) {
                for &b in neighbors {
                    if graph.contains_vertex(b) {
                        graph.add_edge(a, b);
                    }
                }
            }
        }

        Self {
            graph,
            visibilities,
        }
    }

    /// Fraction of this AS's neighbors that are also monitored. An AS the
    /// topology map does not know resolves to 0.0.
    pub fn visibility(&self, as_number: AsNumber) -> f64 {
        match self.visibilities.get(&as_number) {
            Some(v) => *v,
            None => {
                warn!("AS {as_number} was never monitored; visibility resolves to 0");
                0.0
            }
        }
    }

    pub fn contains(&self, as_number: AsNumber) -> bool {
        self.graph.contains_vertex(as_number)
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn as_numbers(&self) -> Vec<AsNumber> {
        self.graph.vertices().collect()
    }

    /// The largest connected component of the analyzable AS graph, as an
    /// induced subgraph. Ties go to the component found first in ascending
    /// vertex order.
    pub fn biggest_connected_component(&self) -> TopologyGraph {
        let mut best_root = None;
        let mut best_size = 0;
        for vertex in self.graph.vertices() {
            let size = self.graph.reachable_count(vertex);
            if size > best_size {
                best_size = size;
                best_root = Some(vertex);
            }
        }
        match best_root {
            Some(root) => self.graph.connected_component(root),
            None => TopologyGraph::new(),
        }
    }
}

fn compute_visibility(map: &TopologyGraph, monitored: &[AsNumber], as_number: AsNumber) -> f64 {
    let Some(neighbors) = map.neighbors(as_number) else {
        warn!("AS {as_number} not found in the topology map; marked as not visible");
        return 0.0;
    };
    if neighbors.is_empty() {
        return 0.0;
    }
    let monitored_neighbors = neighbors
        .iter()
        .filter(|n| monitored.contains(n))
        .count();
    monitored_neighbors as f64 / neighbors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> TopologyGraph {
        let mut map = TopologyGraph::new();
        // AS 1 has neighbors 2, 3, 4; AS 2 has neighbors 1, 3.
        map.add_edge(1, 2);
        map.add_edge(1, 3);
        map.add_edge(1, 4);
        map.add_edge(2, 3);
        map
    }

    #[test]
    fn test_visibility_fraction() {
        let map = sample_map();
        let ases = AnalyzedAses::new(&map, &[1, 2, 3], VisibilityMode::AllMonitored);
        // Two of AS 1's three neighbors are monitored.
        assert!((ases.visibility(1) - 2.0 / 3.0).abs() < 1e-9);
        assert!((ases.visibility(2) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_as_has_zero_visibility() {
        let map = sample_map();
        let ases = AnalyzedAses::new(&map, &[1, 99], VisibilityMode::AllMonitored);
        assert_eq!(ases.visibility(99), 0.0);
        assert_eq!(ases.visibility(12345), 0.0);
    }

    #[test]
    fn test_threshold_filters_low_visibility_ases() {
        let map = sample_map();
        let ases = AnalyzedAses::new(&map, &[1, 2, 3], VisibilityMode::Threshold(0.9));
        // AS 1 sees only 2/3 of its neighbors monitored and is dropped.
        assert!(!ases.contains(1));
        assert!(ases.contains(2));
        assert!(ases.contains(3));
        // The retained ASes keep their topology link.
        assert!(ases.graph().contains_edge(2, 3));
    }

    #[test]
    fn test_all_monitored_keeps_everything() {
        let map = sample_map();
        let ases = AnalyzedAses::new(&map, &[1, 2, 3, 4], VisibilityMode::AllMonitored);
        assert_eq!(ases.graph().vertex_count(), 4);
    }

    #[test]
    fn test_biggest_connected_component() {
        let mut map = TopologyGraph::new();
        // Component of five.
        map.add_edge(1, 2);
        map.add_edge(2, 3);
        map.add_edge(3, 4);
        map.add_edge(4, 5);
        // Component of two.
        map.add_edge(10, 11);

        let ases = AnalyzedAses::new(&map, &[1, 2, 3, 4, 5, 10, 11], VisibilityMode::AllMonitored);
        let component = ases.biggest_connected_component();
        assert_eq!(component.vertex_count(), 5);
        assert!(component.contains_vertex(3));
        assert!(!component.contains_vertex(10));
    }
}
