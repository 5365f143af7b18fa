//! Shortest travel times between points of interest.
//!
//! Runs one single-source Dijkstra per point of interest over the road
//! network and projects the settled durations onto a [`CompleteCostGraph`].
//! Each run also keeps its shortest-path tree so the road segments between
//! consecutive stops can be recovered afterwards.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::duration::TravelSpeed;
use crate::graph::CompleteCostGraph;
use crate::network::{IntersectionId, RoadNetwork, RoadSegment};
use crate::traits::{CostGraph, CostMatrixProvider};

/// Heap entry ordered so that `BinaryHeap` pops the smallest duration first.
#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    duration: f64,
    vertex: IntersectionId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .duration
            .total_cmp(&self.duration)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

#[derive(Debug, Clone)]
struct Settled {
    duration: f64,
    /// Intersection the segment was taken from, and the segment itself.
    via: Option<(IntersectionId, RoadSegment)>,
}

/// Settled durations and predecessor segments of one Dijkstra run.
#[derive(Debug, Clone)]
pub struct PathTree {
    source: IntersectionId,
    settled: HashMap<IntersectionId, Settled>,
}

impl PathTree {
    /// Returns the intersection the run started from.
    pub fn source(&self) -> IntersectionId {
        self.source
    }

    /// Shortest travel time in minutes to `target`, if it was reached.
    pub fn duration_to(&self, target: IntersectionId) -> Option<f64> {
        self.settled.get(&target).map(|settled| settled.duration)
    }

    /// Road segments of the shortest path to `target`, in travel order.
    ///
    /// Follows the intersections settled by the run, not the segments' own
    /// source fields, so it always terminates at the source.
    ///
    /// Empty when `target` is the source, `None` when it was not reached.
    pub fn path_to(&self, target: IntersectionId) -> Option<Vec<RoadSegment>> {
        let mut segments = Vec::new();
        let mut current = target;
        loop {
            let settled = self.settled.get(&current)?;
            match &settled.via {
                Some((predecessor, segment)) => {
                    current = *predecessor;
                    segments.push(segment.clone());
                }
                None => break,
            }
        }
        segments.reverse();
        Some(segments)
    }

    /// Number of intersections reached from the source.
    pub fn reached_count(&self) -> usize {
        self.settled.len()
    }
}

/// Cost graph plus one path tree per vertex, indexed like the graph.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    pub graph: CompleteCostGraph,
    pub trees: Vec<PathTree>,
}

/// Dijkstra over a read-only road network.
#[derive(Debug, Clone, Copy)]
pub struct ShortestPathEngine<'a> {
    network: &'a RoadNetwork,
    speed: TravelSpeed,
}

impl<'a> ShortestPathEngine<'a> {
    /// Creates an engine over `network` at the given travel speed.
    pub fn new(network: &'a RoadNetwork, speed: TravelSpeed) -> Self {
        Self { network, speed }
    }

    /// Single-source shortest travel times from `source` to every reachable
    /// intersection.
    pub fn tree_from(&self, source: IntersectionId) -> PathTree {
        let mut settled: HashMap<IntersectionId, Settled> = HashMap::new();
        let mut tentative: HashMap<IntersectionId, (f64, Option<(IntersectionId, RoadSegment)>)> = HashMap::new();
        let mut queue = BinaryHeap::new();

        tentative.insert(source, (0.0, None));
        queue.push(QueueEntry {
            duration: 0.0,
            vertex: source,
        });

        while let Some(QueueEntry { duration, vertex }) = queue.pop() {
            if settled.contains_key(&vertex) {
                continue;
            }
            let via = tentative.remove(&vertex).and_then(|(_, via)| via);
            settled.insert(vertex, Settled { duration, via });

            for segment in self.network.segments_from(vertex) {
                let next = segment.destination();
                if settled.contains_key(&next) {
                    continue;
                }
                let candidate = duration + self.speed.segment_duration(segment);
                let improves = tentative
                    .get(&next)
                    .is_none_or(|(known, _)| candidate < *known);
                if improves {
                    tentative.insert(next, (candidate, Some((vertex, segment.clone()))));
                    queue.push(QueueEntry {
                        duration: candidate,
                        vertex: next,
                    });
                }
            }
        }

        PathTree { source, settled }
    }

    /// Fills every off-diagonal cost of `graph` and returns the path tree
    /// rooted at each vertex.
    ///
    /// Only the graph's own vertices are read back from each run; pairs that
    /// were never reached keep the infeasible sentinel.
    pub fn fill(&self, graph: &mut CompleteCostGraph) -> Vec<PathTree> {
        let n = graph.vertex_count();
        let mut trees = Vec::with_capacity(n);
        if n <= 1 {
            if let Some(id) = graph.vertex_id(0) {
                trees.push(PathTree {
                    source: id,
                    settled: HashMap::from([(id, Settled { duration: 0.0, via: None })]),
                });
            }
            return trees;
        }

        let vertices = graph.vertices().to_vec();
        for (i, &source) in vertices.iter().enumerate() {
            let tree = self.tree_from(source);
            for (j, &target) in vertices.iter().enumerate() {
                if i == j {
                    continue;
                }
                if let Some(duration) = tree.duration_to(target) {
                    graph.set_cost(i, j, duration);
                }
            }
            debug!(source, reached = tree.reached_count(), "dijkstra run finished");
            trees.push(tree);
        }
        trees
    }

    /// Builds the cost graph over `points` and fills it.
    pub fn compute(&self, points: &[IntersectionId]) -> ShortestPaths {
        let mut graph = CompleteCostGraph::new(points.iter().copied());
        let trees = self.fill(&mut graph);
        ShortestPaths { graph, trees }
    }
}

impl CostMatrixProvider for ShortestPathEngine<'_> {
    fn fill_costs(&self, graph: &mut CompleteCostGraph) {
        self.fill(graph);
    }
}
