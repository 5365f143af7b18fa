//! Dense cost graph over a courier's points of interest.

use std::collections::HashSet;

use crate::network::IntersectionId;
use crate::traits::CostGraph;

/// Cost of a pair with no known path. Larger than any real cost.
pub const INFEASIBLE: f64 = f64::MAX;

/// Complete directed graph over distinct intersection ids.
///
/// Vertex `i` stands for the `i`-th distinct id in first-seen order. Costs
/// start at [`INFEASIBLE`] off the diagonal and 0 on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteCostGraph {
    vertices: Vec<IntersectionId>,
    costs: Vec<f64>,
}

impl CompleteCostGraph {
    /// Builds a graph over `ids`, dropping duplicates.
    pub fn new(ids: impl IntoIterator<Item = IntersectionId>) -> Self {
        let mut seen = HashSet::new();
        let vertices: Vec<IntersectionId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        let n = vertices.len();
        let mut costs = vec![INFEASIBLE; n * n];
        for i in 0..n {
            costs[i * n + i] = 0.0;
        }
        Self { vertices, costs }
    }

    /// Builds a graph from explicit cost rows.
    ///
    /// Returns `None` if the ids are not distinct or the rows are not a
    /// square matrix matching them. Diagonal entries are forced to 0.
    pub fn from_rows(vertices: Vec<IntersectionId>, rows: &[Vec<f64>]) -> Option<Self> {
        let mut graph = Self::new(vertices.iter().copied());
        if graph.vertex_count() != vertices.len() || rows.len() != vertices.len() {
            return None;
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != vertices.len() {
                return None;
            }
            for (j, &cost) in row.iter().enumerate() {
                graph.set_cost(i, j, cost);
            }
        }
        Some(graph)
    }

    /// Intersection id of vertex `i`.
    pub fn vertex_id(&self, i: usize) -> Option<IntersectionId> {
        self.vertices.get(i).copied()
    }

    /// Index of the vertex standing for `id`.
    pub fn index_of(&self, id: IntersectionId) -> Option<usize> {
        self.vertices.iter().position(|&vertex| vertex == id)
    }

    /// Returns the intersection ids, indexed like the vertices.
    pub fn vertices(&self) -> &[IntersectionId] {
        &self.vertices
    }

    /// Sets the cost of `i -> j`.
    ///
    /// Diagonal and out-of-range writes are ignored and return false.
    pub fn set_cost(&mut self, i: usize, j: usize, cost: f64) -> bool {
        let n = self.vertices.len();
        if i >= n || j >= n || i == j {
            return false;
        }
        self.costs[i * n + j] = cost;
        true
    }

    /// Whether a real path is known from `i` to `j`.
    pub fn is_reachable(&self, i: usize, j: usize) -> bool {
        self.cost(i, j).is_some_and(|cost| cost < INFEASIBLE)
    }
}

impl CostGraph for CompleteCostGraph {
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn cost(&self, i: usize, j: usize) -> Option<f64> {
        let n = self.vertices.len();
        if i >= n || j >= n {
            return None;
        }
        Some(self.costs[i * n + j])
    }

    fn adjacent(&self, i: usize, j: usize) -> bool {
        let n = self.vertices.len();
        i < n && j < n && i != j
    }
}
