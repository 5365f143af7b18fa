//! Core seams between the routing components.
//!
//! The sequencer only needs to read costs and adjacency, and cost matrices
//! can be filled by anything that knows travel times. Concrete apps can plug
//! in their own graph or matrix source behind these traits.

use crate::graph::CompleteCostGraph;

/// A weighted directed graph over `0..vertex_count()` vertex indices.
pub trait CostGraph {
    fn vertex_count(&self) -> usize;

    /// Cost of the arc `i -> j`, or `None` when either index is out of range.
    fn cost(&self, i: usize, j: usize) -> Option<f64>;

    /// Whether an arc `i -> j` exists. Never true for `i == j`.
    fn adjacent(&self, i: usize, j: usize) -> bool;
}

/// Fills the off-diagonal travel costs of a complete graph.
///
/// Pairs the provider cannot connect keep the infeasible sentinel.
pub trait CostMatrixProvider {
    fn fill_costs(&self, graph: &mut CompleteCostGraph);
}
