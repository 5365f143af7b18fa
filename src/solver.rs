//! Precedence-constrained sequencing (branch-and-bound).
//!
//! Finds a minimum-cost closed tour starting and ending at vertex 0 that
//! visits every other vertex once, never visiting a vertex before all of its
//! predecessors. The search is depth-first with best-cost pruning and stops
//! at a wall-clock deadline, returning the best tour found so far.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::graph::INFEASIBLE;
use crate::request::Precedences;
use crate::traits::CostGraph;

/// Lower bound on the cost of completing a partial tour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundStrategy {
    /// Always 0: prune on accumulated cost alone.
    #[default]
    Trivial,
    /// Cheapest way out of the current vertex and of every unvisited vertex.
    MinOutgoing,
}

/// Order in which the children of a search node are tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessorOrder {
    /// Vertex enumeration order.
    #[default]
    Sequential,
    /// Ascending arc cost from the current vertex, ties in vertex order.
    NearestFirst,
}

/// Budget and strategies for one solve.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Wall-clock budget for the search. Non-positive means no search.
    pub time_budget_ms: i64,
    pub bound: BoundStrategy,
    pub successor_order: SuccessorOrder,
    /// Seed the incumbent with a precedence-aware nearest-neighbour tour.
    pub warm_start: bool,
    /// Reject partial and complete tours whose cost exceeds this cap.
    pub max_duration: Option<f64>,
    /// Polled alongside the deadline; when set the search stops.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_budget_ms: 30_000,
            bound: BoundStrategy::Trivial,
            successor_order: SuccessorOrder::Sequential,
            warm_start: false,
            max_duration: None,
            cancel: None,
        }
    }
}

impl SolveOptions {
    /// Default strategies with the given wall-clock budget.
    pub fn with_budget(time_budget_ms: i64) -> Self {
        Self {
            time_budget_ms,
            ..Self::default()
        }
    }
}

/// Why a search stopped before exhausting the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Deadline,
    Cancelled,
}

/// What a search did before returning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search-tree nodes expanded.
    pub nodes_expanded: u64,
    /// True when the whole tree was explored (the cost is optimal).
    pub exhaustive: bool,
    pub stopped: Option<StopReason>,
    pub elapsed: Duration,
}

/// Best visiting order found by one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    order: Vec<usize>,
    cost: Option<f64>,
    stats: SearchStats,
}

impl Solution {
    fn unsolved(stats: SearchStats) -> Self {
        Self {
            order: Vec::new(),
            cost: None,
            stats,
        }
    }

    /// The `i`-th vertex of the tour, `None` if unsolved or out of range.
    pub fn vertex_at(&self, i: usize) -> Option<usize> {
        self.order.get(i).copied()
    }

    /// Total cost of the tour, including the leg back to vertex 0.
    ///
    /// `None` when no feasible tour was found within budget.
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Whether a feasible tour was found.
    pub fn is_solved(&self) -> bool {
        self.cost.is_some()
    }

    /// Visiting order, starting with vertex 0. Empty if unsolved.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Returns the statistics of the search that produced this solution.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }
}

/// Solves with default strategies and the given budget.
pub fn solve<G: CostGraph>(
    graph: &G,
    precedences: &Precedences,
    service_times: &[f64],
    time_budget_ms: i64,
) -> Solution {
    PrecedenceSequencer::new(SolveOptions::with_budget(time_budget_ms)).solve(
        graph,
        precedences,
        service_times,
    )
}

/// Branch-and-bound sequencer over a [`CostGraph`].
#[derive(Debug, Clone, Default)]
pub struct PrecedenceSequencer {
    options: SolveOptions,
}

impl PrecedenceSequencer {
    /// Creates a sequencer with the given options.
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    /// Returns the options every solve runs with.
    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Searches for the cheapest precedence-respecting tour of `graph`.
    ///
    /// `service_times[v]` is added whenever `v` is entered; missing entries
    /// count as zero. Never fails: an infeasible instance, or a budget that
    /// runs out before the first complete tour, yields an unsolved solution.
    pub fn solve<G: CostGraph>(
        &self,
        graph: &G,
        precedences: &Precedences,
        service_times: &[f64],
    ) -> Solution {
        let n = graph.vertex_count();
        if self.options.time_budget_ms <= 0 || n == 0 {
            return Solution::unsolved(SearchStats::default());
        }

        let started = Instant::now();
        if n == 1 {
            return Solution {
                order: vec![0],
                cost: Some(0.0),
                stats: SearchStats {
                    nodes_expanded: 1,
                    exhaustive: true,
                    stopped: None,
                    elapsed: started.elapsed(),
                },
            };
        }

        let mut search = Search {
            graph,
            precedences,
            service_times,
            options: &self.options,
            started,
            budget: Duration::from_millis(self.options.time_budget_ms.unsigned_abs()),
            visited: vec![false; n],
            path: Vec::with_capacity(n),
            best_order: Vec::new(),
            best_cost: f64::INFINITY,
            nodes_expanded: 0,
            stopped: None,
        };

        search.visited[0] = true;
        search.path.push(0);
        if self.options.warm_start {
            search.nearest_neighbour();
        }
        search.branch(0, 0.0);

        let stats = SearchStats {
            nodes_expanded: search.nodes_expanded,
            exhaustive: search.stopped.is_none(),
            stopped: search.stopped,
            elapsed: started.elapsed(),
        };

        if let Some(reason) = search.stopped {
            warn!(
                ?reason,
                nodes = stats.nodes_expanded,
                solved = search.best_cost.is_finite(),
                "sequencing search stopped before exhausting the tree"
            );
        }
        debug!(
            vertices = n,
            nodes = stats.nodes_expanded,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "sequencing search finished"
        );

        if search.best_cost.is_finite() {
            Solution {
                order: search.best_order,
                cost: Some(search.best_cost),
                stats,
            }
        } else {
            Solution::unsolved(stats)
        }
    }
}

struct Search<'a, G> {
    graph: &'a G,
    precedences: &'a Precedences,
    service_times: &'a [f64],
    options: &'a SolveOptions,
    started: Instant,
    budget: Duration,
    visited: Vec<bool>,
    path: Vec<usize>,
    best_order: Vec<usize>,
    best_cost: f64,
    nodes_expanded: u64,
    stopped: Option<StopReason>,
}

impl<G: CostGraph> Search<'_, G> {
    fn vertex_count(&self) -> usize {
        self.visited.len()
    }

    /// Finite cost of an existing arc, `None` for missing or infeasible arcs.
    fn arc_cost(&self, from: usize, to: usize) -> Option<f64> {
        if !self.graph.adjacent(from, to) {
            return None;
        }
        self.graph.cost(from, to).filter(|cost| *cost < INFEASIBLE)
    }

    fn service_time(&self, vertex: usize) -> f64 {
        self.service_times.get(vertex).copied().unwrap_or(0.0)
    }

    fn within_cap(&self, cost: f64) -> bool {
        self.options.max_duration.is_none_or(|cap| cost <= cap)
    }

    /// Deadline and cancellation check, latched once tripped.
    fn should_stop(&mut self) -> bool {
        if self.stopped.is_some() {
            return true;
        }
        let cancelled = self
            .options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        if cancelled {
            self.stopped = Some(StopReason::Cancelled);
        } else if self.started.elapsed() > self.budget {
            self.stopped = Some(StopReason::Deadline);
        }
        self.stopped.is_some()
    }

    /// Unvisited vertices that may follow `current`, with their entry cost
    /// (arc plus service time).
    fn successors(&self, current: usize) -> Vec<(usize, f64)> {
        let mut candidates: Vec<(usize, f64)> = (1..self.vertex_count())
            .filter(|&vertex| !self.visited[vertex])
            .filter(|&vertex| self.precedences.is_ready(vertex, &self.visited))
            .filter_map(|vertex| {
                self.arc_cost(current, vertex)
                    .map(|arc| (vertex, arc + self.service_time(vertex)))
            })
            .collect();
        if self.options.successor_order == SuccessorOrder::NearestFirst {
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        }
        candidates
    }

    fn lower_bound(&self, current: usize) -> f64 {
        match self.options.bound {
            BoundStrategy::Trivial => 0.0,
            BoundStrategy::MinOutgoing => self.min_outgoing_bound(current),
        }
    }

    /// Every unvisited vertex, and the current one, must still be left once,
    /// towards an unvisited vertex or the depot.
    fn min_outgoing_bound(&self, current: usize) -> f64 {
        let n = self.vertex_count();
        let open: Vec<usize> = (1..n).filter(|&vertex| !self.visited[vertex]).collect();
        let mut bound = 0.0;
        for &from in std::iter::once(&current).chain(open.iter()) {
            let cheapest = open
                .iter()
                .filter(|&&to| to != from)
                .filter_map(|&to| {
                    self.arc_cost(from, to)
                        .map(|arc| arc + self.service_time(to))
                })
                .chain(self.arc_cost(from, 0))
                .min_by(f64::total_cmp);
            match cheapest {
                Some(cost) => bound += cost,
                None => return f64::INFINITY,
            }
        }
        bound
    }

    fn record(&mut self, cost: f64) {
        self.best_cost = cost;
        self.best_order.clone_from(&self.path);
    }

    fn branch(&mut self, current: usize, accumulated: f64) {
        if self.should_stop() {
            return;
        }
        self.nodes_expanded += 1;

        if self.path.len() == self.vertex_count() {
            if let Some(back) = self.arc_cost(current, 0) {
                let total = accumulated + back;
                if total < self.best_cost && self.within_cap(total) {
                    self.record(total);
                }
            }
            return;
        }

        if accumulated + self.lower_bound(current) >= self.best_cost {
            return;
        }

        for (next, entry) in self.successors(current) {
            let cost = accumulated + entry;
            if !self.within_cap(cost) {
                continue;
            }
            self.visited[next] = true;
            self.path.push(next);
            self.branch(next, cost);
            self.path.pop();
            self.visited[next] = false;
            if self.stopped.is_some() {
                return;
            }
        }
    }

    /// Greedy tour used as the initial incumbent.
    fn nearest_neighbour(&mut self) {
        let n = self.vertex_count();
        let mut visited = self.visited.clone();
        let mut route = self.path.clone();
        let mut current = 0;
        let mut total = 0.0;

        while route.len() < n {
            let nearest = (1..n)
                .filter(|&vertex| !visited[vertex])
                .filter(|&vertex| self.precedences.is_ready(vertex, &visited))
                .filter_map(|vertex| {
                    self.arc_cost(current, vertex)
                        .map(|arc| (vertex, arc + self.service_time(vertex)))
                })
                .filter(|&(_, entry)| self.within_cap(total + entry))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((vertex, entry)) = nearest else {
                return;
            };
            visited[vertex] = true;
            route.push(vertex);
            total += entry;
            current = vertex;
        }

        let Some(back) = self.arc_cost(current, 0) else {
            return;
        };
        total += back;
        if self.within_cap(total) {
            debug!(cost = total, "nearest-neighbour incumbent");
            self.best_cost = total;
            self.best_order = route;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CompleteCostGraph;

    fn square() -> CompleteCostGraph {
        CompleteCostGraph::from_rows(
            vec![1, 2, 3, 4],
            &[
                vec![0.0, 1.0, 5.0, 1.0],
                vec![1.0, 0.0, 1.0, 5.0],
                vec![5.0, 1.0, 0.0, 1.0],
                vec![1.0, 5.0, 1.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_zero_budget_is_noop() {
        let solution = solve(&square(), &Precedences::new(), &[], 0);
        assert!(!solution.is_solved());
        assert_eq!(solution.cost(), None);
        assert_eq!(solution.vertex_at(0), None);
        assert_eq!(solution.stats().nodes_expanded, 0);
    }

    #[test]
    fn test_finds_perimeter_tour() {
        let solution = solve(&square(), &Precedences::new(), &[], 1_000);
        assert_eq!(solution.cost(), Some(4.0));
        assert_eq!(solution.order(), &[0, 1, 2, 3]);
        assert!(solution.stats().exhaustive);
    }

    #[test]
    fn test_precedence_forces_detour() {
        let mut precedences = Precedences::new();
        // 1 may only follow 3
        precedences.require(1, 3);
        let solution = solve(&square(), &precedences, &[], 1_000);
        let order = solution.order();
        let pos = |v: usize| order.iter().position(|&x| x == v).unwrap();
        assert!(pos(3) < pos(1));
        assert_eq!(solution.cost(), Some(4.0)); // 0-3-2-1-0
    }

    #[test]
    fn test_single_vertex() {
        let graph = CompleteCostGraph::new([42]);
        let solution = solve(&graph, &Precedences::new(), &[], 100);
        assert_eq!(solution.order(), &[0]);
        assert_eq!(solution.cost(), Some(0.0));
    }

    #[test]
    fn test_min_outgoing_bound_is_admissible_at_root() {
        let graph = square();
        let precedences = Precedences::new();
        let options = SolveOptions {
            bound: BoundStrategy::MinOutgoing,
            ..SolveOptions::default()
        };
        let mut visited = vec![false; 4];
        visited[0] = true;
        let search = Search {
            graph: &graph,
            precedences: &precedences,
            service_times: &[],
            options: &options,
            started: Instant::now(),
            budget: Duration::from_secs(1),
            visited,
            path: vec![0],
            best_order: Vec::new(),
            best_cost: f64::INFINITY,
            nodes_expanded: 0,
            stopped: None,
        };
        assert!(search.lower_bound(0) <= 4.0);
        assert_eq!(search.lower_bound(0), 4.0);
    }

    #[test]
    fn test_nearest_first_orders_by_entry_cost() {
        let graph = square();
        let precedences = Precedences::new();
        let options = SolveOptions {
            successor_order: SuccessorOrder::NearestFirst,
            ..SolveOptions::default()
        };
        let mut visited = vec![false; 4];
        visited[0] = true;
        let search = Search {
            graph: &graph,
            precedences: &precedences,
            service_times: &[0.0, 0.0, 0.0, 0.0],
            options: &options,
            started: Instant::now(),
            budget: Duration::from_secs(1),
            visited,
            path: vec![0],
            best_order: Vec::new(),
            best_cost: f64::INFINITY,
            nodes_expanded: 0,
            stopped: None,
        };
        let order: Vec<usize> = search.successors(0).into_iter().map(|(v, _)| v).collect();
        assert_eq!(order, vec![1, 3, 2]);
    }
}
