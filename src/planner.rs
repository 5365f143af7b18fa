//! End-to-end tour planning for couriers.
//!
//! [`recompute_tour`] is the single-shot entry point. [`TourPlanner`] keeps
//! the courier assignments, ordering edits and computed tours for one road
//! network, and recomputes couriers independently of each other.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use chrono::{Local, NaiveDateTime};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::network::{IntersectionId, RoadNetwork};
use crate::request::{
    PickupDeliveryRequest, Precedences, RequestId, StopKind, StopOrder, StopRef,
    build_points_of_interest, service_times,
};
use crate::shortest_path::ShortestPathEngine;
use crate::solver::PrecedenceSequencer;
use crate::tour::{CourierId, Tour, TourAssembler};

/// Everything one recomputation reads, owned so that later edits to the
/// store cannot shift vertex indices mid-search.
#[derive(Debug, Clone)]
pub struct TourInput {
    pub courier_id: CourierId,
    pub warehouse_id: IntersectionId,
    pub requests: Vec<PickupDeliveryRequest>,
    pub stop_orders: Vec<StopOrder>,
    pub start_time: NaiveDateTime,
}

/// Plans one courier's tour starting now with default settings and the given
/// search budget.
pub fn recompute_tour(
    courier_id: CourierId,
    requests: &[PickupDeliveryRequest],
    warehouse_id: IntersectionId,
    network: &RoadNetwork,
    time_budget_ms: i64,
) -> Result<Tour, PlanError> {
    let config = PlannerConfig {
        time_budget_ms,
        ..PlannerConfig::default()
    };
    let input = TourInput {
        courier_id,
        warehouse_id,
        requests: requests.to_vec(),
        stop_orders: Vec::new(),
        start_time: Local::now().naive_local(),
    };
    plan_tour(network, &input, &config, None)
}

/// Shortest paths, precedences, sequencing and assembly for one courier.
pub fn plan_tour(
    network: &RoadNetwork,
    input: &TourInput,
    config: &PlannerConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<Tour, PlanError> {
    let courier_id = input.courier_id;
    if input.requests.is_empty() {
        return Err(PlanError::NoAssignedRequests { courier_id });
    }

    let points = build_points_of_interest(input.warehouse_id, &input.requests);
    if let Some(&id) = points.iter().find(|&&id| !network.contains(id)) {
        return Err(PlanError::UnknownIntersection { id });
    }

    let engine = ShortestPathEngine::new(network, config.speed());
    let paths = engine.compute(&points);
    let graph = &paths.graph;

    let mut precedences = Precedences::for_requests(graph, &input.requests);
    for order in &input.stop_orders {
        let locate = |stop: &StopRef| {
            stop.locate(&input.requests)
                .and_then(|intersection| graph.index_of(intersection))
                .ok_or(PlanError::UnknownRequest {
                    courier_id,
                    request_id: stop.request_id,
                })
        };
        let before = locate(&order.before)?;
        let after = locate(&order.after)?;
        if conflicts_with_warehouse(order, before, after) {
            return Err(PlanError::WarehouseStopOrder {
                courier_id,
                order: *order,
            });
        }
        // orders within one location are applied by the assembler
        if before != after {
            precedences.require(after, before);
        }
    }

    let assembler = TourAssembler::new(graph, &input.requests, input.warehouse_id)
        .with_paths(&paths.trees)
        .with_stop_orders(&input.stop_orders);
    if let Some(intersection) = assembler.conflicting_location() {
        return Err(PlanError::CyclicStopOrders {
            courier_id,
            intersection,
        });
    }
    let service = service_times(graph, &input.requests);

    debug!(
        courier_id,
        vertices = points.len(),
        constrained = precedences.len(),
        "sequencing courier stops"
    );
    let sequencer = PrecedenceSequencer::new(config.solve_options(cancel));
    let solution = sequencer.solve(graph, &precedences, &service);

    let tour = assembler
        .assemble(courier_id, input.start_time, &solution)
        .ok_or(PlanError::NoFeasibleSequence {
            courier_id,
            time_budget_ms: config.time_budget_ms,
        })?;

    info!(
        courier_id,
        stops = tour.stops.len(),
        cost = tour.total_distance,
        optimal = solution.stats().exhaustive,
        "tour recomputed"
    );
    Ok(tour)
}

/// Whether `order` asks for something warehouse service rules out.
///
/// Warehouse pickups (vertex 0) are served before the courier leaves, so
/// nothing else can precede them; warehouse deliveries are served after the
/// return, so nothing else can follow them.
fn conflicts_with_warehouse(order: &StopOrder, before: usize, after: usize) -> bool {
    let departing = |stop: &StopRef, vertex: usize| vertex == 0 && stop.kind == StopKind::Pickup;
    let returning = |stop: &StopRef, vertex: usize| vertex == 0 && stop.kind == StopKind::Delivery;
    (departing(&order.after, after) && !departing(&order.before, before))
        || (returning(&order.before, before) && !returning(&order.after, after))
}

/// Courier assignments and computed tours over one road network.
#[derive(Debug, Clone)]
pub struct TourPlanner {
    network: RoadNetwork,
    warehouse_id: IntersectionId,
    config: PlannerConfig,
    assignments: BTreeMap<CourierId, Vec<PickupDeliveryRequest>>,
    stop_orders: BTreeMap<CourierId, Vec<StopOrder>>,
    tours: BTreeMap<CourierId, Tour>,
}

impl TourPlanner {
    /// Creates a planner with no couriers.
    pub fn new(network: RoadNetwork, warehouse_id: IntersectionId, config: PlannerConfig) -> Self {
        Self {
            network,
            warehouse_id,
            config,
            assignments: BTreeMap::new(),
            stop_orders: BTreeMap::new(),
            tours: BTreeMap::new(),
        }
    }

    /// Returns the road network tours are planned on.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Returns the planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Returns the warehouse every tour starts and ends at.
    pub fn warehouse_id(&self) -> IntersectionId {
        self.warehouse_id
    }

    /// Assigns `request` to `courier_id`. The courier's tour becomes stale.
    pub fn assign(&mut self, courier_id: CourierId, request: PickupDeliveryRequest) {
        self.assignments.entry(courier_id).or_default().push(request);
        self.tours.remove(&courier_id);
    }

    /// Removes a request from a courier, along with ordering edits that
    /// mention it.
    pub fn unassign(
        &mut self,
        courier_id: CourierId,
        request_id: RequestId,
    ) -> Option<PickupDeliveryRequest> {
        let requests = self.assignments.get_mut(&courier_id)?;
        let index = requests.iter().position(|request| request.id() == request_id)?;
        let removed = requests.remove(index);
        if requests.is_empty() {
            self.assignments.remove(&courier_id);
        }
        if let Some(orders) = self.stop_orders.get_mut(&courier_id) {
            orders.retain(|order| {
                order.before.request_id != request_id && order.after.request_id != request_id
            });
        }
        self.tours.remove(&courier_id);
        Some(removed)
    }

    /// Returns the requests assigned to a courier.
    pub fn requests_for(&self, courier_id: CourierId) -> &[PickupDeliveryRequest] {
        self.assignments
            .get(&courier_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the couriers with at least one request, in id order.
    pub fn couriers(&self) -> impl Iterator<Item = CourierId> + '_ {
        self.assignments.keys().copied()
    }

    /// Records that one stop must precede another on a courier's tour.
    ///
    /// Both requests must already be assigned to the courier.
    pub fn add_stop_order(&mut self, courier_id: CourierId, order: StopOrder) -> Result<(), PlanError> {
        if order.before == order.after {
            return Err(PlanError::InvalidStopOrder);
        }
        let requests = self.requests_for(courier_id);
        for stop in [order.before, order.after] {
            if stop.locate(requests).is_none() {
                return Err(PlanError::UnknownRequest {
                    courier_id,
                    request_id: stop.request_id,
                });
            }
        }
        self.stop_orders.entry(courier_id).or_default().push(order);
        self.tours.remove(&courier_id);
        Ok(())
    }

    /// Returns the stop orders recorded for a courier.
    pub fn stop_orders_for(&self, courier_id: CourierId) -> &[StopOrder] {
        self.stop_orders
            .get(&courier_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Drops every stop order of a courier.
    pub fn clear_stop_orders(&mut self, courier_id: CourierId) {
        if self.stop_orders.remove(&courier_id).is_some() {
            self.tours.remove(&courier_id);
        }
    }

    /// Returns the last tour computed for a courier, if still current.
    pub fn tour(&self, courier_id: CourierId) -> Option<&Tour> {
        self.tours.get(&courier_id)
    }

    /// Returns every current tour.
    pub fn tours(&self) -> &BTreeMap<CourierId, Tour> {
        &self.tours
    }

    fn snapshot(&self, courier_id: CourierId, start_time: NaiveDateTime) -> TourInput {
        TourInput {
            courier_id,
            warehouse_id: self.warehouse_id,
            requests: self.requests_for(courier_id).to_vec(),
            stop_orders: self.stop_orders_for(courier_id).to_vec(),
            start_time,
        }
    }

    /// Recomputes and stores one courier's tour.
    ///
    /// On failure the previous tour, if any, is dropped.
    pub fn recompute(
        &mut self,
        courier_id: CourierId,
        start_time: NaiveDateTime,
    ) -> Result<&Tour, PlanError> {
        let input = self.snapshot(courier_id, start_time);
        self.tours.remove(&courier_id);
        let tour = plan_tour(&self.network, &input, &self.config, None)?;
        Ok(self.tours.entry(courier_id).or_insert(tour))
    }

    /// Recomputes every courier in parallel.
    ///
    /// Each courier works on its own snapshot; successes replace the stored
    /// tours and failures are returned per courier. `cancel` stops every
    /// search still running.
    pub fn recompute_all(
        &mut self,
        start_time: NaiveDateTime,
        cancel: Option<Arc<AtomicBool>>,
    ) -> BTreeMap<CourierId, PlanError> {
        let inputs: Vec<TourInput> = self
            .couriers()
            .map(|courier_id| self.snapshot(courier_id, start_time))
            .collect();

        let network = &self.network;
        let config = &self.config;
        let results: Vec<(CourierId, Result<Tour, PlanError>)> = inputs
            .par_iter()
            .map(|input| {
                (
                    input.courier_id,
                    plan_tour(network, input, config, cancel.clone()),
                )
            })
            .collect();

        let mut failures = BTreeMap::new();
        for (courier_id, result) in results {
            match result {
                Ok(tour) => {
                    self.tours.insert(courier_id, tour);
                }
                Err(err) => {
                    self.tours.remove(&courier_id);
                    failures.insert(courier_id, err);
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Intersection, RoadSegment};

    fn ring() -> RoadNetwork {
        let mut network = RoadNetwork::new();
        for id in 1..=4 {
            network.add_intersection(Intersection::new(id, 45.0 + id as f64 * 0.01, 4.8));
        }
        for (from, to) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
            network.add_road_segment(from, RoadSegment::new(format!("{from}-{to}"), 250.0, from, to));
            network.add_road_segment(to, RoadSegment::new(format!("{to}-{from}"), 250.0, to, from));
        }
        network
    }

    #[test]
    fn test_empty_request_list_is_distinct_error() {
        let err = recompute_tour(3, &[], 1, &ring(), 1_000).unwrap_err();
        assert_eq!(err, PlanError::NoAssignedRequests { courier_id: 3 });
    }

    #[test]
    fn test_unknown_intersection_reported() {
        let requests = [PickupDeliveryRequest::new(1, 2, 1.0, 99, 1.0)];
        let err = recompute_tour(3, &requests, 1, &ring(), 1_000).unwrap_err();
        assert_eq!(err, PlanError::UnknownIntersection { id: 99 });
    }

    #[test]
    fn test_single_request_tour() {
        let requests = [PickupDeliveryRequest::new(10, 2, 2.0, 3, 4.0)];
        let tour = recompute_tour(3, &requests, 1, &ring(), 1_000).unwrap();
        assert_eq!(tour.stops.len(), 2);
        assert_eq!(tour.stops[0].request_id, Some(10));
        // 1-2-3-4-1 around the ring, 1 km at 15 km/h
        assert!((tour.route_length_m() - 1_000.0).abs() < 1e-9);
        assert!((tour.total_duration - (4.0 + 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_stop_order_requires_assigned_requests() {
        let mut planner = TourPlanner::new(ring(), 1, PlannerConfig::default());
        planner.assign(5, PickupDeliveryRequest::new(1, 2, 1.0, 3, 1.0));
        let order = StopOrder {
            before: StopRef::pickup(1),
            after: StopRef::pickup(2),
        };
        assert_eq!(
            planner.add_stop_order(5, order),
            Err(PlanError::UnknownRequest {
                courier_id: 5,
                request_id: 2
            })
        );
        let same = StopOrder {
            before: StopRef::pickup(1),
            after: StopRef::pickup(1),
        };
        assert_eq!(planner.add_stop_order(5, same), Err(PlanError::InvalidStopOrder));
    }

    #[test]
    fn test_unassign_drops_related_orders() {
        let mut planner = TourPlanner::new(ring(), 1, PlannerConfig::default());
        planner.assign(5, PickupDeliveryRequest::new(1, 2, 1.0, 3, 1.0));
        planner.assign(5, PickupDeliveryRequest::new(2, 4, 1.0, 3, 1.0));
        let order = StopOrder {
            before: StopRef::delivery(1),
            after: StopRef::pickup(2),
        };
        planner.add_stop_order(5, order).unwrap();
        assert!(planner.unassign(5, 2).is_some());
        assert!(planner.stop_orders_for(5).is_empty());
        assert_eq!(planner.requests_for(5).len(), 1);
        assert!(planner.unassign(5, 2).is_none());
    }
}
