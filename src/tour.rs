//! Timed tours built from a sequencing solution.
//!
//! Times are minute offsets from the tour's start; [`Tour::clock_time`]
//! turns an offset into wall-clock time.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::CompleteCostGraph;
use crate::network::{IntersectionId, RoadNetwork, RoadSegment};
use crate::polyline::Polyline;
use crate::request::{PickupDeliveryRequest, RequestId, StopKind, StopOrder, StopRef, order_stops};
use crate::shortest_path::PathTree;
use crate::solver::Solution;
use crate::traits::CostGraph;

/// Stable identifier of a courier.
pub type CourierId = u64;

/// A timed visit to one stop of the tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStop {
    pub kind: StopKind,
    /// Absent for the warehouse.
    pub request_id: Option<RequestId>,
    pub intersection_id: IntersectionId,
    /// Minutes after the tour start.
    pub arrival: f64,
    /// Minutes after the tour start.
    pub departure: f64,
}

impl TourStop {
    /// Returns the minutes spent serving this stop.
    pub fn service_duration(&self) -> f64 {
        self.departure - self.arrival
    }
}

/// A courier's timed round trip from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub courier_id: CourierId,
    pub warehouse_id: IntersectionId,
    pub start_time: NaiveDateTime,
    /// Service stops in visiting order; the warehouse is implied at both ends.
    pub stops: Vec<TourStop>,
    /// Road segments driven, in order, when paths were available.
    pub road_segments: Vec<RoadSegment>,
    /// Cost reported by the sequencer.
    pub total_distance: f64,
    /// Minutes from leaving the warehouse to returning to it.
    pub total_duration: f64,
}

impl Tour {
    /// Wall-clock time `offset` minutes after the start, `None` if it falls
    /// outside the representable range.
    pub fn clock_time(&self, offset: f64) -> Option<NaiveDateTime> {
        let millis = (offset * 60_000.0).round() as i64;
        self.start_time
            .checked_add_signed(ChronoDuration::try_milliseconds(millis)?)
    }

    /// Physical length of the road segments taken, in metres.
    pub fn route_length_m(&self) -> f64 {
        self.road_segments.iter().map(RoadSegment::length_m).sum()
    }

    /// Total time spent serving stops.
    pub fn service_time(&self) -> f64 {
        self.stops.iter().map(TourStop::service_duration).sum()
    }

    /// Position of a request's stop in the visiting order.
    pub fn position_of(&self, request_id: RequestId, kind: StopKind) -> Option<usize> {
        self.stops
            .iter()
            .position(|stop| stop.request_id == Some(request_id) && stop.kind == kind)
    }

    /// Stops framed by the warehouse departure and return.
    pub fn itinerary(&self) -> Vec<TourStop> {
        let depot = |at: f64| TourStop {
            kind: StopKind::Warehouse,
            request_id: None,
            intersection_id: self.warehouse_id,
            arrival: at,
            departure: at,
        };
        let mut itinerary = Vec::with_capacity(self.stops.len() + 2);
        itinerary.push(depot(0.0));
        itinerary.extend(self.stops.iter().cloned());
        itinerary.push(depot(self.total_duration));
        itinerary
    }

    /// Coordinates along the roads driven.
    pub fn geometry(&self, network: &RoadNetwork) -> Polyline {
        Polyline::along(network, &self.road_segments)
    }
}

/// Turns a solution over a courier's cost graph into a timed tour.
#[derive(Debug, Clone, Copy)]
pub struct TourAssembler<'a> {
    graph: &'a CompleteCostGraph,
    requests: &'a [PickupDeliveryRequest],
    warehouse_id: IntersectionId,
    trees: Option<&'a [PathTree]>,
    stop_orders: &'a [StopOrder],
}

impl<'a> TourAssembler<'a> {
    /// Creates an assembler over a courier's cost graph and requests.
    pub fn new(
        graph: &'a CompleteCostGraph,
        requests: &'a [PickupDeliveryRequest],
        warehouse_id: IntersectionId,
    ) -> Self {
        Self {
            graph,
            requests,
            warehouse_id,
            trees: None,
            stop_orders: &[],
        }
    }

    /// Path trees indexed like the graph's vertices, used to record the
    /// road segments between stops.
    pub fn with_paths(mut self, trees: &'a [PathTree]) -> Self {
        self.trees = Some(trees);
        self
    }

    /// Orders between stops that share a location. Orders across locations
    /// are the sequencer's business.
    pub fn with_stop_orders(mut self, stop_orders: &'a [StopOrder]) -> Self {
        self.stop_orders = stop_orders;
        self
    }

    /// First location whose stops cannot be served in an order that honours
    /// the stop orders.
    pub fn conflicting_location(&self) -> Option<IntersectionId> {
        self.graph
            .vertices()
            .iter()
            .enumerate()
            .find(|&(vertex, &intersection)| {
                let groups: &[&[StopKind]] = if vertex == 0 {
                    &[&[StopKind::Pickup], &[StopKind::Delivery]]
                } else {
                    &[&[StopKind::Pickup, StopKind::Delivery]]
                };
                groups
                    .iter()
                    .any(|kinds| self.stops_at(intersection, kinds).is_none())
            })
            .map(|(_, &intersection)| intersection)
    }

    /// Builds the tour, or `None` if the solution is unsolved or the stops
    /// at some location cannot be ordered.
    ///
    /// Stops located at the warehouse itself are served there: pickups
    /// before leaving, deliveries after returning.
    pub fn assemble(
        &self,
        courier_id: CourierId,
        start_time: NaiveDateTime,
        solution: &Solution,
    ) -> Option<Tour> {
        let total_distance = solution.cost()?;
        let order = solution.order();

        let mut tour = Tour {
            courier_id,
            warehouse_id: self.warehouse_id,
            start_time,
            stops: Vec::new(),
            road_segments: Vec::new(),
            total_distance,
            total_duration: 0.0,
        };
        let mut clock = 0.0;

        for (position, &vertex) in order.iter().enumerate() {
            let intersection = self.graph.vertex_id(vertex)?;
            if position == 0 {
                self.serve(&mut tour, &mut clock, intersection, &[StopKind::Pickup])?;
            } else {
                let served =
                    self.serve(&mut tour, &mut clock, intersection, &[StopKind::Pickup, StopKind::Delivery])?;
                if served == 0 {
                    warn!(courier_id, intersection, "solution vertex matches no request stop");
                }
            }

            let next = order.get(position + 1).copied().unwrap_or(0);
            clock += self.graph.cost(vertex, next).unwrap_or(0.0);
            self.drive(&mut tour, vertex, next);
        }

        if let Some(&depot) = order.first() {
            let intersection = self.graph.vertex_id(depot)?;
            self.serve(&mut tour, &mut clock, intersection, &[StopKind::Delivery])?;
        }

        tour.total_duration = clock;
        Some(tour)
    }

    /// Request stops of `kinds` at `intersection`, in serving order.
    ///
    /// Pickups come before deliveries and requests keep their given order,
    /// unless a stop order says otherwise.
    fn stops_at(&self, intersection: IntersectionId, kinds: &[StopKind]) -> Option<Vec<StopRef>> {
        let stops = kinds
            .iter()
            .flat_map(|&kind| {
                self.requests
                    .iter()
                    .filter(move |request| {
                        request
                            .stop(kind)
                            .is_some_and(|(location, _)| location == intersection)
                    })
                    .map(move |request| StopRef {
                        request_id: request.id(),
                        kind,
                    })
            })
            .collect();
        order_stops(stops, self.stop_orders)
    }

    /// Appends a stop for every request stop of `kinds` at `intersection`.
    fn serve(
        &self,
        tour: &mut Tour,
        clock: &mut f64,
        intersection: IntersectionId,
        kinds: &[StopKind],
    ) -> Option<usize> {
        let stops = self.stops_at(intersection, kinds)?;
        for stop in &stops {
            let duration = self
                .requests
                .iter()
                .find(|request| request.id() == stop.request_id)
                .and_then(|request| request.stop(stop.kind))
                .map_or(0.0, |(_, duration)| duration);
            let arrival = *clock;
            *clock += duration.max(0.0);
            tour.stops.push(TourStop {
                kind: stop.kind,
                request_id: Some(stop.request_id),
                intersection_id: intersection,
                arrival,
                departure: *clock,
            });
        }
        Some(stops.len())
    }

    fn drive(&self, tour: &mut Tour, from: usize, to: usize) {
        let (Some(trees), Some(target)) = (self.trees, self.graph.vertex_id(to)) else {
            return;
        };
        if let Some(path) = trees.get(from).and_then(|tree| tree.path_to(target)) {
            tour.road_segments.extend(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::request::{Precedences, service_times};
    use crate::solver::solve;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 10, 1)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .unwrap()
    }

    fn fixture() -> (CompleteCostGraph, Vec<PickupDeliveryRequest>) {
        let graph = CompleteCostGraph::from_rows(
            vec![1, 2, 3, 4, 5],
            &[
                vec![0.0, 12.0, 20.0, 25.0, 30.0],
                vec![12.0, 0.0, 15.0, 22.0, 27.0],
                vec![20.0, 15.0, 0.0, 10.0, 18.0],
                vec![25.0, 22.0, 10.0, 0.0, 12.0],
                vec![30.0, 27.0, 18.0, 12.0, 0.0],
            ],
        )
        .unwrap();
        let requests = vec![
            PickupDeliveryRequest::new(1, 2, 5.0, 3, 10.0),
            PickupDeliveryRequest::new(2, 4, 3.0, 5, 8.0),
        ];
        (graph, requests)
    }

    #[test]
    fn test_timing_follows_order() {
        let (graph, requests) = fixture();
        let precedences = Precedences::for_requests(&graph, &requests);
        let service = service_times(&graph, &requests);
        let solution = solve(&graph, &precedences, &service, 1_000);
        assert_eq!(solution.order(), &[0, 1, 2, 3, 4]);

        let tour = TourAssembler::new(&graph, &requests, 1)
            .assemble(123, start(), &solution)
            .unwrap();
        assert_eq!(tour.stops.len(), 4);
        assert_eq!(tour.stops[0].arrival, 12.0);
        assert_eq!(tour.stops[0].departure, 17.0);
        assert_eq!(tour.stops[1].arrival, 32.0);
        assert_eq!(tour.stops[3].intersection_id, 5);
        // travel 12+15+10+12+30 plus service 5+10+3+8
        assert_eq!(tour.total_duration, 105.0);
        assert_eq!(tour.total_distance, 105.0);
        assert_eq!(tour.service_time(), 26.0);
        assert_eq!(tour.clock_time(tour.total_duration), Some(start() + ChronoDuration::minutes(105)));
    }

    #[test]
    fn test_unsolved_yields_nothing() {
        let (graph, requests) = fixture();
        let solution = solve(&graph, &Precedences::new(), &[], 0);
        assert!(TourAssembler::new(&graph, &requests, 1)
            .assemble(1, start(), &solution)
            .is_none());
    }

    #[test]
    fn test_itinerary_frames_stops_with_warehouse() {
        let (graph, requests) = fixture();
        let precedences = Precedences::for_requests(&graph, &requests);
        let solution = solve(&graph, &precedences, &[], 1_000);
        let tour = TourAssembler::new(&graph, &requests, 1)
            .assemble(7, start(), &solution)
            .unwrap();
        let itinerary = tour.itinerary();
        assert_eq!(itinerary.len(), 6);
        assert_eq!(itinerary[0].kind, StopKind::Warehouse);
        assert_eq!(itinerary[0].request_id, None);
        assert_eq!(itinerary[5].arrival, tour.total_duration);
    }

    #[test]
    fn test_transit_vertex_produces_no_stop() {
        let (graph, _) = fixture();
        let requests = vec![PickupDeliveryRequest::new(1, 2, 5.0, 3, 10.0)];
        let solution = solve(&graph, &Precedences::for_requests(&graph, &requests), &[], 1_000);
        let tour = TourAssembler::new(&graph, &requests, 1)
            .assemble(7, start(), &solution)
            .unwrap();
        assert_eq!(tour.stops.len(), 2);
        assert!(tour.position_of(1, StopKind::Pickup) < tour.position_of(1, StopKind::Delivery));
    }

    #[test]
    fn test_stop_orders_apply_at_shared_location() {
        let (graph, _) = fixture();
        let requests = vec![
            PickupDeliveryRequest::new(1, 2, 5.0, 3, 10.0),
            PickupDeliveryRequest::new(2, 3, 3.0, 5, 8.0),
        ];
        let solution = solve(&graph, &Precedences::for_requests(&graph, &requests), &[], 1_000);

        let orders = [StopOrder {
            before: StopRef::delivery(1),
            after: StopRef::pickup(2),
        }];
        let assembler = TourAssembler::new(&graph, &requests, 1).with_stop_orders(&orders);
        assert_eq!(assembler.conflicting_location(), None);
        let tour = assembler.assemble(7, start(), &solution).unwrap();
        assert!(tour.position_of(1, StopKind::Delivery) < tour.position_of(2, StopKind::Pickup));

        let cyclic = [
            orders[0],
            StopOrder {
                before: StopRef::pickup(2),
                after: StopRef::delivery(1),
            },
        ];
        let assembler = TourAssembler::new(&graph, &requests, 1).with_stop_orders(&cyclic);
        assert_eq!(assembler.conflicting_location(), Some(3));
        assert!(assembler.assemble(7, start(), &solution).is_none());
    }
}
