//! Pickup/delivery requests and the precedence relation they induce.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::CompleteCostGraph;
use crate::network::IntersectionId;

/// Stable identifier of a request.
pub type RequestId = u64;

/// What happens at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    Warehouse,
    Pickup,
    Delivery,
}

/// A parcel to pick up at one intersection and deliver at another.
///
/// Service durations are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupDeliveryRequest {
    id: RequestId,
    pickup: IntersectionId,
    pickup_duration: f64,
    delivery: IntersectionId,
    delivery_duration: f64,
}

impl PickupDeliveryRequest {
    /// Creates a request; durations are in minutes.
    pub fn new(
        id: RequestId,
        pickup: IntersectionId,
        pickup_duration: f64,
        delivery: IntersectionId,
        delivery_duration: f64,
    ) -> Self {
        Self {
            id,
            pickup,
            pickup_duration,
            delivery,
            delivery_duration,
        }
    }

    /// Returns the request id.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the pickup intersection.
    pub fn pickup(&self) -> IntersectionId {
        self.pickup
    }

    /// Returns the service time at the pickup, in minutes.
    pub fn pickup_duration(&self) -> f64 {
        self.pickup_duration
    }

    /// Returns the delivery intersection.
    pub fn delivery(&self) -> IntersectionId {
        self.delivery
    }

    /// Returns the service time at the delivery, in minutes.
    pub fn delivery_duration(&self) -> f64 {
        self.delivery_duration
    }

    /// Location and service duration of one of this request's stops.
    pub fn stop(&self, kind: StopKind) -> Option<(IntersectionId, f64)> {
        match kind {
            StopKind::Pickup => Some((self.pickup, self.pickup_duration)),
            StopKind::Delivery => Some((self.delivery, self.delivery_duration)),
            StopKind::Warehouse => None,
        }
    }
}

/// Names the pickup or delivery stop of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopRef {
    pub request_id: RequestId,
    pub kind: StopKind,
}

impl StopRef {
    /// Refers to the pickup of `request_id`.
    pub fn pickup(request_id: RequestId) -> Self {
        Self {
            request_id,
            kind: StopKind::Pickup,
        }
    }

    /// Refers to the delivery of `request_id`.
    pub fn delivery(request_id: RequestId) -> Self {
        Self {
            request_id,
            kind: StopKind::Delivery,
        }
    }

    /// Intersection of the referenced stop among `requests`.
    pub fn locate(&self, requests: &[PickupDeliveryRequest]) -> Option<IntersectionId> {
        requests
            .iter()
            .find(|request| request.id() == self.request_id)
            .and_then(|request| request.stop(self.kind))
            .map(|(intersection, _)| intersection)
    }
}

/// Explicit ordering edit: `before` must be served before `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StopOrder {
    pub before: StopRef,
    pub after: StopRef,
}

impl StopOrder {
    /// Whether `first` has to be served before `second`: a request's own
    /// pickup precedes its delivery, and every explicit order holds.
    pub fn requires(orders: &[StopOrder], first: StopRef, second: StopRef) -> bool {
        let same_request = first.request_id == second.request_id
            && first.kind == StopKind::Pickup
            && second.kind == StopKind::Delivery;
        same_request
            || orders
                .iter()
                .any(|order| order.before == first && order.after == second)
    }
}

/// Orders stops served at one location.
///
/// `stops` come in their default order; a stop is served as soon as nothing
/// still pending must precede it. `None` when the constraints among `stops`
/// are cyclic.
pub fn order_stops(mut pending: Vec<StopRef>, orders: &[StopOrder]) -> Option<Vec<StopRef>> {
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|&stop| {
            !pending
                .iter()
                .any(|&other| other != stop && StopOrder::requires(orders, other, stop))
        })?;
        ordered.push(pending.remove(ready));
    }
    Some(ordered)
}

/// Warehouse first, then each request's pickup and delivery, without
/// duplicates.
pub fn build_points_of_interest(
    warehouse_id: IntersectionId,
    requests: &[PickupDeliveryRequest],
) -> Vec<IntersectionId> {
    let mut points = vec![warehouse_id];
    for request in requests {
        for id in [request.pickup(), request.delivery()] {
            if !points.contains(&id) {
                points.push(id);
            }
        }
    }
    points
}

/// Per-vertex service time: the sum of every stop located at that vertex.
///
/// The depot (vertex 0) never carries service time.
pub fn service_times(graph: &CompleteCostGraph, requests: &[PickupDeliveryRequest]) -> Vec<f64> {
    let mut times = vec![0.0; graph.vertices().len()];
    for request in requests {
        for kind in [StopKind::Pickup, StopKind::Delivery] {
            let Some((intersection, duration)) = request.stop(kind) else {
                continue;
            };
            match graph.index_of(intersection) {
                Some(0) | None => {}
                Some(index) => times[index] += duration.max(0.0),
            }
        }
    }
    times
}

/// Vertex index -> vertices that must already be visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precedences {
    required: BTreeMap<usize, BTreeSet<usize>>,
}

impl Precedences {
    /// Creates an empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery vertex requires pickup vertex, for every request.
    ///
    /// Requests whose pickup and delivery share a vertex, or whose delivery
    /// is the depot, add nothing.
    pub fn for_requests(graph: &CompleteCostGraph, requests: &[PickupDeliveryRequest]) -> Self {
        let mut precedences = Self::new();
        for request in requests {
            if let (Some(pickup), Some(delivery)) = (
                graph.index_of(request.pickup()),
                graph.index_of(request.delivery()),
            ) {
                precedences.require(delivery, pickup);
            }
        }
        precedences
    }

    /// Records that `vertex` may only be visited after `predecessor`.
    ///
    /// Self-references and constraints on the depot are ignored; returns
    /// whether an entry was added.
    pub fn require(&mut self, vertex: usize, predecessor: usize) -> bool {
        if vertex == predecessor || vertex == 0 {
            return false;
        }
        self.required.entry(vertex).or_default().insert(predecessor)
    }

    /// Returns the vertices that must precede `vertex`.
    pub fn predecessors(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.required.get(&vertex).into_iter().flatten().copied()
    }

    /// Whether every predecessor of `vertex` is marked in `visited`.
    pub fn is_ready(&self, vertex: usize, visited: &[bool]) -> bool {
        self.predecessors(vertex)
            .all(|predecessor| visited.get(predecessor).copied().unwrap_or(false))
    }

    /// Number of constrained vertices.
    pub fn len(&self) -> usize {
        self.required.len()
    }

    /// Whether no vertex is constrained.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requests() -> Vec<PickupDeliveryRequest> {
        vec![
            PickupDeliveryRequest::new(1, 20, 5.0, 30, 10.0),
            PickupDeliveryRequest::new(2, 40, 3.0, 50, 8.0),
        ]
    }

    #[test]
    fn test_points_of_interest_order() {
        let points = build_points_of_interest(10, &requests());
        assert_eq!(points, vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_points_of_interest_deduplicated() {
        let shared = vec![
            PickupDeliveryRequest::new(1, 20, 5.0, 30, 10.0),
            PickupDeliveryRequest::new(2, 20, 3.0, 10, 8.0),
        ];
        assert_eq!(build_points_of_interest(10, &shared), vec![10, 20, 30]);
    }

    #[test]
    fn test_delivery_requires_pickup() {
        let graph = CompleteCostGraph::new(build_points_of_interest(10, &requests()));
        let precedences = Precedences::for_requests(&graph, &requests());
        assert_eq!(precedences.predecessors(2).collect::<Vec<_>>(), vec![1]);
        assert_eq!(precedences.predecessors(4).collect::<Vec<_>>(), vec![3]);
        assert_eq!(precedences.predecessors(1).count(), 0);
        assert_eq!(precedences.len(), 2);
    }

    #[test]
    fn test_is_ready() {
        let mut precedences = Precedences::new();
        precedences.require(3, 1);
        precedences.require(3, 2);
        assert!(!precedences.is_ready(3, &[true, true, false, false]));
        assert!(precedences.is_ready(3, &[true, true, true, false]));
        assert!(precedences.is_ready(1, &[true, false, false, false]));
    }

    #[test]
    fn test_depot_and_self_constraints_ignored() {
        let mut precedences = Precedences::new();
        assert!(!precedences.require(0, 2));
        assert!(!precedences.require(2, 2));
        assert!(precedences.is_empty());
    }

    #[test]
    fn test_service_times_sum_shared_vertices() {
        let shared = vec![
            PickupDeliveryRequest::new(1, 20, 5.0, 30, 10.0),
            PickupDeliveryRequest::new(2, 20, 3.0, 10, 8.0),
        ];
        let graph = CompleteCostGraph::new(build_points_of_interest(10, &shared));
        assert_eq!(service_times(&graph, &shared), vec![0.0, 8.0, 10.0]);
    }

    #[test]
    fn test_stop_ref_locate() {
        let requests = requests();
        assert_eq!(StopRef::delivery(2).locate(&requests), Some(50));
        assert_eq!(StopRef::pickup(9).locate(&requests), None);
    }

    #[test]
    fn test_order_stops_keeps_default_order_without_constraints() {
        let stops = vec![StopRef::pickup(2), StopRef::delivery(1)];
        assert_eq!(order_stops(stops.clone(), &[]), Some(stops));
    }

    #[test]
    fn test_order_stops_honours_explicit_order() {
        let orders = [StopOrder {
            before: StopRef::delivery(1),
            after: StopRef::pickup(2),
        }];
        let ordered = order_stops(vec![StopRef::pickup(2), StopRef::delivery(1)], &orders);
        assert_eq!(ordered, Some(vec![StopRef::delivery(1), StopRef::pickup(2)]));
    }

    #[test]
    fn test_order_stops_rejects_delivery_before_own_pickup() {
        let orders = [StopOrder {
            before: StopRef::delivery(1),
            after: StopRef::pickup(1),
        }];
        assert_eq!(order_stops(vec![StopRef::pickup(1), StopRef::delivery(1)], &orders), None);
    }
}
