//! Polyline representation for tour geometries.
//!
//! Coordinates are kept decoded; any compact encoding belongs to whatever
//! presents the tour, not to the planner core.

use serde::{Deserialize, Serialize};

use crate::network::{RoadNetwork, RoadSegment};

/// Ordered (latitude, longitude) points along a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<(f64, f64)>,
}

impl Polyline {
    /// Creates a new Polyline from (latitude, longitude) points.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Follows `segments` through `network`.
    ///
    /// Emits the source of the first segment and then the destination of
    /// every segment. Endpoints missing from the network are skipped.
    pub fn along(network: &RoadNetwork, segments: &[RoadSegment]) -> Self {
        let endpoints = segments
            .first()
            .map(RoadSegment::source)
            .into_iter()
            .chain(segments.iter().map(RoadSegment::destination));
        let points = endpoints
            .filter_map(|id| network.intersection(id))
            .map(|intersection| intersection.location())
            .collect();
        Self { points }
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<(f64, f64)> {
        self.points
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the polyline has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
