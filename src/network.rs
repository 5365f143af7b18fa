//! Road network: intersections and directed road segments.
//!
//! The network is a sparse adjacency list keyed by source intersection. It is
//! populated once by a loader and then only read while routing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Stable identifier of an intersection.
pub type IntersectionId = u64;

/// A node of the road network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intersection {
    id: IntersectionId,
    latitude: f64,
    longitude: f64,
}

impl Intersection {
    /// Creates an intersection at (latitude, longitude).
    pub fn new(id: IntersectionId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
        }
    }

    /// Returns the intersection id.
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// Location as (lat, lng).
    pub fn location(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// A directed road segment between two intersections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    name: String,
    length_m: f64,
    source: IntersectionId,
    destination: IntersectionId,
}

impl RoadSegment {
    /// Creates a segment of `length_m` metres from `source` to `destination`.
    pub fn new(
        name: impl Into<String>,
        length_m: f64,
        source: IntersectionId,
        destination: IntersectionId,
    ) -> Self {
        Self {
            name: name.into(),
            length_m,
            source,
            destination,
        }
    }

    /// Returns the street name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical length in metres.
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Returns the intersection the segment starts from.
    pub fn source(&self) -> IntersectionId {
        self.source
    }

    /// Returns the intersection the segment leads to.
    pub fn destination(&self) -> IntersectionId {
        self.destination
    }
}

/// Sparse directed road graph.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    intersections: BTreeMap<IntersectionId, Intersection>,
    adjacency: HashMap<IntersectionId, Vec<RoadSegment>>,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an intersection.
    ///
    /// Returns false, leaving the existing entry untouched, if the id is
    /// already registered.
    pub fn add_intersection(&mut self, intersection: Intersection) -> bool {
        if self.intersections.contains_key(&intersection.id()) {
            trace!(id = intersection.id(), "duplicate intersection rejected");
            return false;
        }
        self.intersections.insert(intersection.id(), intersection);
        true
    }

    /// Indexes `segment` as an outgoing segment of `source_id`.
    ///
    /// Returns false without mutating anything if `source_id` is not a
    /// registered intersection.
    pub fn add_road_segment(&mut self, source_id: IntersectionId, segment: RoadSegment) -> bool {
        if !self.intersections.contains_key(&source_id) {
            trace!(source_id, "road segment from unknown intersection rejected");
            return false;
        }
        self.adjacency.entry(source_id).or_default().push(segment);
        true
    }

    /// Outgoing segments of `id`, empty if none are registered.
    pub fn segments_from(&self, id: IntersectionId) -> &[RoadSegment] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the intersection registered under `id`.
    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(&id)
    }

    /// Whether `id` is a registered intersection.
    pub fn contains(&self, id: IntersectionId) -> bool {
        self.intersections.contains_key(&id)
    }

    /// All intersections, ordered by id.
    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    /// Returns the number of registered intersections.
    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    /// Returns the number of indexed road segments.
    pub fn segment_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}
