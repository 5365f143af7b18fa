//! Test fixtures for tour-planner.
//!
//! Small road networks with round segment lengths so travel times are easy
//! to check by hand (250 m = 1 minute at 15 km/h).

#![allow(dead_code)]

use tour_planner::graph::CompleteCostGraph;
use tour_planner::network::{Intersection, IntersectionId, RoadNetwork, RoadSegment};

/// Metres covered in one minute at the default 15 km/h.
pub const METRES_PER_MINUTE: f64 = 250.0;

/// Builds a network from intersection ids and directed (from, to, metres)
/// segments.
pub fn network(ids: &[IntersectionId], segments: &[(IntersectionId, IntersectionId, f64)]) -> RoadNetwork {
    let mut network = RoadNetwork::new();
    for &id in ids {
        network.add_intersection(Intersection::new(id, 45.75 + id as f64 * 1e-3, 4.85));
    }
    for &(from, to, length) in segments {
        network.add_road_segment(from, RoadSegment::new(format!("Rue {from}-{to}"), length, from, to));
    }
    network
}

/// `width` x `height` grid of two-way streets, one minute per block.
///
/// Intersection ids are `row * width + col + 1`.
pub fn grid(width: u64, height: u64) -> RoadNetwork {
    let mut network = RoadNetwork::new();
    let id = |row: u64, col: u64| row * width + col + 1;
    for row in 0..height {
        for col in 0..width {
            network.add_intersection(Intersection::new(
                id(row, col),
                45.75 + row as f64 * 2e-3,
                4.85 + col as f64 * 3e-3,
            ));
        }
    }
    let street = |network: &mut RoadNetwork, a: IntersectionId, b: IntersectionId| {
        network.add_road_segment(a, RoadSegment::new(format!("Block {a}-{b}"), METRES_PER_MINUTE, a, b));
        network.add_road_segment(b, RoadSegment::new(format!("Block {b}-{a}"), METRES_PER_MINUTE, b, a));
    };
    for row in 0..height {
        for col in 0..width {
            if col + 1 < width {
                street(&mut network, id(row, col), id(row, col + 1));
            }
            if row + 1 < height {
                street(&mut network, id(row, col), id(row + 1, col));
            }
        }
    }
    network
}

/// Complete graph from explicit rows over vertex ids `1..=n`.
pub fn matrix(rows: &[Vec<f64>]) -> CompleteCostGraph {
    let ids = (1..=rows.len() as IntersectionId).collect();
    CompleteCostGraph::from_rows(ids, rows).expect("square cost matrix")
}
