//! tour-planner core
//!
//! Plans pickup-and-delivery tours for couriers over a road network:
//! shortest paths between points of interest, a time-bounded
//! branch-and-bound sequencer with precedence constraints, and assembly of
//! the visiting order into a timed tour.

pub mod traits;
pub mod duration;
pub mod network;
pub mod graph;
pub mod shortest_path;
pub mod request;
pub mod solver;
pub mod tour;
pub mod polyline;
pub mod planner;
pub mod config;
pub mod error;
