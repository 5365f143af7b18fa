//! Travel durations over road segments.
//!
//! Couriers ride at a fixed average speed, so the time to traverse a segment
//! is proportional to its physical length.

use serde::{Deserialize, Serialize};

use crate::network::RoadSegment;

/// Average courier speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 15.0;

/// Converts lengths in metres to travel time in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelSpeed {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
}

impl Default for TravelSpeed {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl TravelSpeed {
    /// Creates a converter for an average speed in km/h.
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Minutes needed to cover `length_m` metres.
    ///
    /// Non-positive (and NaN) lengths take no time; the result is never
    /// negative.
    pub fn minutes_for(&self, length_m: f64) -> f64 {
        if !(length_m > 0.0) {
            return 0.0;
        }
        length_m / (self.speed_kmh * 1000.0) * 60.0
    }

    /// Minutes needed to traverse `segment`.
    pub fn segment_duration(&self, segment: &RoadSegment) -> f64 {
        self.minutes_for(segment.length_m())
    }
}
