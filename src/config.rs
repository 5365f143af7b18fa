//! Planner configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//!
//! ```toml
//! speed_kmh = 15.0
//! time_budget_ms = 30000
//! bound = "min_outgoing"
//! successor_order = "nearest_first"
//! warm_start = true
//! max_duration = 480.0
//! ```

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::duration::{DEFAULT_SPEED_KMH, TravelSpeed};
use crate::error::ConfigError;
use crate::solver::{BoundStrategy, SolveOptions, SuccessorOrder};

/// Settings shared by every tour a planner computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Average courier speed in km/h.
    pub speed_kmh: f64,
    /// Wall-clock budget for each sequencing search.
    pub time_budget_ms: i64,
    pub bound: BoundStrategy,
    pub successor_order: SuccessorOrder,
    pub warm_start: bool,
    /// Optional cap on a tour's total cost, in minutes.
    pub max_duration: Option<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            time_budget_ms: 30_000,
            bound: BoundStrategy::Trivial,
            successor_order: SuccessorOrder::Sequential,
            warm_start: false,
            max_duration: None,
        }
    }
}

impl PlannerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a non-positive speed or shift cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed_kmh > 0.0) || !self.speed_kmh.is_finite() {
            return Err(ConfigError::InvalidSpeed(self.speed_kmh));
        }
        if let Some(cap) = self.max_duration {
            if !(cap > 0.0) {
                return Err(ConfigError::InvalidMaxDuration(cap));
            }
        }
        Ok(())
    }

    /// Returns the configured travel speed.
    pub fn speed(&self) -> TravelSpeed {
        TravelSpeed::new(self.speed_kmh)
    }

    /// Builds the options for one solve, polling `cancel` if given.
    pub fn solve_options(&self, cancel: Option<Arc<AtomicBool>>) -> SolveOptions {
        SolveOptions {
            time_budget_ms: self.time_budget_ms,
            bound: self.bound,
            successor_order: self.successor_order,
            warm_start: self.warm_start,
            max_duration: self.max_duration,
            cancel,
        }
    }
}
