//! Errors raised while planning tours and loading configuration.

use thiserror::Error;

use crate::network::IntersectionId;
use crate::request::{RequestId, StopOrder};
use crate::tour::CourierId;

/// Why a tour could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// The courier carries no requests, so there is nothing to plan.
    #[error("courier {courier_id} has no assigned requests")]
    NoAssignedRequests { courier_id: CourierId },

    /// No precedence-respecting tour was found within the time budget.
    ///
    /// Either none exists (unreachable stops, contradictory ordering edits)
    /// or the budget ran out before the first complete tour.
    #[error("no feasible visiting order for courier {courier_id} within {time_budget_ms} ms")]
    NoFeasibleSequence {
        courier_id: CourierId,
        time_budget_ms: i64,
    },

    #[error("intersection {id} is not part of the road network")]
    UnknownIntersection { id: IntersectionId },

    #[error("request {request_id} is not assigned to courier {courier_id}")]
    UnknownRequest {
        courier_id: CourierId,
        request_id: RequestId,
    },

    #[error("a stop cannot be ordered relative to itself")]
    InvalidStopOrder,

    /// The order contradicts warehouse service: warehouse pickups happen
    /// before leaving and warehouse deliveries after returning.
    #[error("stop order {order:?} of courier {courier_id} conflicts with service at the warehouse")]
    WarehouseStopOrder {
        courier_id: CourierId,
        order: StopOrder,
    },

    /// The stops sharing one intersection cannot be served in any order
    /// that honours the stop orders.
    #[error("stop orders of courier {courier_id} are cyclic at intersection {intersection}")]
    CyclicStopOrders {
        courier_id: CourierId,
        intersection: IntersectionId,
    },
}

/// Why a planner configuration was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse planner config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("speed must be positive, got {0} km/h")]
    InvalidSpeed(f64),

    #[error("maximum tour duration must be positive, got {0} minutes")]
    InvalidMaxDuration(f64),
}
