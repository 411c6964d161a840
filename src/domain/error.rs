//! Error kinds for controller and wayfinding operations
//!
//! "No route" is not an error kind: a completed search that finds nothing
//! yields an empty route.

use crate::domain::types::{MapId, VenueId, VenueState, WaypointId};

/// Result type alias for controller and wayfinding operations.
pub type Result<T> = std::result::Result<T, WayfindError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WayfindError {
    /// A waypoint, shape, map or venue is not part of the relevant active venue.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The outdoor routing collaborator failed or timed out.
    #[error("outdoor routing provider failed: {0}")]
    ProviderFailure(String),

    /// The venue is not in a state that allows the operation.
    #[error("venue {venue} is {state}, operation requires {required}")]
    InvalidState { venue: VenueId, state: &'static str, required: &'static str },

    /// A newer request (or a clear) was issued while this one was in flight.
    #[error("route request {token} superseded by {latest}")]
    Superseded { token: u64, latest: u64 },
}

impl WayfindError {
    pub fn unknown_waypoint(venue: VenueId, waypoint: WaypointId) -> Self {
        Self::InvalidReference(format!("waypoint {waypoint} is not part of venue {venue}"))
    }

    pub fn unknown_map(venue: VenueId, map: MapId) -> Self {
        Self::InvalidReference(format!("map {map} is not part of venue {venue}"))
    }

    pub fn unknown_venue(venue: VenueId) -> Self {
        Self::InvalidReference(format!("venue {venue} is not active"))
    }

    pub fn invalid_state(venue: VenueId, state: VenueState, required: &'static str) -> Self {
        Self::InvalidState { venue, state: state.as_str(), required }
    }
}
