//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `geometry_store` - Per-map layered shape collection
//! - `search` - Accessibility-filtered shortest-path search
//! - `venue_graph` - Per-venue waypoint graph and entity indices
//! - `style_engine` - Base/applied style records per shape class
//! - `path_overlay` - Current-path slot with request-token staleness
//! - `controller` - One venue's active state, geometry and styles
//! - `wayfinding` - Indoor, outdoor and venue-to-venue routing
//! - `coordinator` - Multi-venue controller set and batch operations

pub mod controller;
pub mod coordinator;
pub mod geometry_store;
pub mod path_overlay;
pub mod search;
pub mod style_engine;
pub mod venue_graph;
pub mod wayfinding;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use controller::{ControllerHandle, ControllerOptions, VenueController};
pub use coordinator::MultiVenueCoordinator;
pub use geometry_store::GeometryStore;
pub use venue_graph::VenueGraph;
pub use wayfinding::WayfindingEngine;
