//! Domain models - identifiers, parsed venue data, styles and routes
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - identifiers and geometric primitives (Point, GeoCoord)
//! - `venue` - the pre-parsed venue description consumed by controllers
//! - `style` - style records and the stylesheet value
//! - `route` - computed indoor, outdoor and stitched routes
//! - `error` - the error kinds surfaced by controllers and wayfinding

pub mod error;
pub mod route;
pub mod style;
pub mod types;
pub mod venue;

// Re-export commonly used types at module level
pub use error::{Result, WayfindError};
pub use route::{EdgeRef, IndoorRoute, PathSegment, StitchedRoute, VenueRoute};
pub use style::{Style, StyleClass, StyleSheet};
pub use types::*;
pub use venue::{VenueData, VenueLink};
