//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `surface` - Rendering surface boundary and map event observer
//! - `outdoor` - Outdoor routing collaborators (HTTP, straight line)
//! - `stylesheet` - Stylesheet file loading
//! - `venue_loader` - Venue description file loading

pub mod outdoor;
pub mod stylesheet;
pub mod surface;
pub mod venue_loader;

// Re-export commonly used types
pub use outdoor::{create_router, OutdoorRouter, StraightLineRouter};
pub use surface::{MapObserver, NullSurface, RecordingSurface, RenderSurface};
