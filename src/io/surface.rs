//! Rendering surface boundary and the map event observer
//!
//! The surface draws what controllers hand it and reports gestures back.
//! Controllers never retain anything the surface gives them beyond the call.

use crate::domain::types::{GeoBounds, GeoCoord, MapId, ShapeId, UserLocation, VenueId};
use crate::services::geometry_store::RenderItem;
use parking_lot::Mutex;

/// Drawing target for venue maps and the outdoor overlay
pub trait RenderSurface: Send + Sync {
    /// Replace everything drawn for a venue map with `items` (bottom first)
    fn present(&self, venue: VenueId, map: MapId, items: &[RenderItem<'_>]);

    /// Remove a venue map from display
    fn clear(&self, venue: VenueId, map: MapId);

    /// Replace the venue's outdoor overlay (outdoor path legs)
    fn present_outdoor(&self, venue: VenueId, items: &[RenderItem<'_>]);

    fn show_user_location(&self, venue: VenueId, location: &UserLocation);

    fn fit_bounds(&self, bounds: GeoBounds);
}

/// Surface that draws nothing (CLI and headless use)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn present(&self, _venue: VenueId, _map: MapId, _items: &[RenderItem<'_>]) {}
    fn clear(&self, _venue: VenueId, _map: MapId) {}
    fn present_outdoor(&self, _venue: VenueId, _items: &[RenderItem<'_>]) {}
    fn show_user_location(&self, _venue: VenueId, _location: &UserLocation) {}
    fn fit_bounds(&self, _bounds: GeoBounds) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Present { venue: VenueId, map: MapId, shapes: Vec<ShapeId> },
    Clear { venue: VenueId, map: MapId },
    PresentOutdoor { venue: VenueId, shapes: Vec<ShapeId> },
    UserLocation { venue: VenueId, map: MapId },
    FitBounds(GeoBounds),
}

/// Surface that records every call, for inspection
#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().clone()
    }

    /// Shapes of the most recent `present` for a map
    pub fn last_presented(&self, venue: VenueId, map: MapId) -> Option<Vec<ShapeId>> {
        self.events.lock().iter().rev().find_map(|e| match e {
            SurfaceEvent::Present { venue: v, map: m, shapes } if *v == venue && *m == map => {
                Some(shapes.clone())
            }
            _ => None,
        })
    }

    fn push(&self, event: SurfaceEvent) {
        self.events.lock().push(event);
    }
}

impl RenderSurface for RecordingSurface {
    fn present(&self, venue: VenueId, map: MapId, items: &[RenderItem<'_>]) {
        let shapes = items.iter().map(|i| i.shape.id).collect();
        self.push(SurfaceEvent::Present { venue, map, shapes });
    }

    fn clear(&self, venue: VenueId, map: MapId) {
        self.push(SurfaceEvent::Clear { venue, map });
    }

    fn present_outdoor(&self, venue: VenueId, items: &[RenderItem<'_>]) {
        let shapes = items.iter().map(|i| i.shape.id).collect();
        self.push(SurfaceEvent::PresentOutdoor { venue, shapes });
    }

    fn show_user_location(&self, venue: VenueId, location: &UserLocation) {
        self.push(SurfaceEvent::UserLocation { venue, map: location.map });
    }

    fn fit_bounds(&self, bounds: GeoBounds) {
        self.push(SurfaceEvent::FitBounds(bounds));
    }
}

/// A tap on the map; `shape` is only set for interactive layers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapEvent {
    pub venue: VenueId,
    pub map: MapId,
    pub shape: Option<ShapeId>,
    pub point: GeoCoord,
}

pub type TapHandler = Box<dyn Fn(&TapEvent) + Send + Sync>;
pub type ScaleHandler = Box<dyn Fn(f64) + Send + Sync>;

/// Optional handlers for surface events; each slot is set and cleared on its own
#[derive(Default)]
pub struct MapObserver {
    on_tap: Option<TapHandler>,
    on_zoom: Option<ScaleHandler>,
    on_rotation: Option<ScaleHandler>,
}

impl MapObserver {
    pub fn set_tap_handler(&mut self, handler: TapHandler) {
        self.on_tap = Some(handler);
    }

    pub fn set_zoom_handler(&mut self, handler: ScaleHandler) {
        self.on_zoom = Some(handler);
    }

    pub fn set_rotation_handler(&mut self, handler: ScaleHandler) {
        self.on_rotation = Some(handler);
    }

    pub fn clear_tap_handler(&mut self) {
        self.on_tap = None;
    }

    pub fn clear_zoom_handler(&mut self) {
        self.on_zoom = None;
    }

    pub fn clear_rotation_handler(&mut self) {
        self.on_rotation = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns whether a handler was registered
    pub fn notify_tap(&self, event: &TapEvent) -> bool {
        self.on_tap.as_ref().map(|h| h(event)).is_some()
    }

    pub fn notify_zoom(&self, scale: f64) -> bool {
        self.on_zoom.as_ref().map(|h| h(scale)).is_some()
    }

    /// `degrees` relative to north
    pub fn notify_rotation(&self, degrees: f64) -> bool {
        self.on_rotation.as_ref().map(|h| h(degrees)).is_some()
    }
}

impl std::fmt::Debug for MapObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapObserver")
            .field("on_tap", &self.on_tap.is_some())
            .field("on_zoom", &self.on_zoom.is_some())
            .field("on_rotation", &self.on_rotation.is_some())
            .finish()
    }
}
