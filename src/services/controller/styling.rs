//! Amenity, path-type, unit and shape styling plus bounds queries

use super::VenueController;
use crate::domain::style::{Style, StyleClass};
use crate::domain::types::{AmenityId, DestinationId, GeoBounds, MapId, PathTypeId, ShapeId, WaypointId};
use crate::services::geometry_store::Shape;
use tracing::debug;

impl VenueController {
    fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.maps.values_mut().find_map(|m| m.store.shape_mut(id))
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.maps.values().find_map(|m| m.store.shape(id))
    }

    fn update_shapes(&mut self, ids: &[ShapeId], mut f: impl FnMut(&mut Shape)) -> usize {
        let mut touched = 0;
        for id in ids {
            if let Some(shape) = self.shape_mut(*id) {
                f(shape);
                touched += 1;
            }
        }
        touched
    }

    fn set_visible(&mut self, ids: &[ShapeId], visible: bool) -> usize {
        let touched = self.update_shapes(ids, |s| s.visible = visible);
        self.refresh();
        touched
    }

    fn amenity_shape_ids(&self, amenity: AmenityId, waypoint: Option<WaypointId>) -> Vec<ShapeId> {
        self.graph.as_ref().map(|g| g.amenity_shapes(amenity, waypoint)).unwrap_or_default()
    }

    fn path_type_shape_ids(&self, path_type: PathTypeId, waypoint: Option<WaypointId>) -> Vec<ShapeId> {
        self.graph.as_ref().map(|g| g.path_type_shapes(path_type, waypoint)).unwrap_or_default()
    }

    pub fn show_all_amenities(&mut self) -> usize {
        let ids = self.graph.as_ref().map(|g| g.all_amenity_shapes()).unwrap_or_default();
        self.set_visible(&ids, true)
    }

    pub fn hide_all_amenities(&mut self) -> usize {
        let ids = self.graph.as_ref().map(|g| g.all_amenity_shapes()).unwrap_or_default();
        self.set_visible(&ids, false)
    }

    /// Show one amenity, at one waypoint or venue-wide when `waypoint` is None
    pub fn show_amenity(&mut self, amenity: AmenityId, waypoint: Option<WaypointId>) -> usize {
        let ids = self.amenity_shape_ids(amenity, waypoint);
        self.set_visible(&ids, true)
    }

    pub fn hide_amenity(&mut self, amenity: AmenityId, waypoint: Option<WaypointId>) -> usize {
        let ids = self.amenity_shape_ids(amenity, waypoint);
        self.set_visible(&ids, false)
    }

    pub fn show_all_path_types(&mut self) -> usize {
        let ids = self.graph.as_ref().map(|g| g.all_path_type_shapes()).unwrap_or_default();
        self.set_visible(&ids, true)
    }

    pub fn hide_all_path_types(&mut self) -> usize {
        let ids = self.graph.as_ref().map(|g| g.all_path_type_shapes()).unwrap_or_default();
        self.set_visible(&ids, false)
    }

    pub fn show_path_type(&mut self, path_type: PathTypeId, waypoint: Option<WaypointId>) -> usize {
        let ids = self.path_type_shape_ids(path_type, waypoint);
        self.set_visible(&ids, true)
    }

    pub fn hide_path_type(&mut self, path_type: PathTypeId, waypoint: Option<WaypointId>) -> usize {
        let ids = self.path_type_shape_ids(path_type, waypoint);
        self.set_visible(&ids, false)
    }

    /// Apply `style` to a class. Venue-wide styling goes through the style
    /// record; waypoint-scoped styling only touches the scoped shapes.
    fn style_class(&mut self, class: StyleClass, ids: &[ShapeId], waypoint: Option<WaypointId>, style: Style) {
        let effective = match waypoint {
            None => Some(self.styles.apply(&class, style.clone())),
            Some(_) => None,
        };
        self.update_shapes(ids, |s| {
            s.style = match &effective {
                Some(e) => e.clone(),
                None => s.base_style.merged(&style),
            }
        });
        self.refresh();
    }

    fn reset_class(&mut self, class: StyleClass, ids: &[ShapeId], waypoint: Option<WaypointId>) {
        if waypoint.is_none() {
            self.styles.reset(&class);
        }
        self.update_shapes(ids, |s| s.style = s.base_style.clone());
        self.refresh();
    }

    /// Style every amenity; None resets them instead
    pub fn style_all_amenities(&mut self, style: Option<Style>) {
        let Some(style) = style else {
            self.reset_all_amenity_style();
            return;
        };
        for amenity in self.amenity_ids() {
            let ids = self.amenity_shape_ids(amenity, None);
            self.style_class(StyleClass::Amenity(amenity), &ids, None, style.clone());
        }
    }

    pub fn style_amenity(&mut self, amenity: AmenityId, waypoint: Option<WaypointId>, style: Style) {
        let ids = self.amenity_shape_ids(amenity, waypoint);
        self.style_class(StyleClass::Amenity(amenity), &ids, waypoint, style);
    }

    pub fn reset_all_amenity_style(&mut self) {
        for amenity in self.amenity_ids() {
            self.reset_amenity_style(amenity, None);
        }
    }

    pub fn reset_amenity_style(&mut self, amenity: AmenityId, waypoint: Option<WaypointId>) {
        let ids = self.amenity_shape_ids(amenity, waypoint);
        self.reset_class(StyleClass::Amenity(amenity), &ids, waypoint);
    }

    pub fn style_all_path_types(&mut self, style: Option<Style>) {
        let Some(style) = style else {
            self.reset_all_path_type_style();
            return;
        };
        for path_type in self.path_type_ids() {
            let ids = self.path_type_shape_ids(path_type, None);
            self.style_class(StyleClass::PathType(path_type), &ids, None, style.clone());
        }
    }

    pub fn style_path_type(&mut self, path_type: PathTypeId, waypoint: Option<WaypointId>, style: Style) {
        let ids = self.path_type_shape_ids(path_type, waypoint);
        self.style_class(StyleClass::PathType(path_type), &ids, waypoint, style);
    }

    pub fn reset_all_path_type_style(&mut self) {
        for path_type in self.path_type_ids() {
            self.reset_path_type_style(path_type, None);
        }
    }

    pub fn reset_path_type_style(&mut self, path_type: PathTypeId, waypoint: Option<WaypointId>) {
        let ids = self.path_type_shape_ids(path_type, waypoint);
        self.reset_class(StyleClass::PathType(path_type), &ids, waypoint);
    }

    fn amenity_ids(&self) -> Vec<AmenityId> {
        self.venue.amenities.iter().map(|a| a.id).collect()
    }

    fn path_type_ids(&self) -> Vec<PathTypeId> {
        self.venue.path_types.iter().map(|p| p.id).collect()
    }

    pub fn units_in_map(&self, map: MapId) -> Vec<ShapeId> {
        self.map_store(map)
            .map(|s| s.shapes().filter(|shape| shape.is_unit()).map(|shape| shape.id).collect())
            .unwrap_or_default()
    }

    fn all_units(&self) -> Vec<ShapeId> {
        self.maps
            .values()
            .flat_map(|m| m.store.shapes().filter(|s| s.is_unit()).map(|s| s.id))
            .collect()
    }

    pub fn unit_from_waypoint(&self, waypoint: WaypointId) -> Option<ShapeId> {
        let graph = self.graph.as_ref()?;
        graph
            .shapes_for_waypoint(waypoint)
            .iter()
            .copied()
            .find(|id| self.shape(*id).is_some_and(Shape::is_unit))
    }

    pub fn units_from_destination(&self, destination: DestinationId) -> Vec<ShapeId> {
        let Some(graph) = self.graph.as_ref() else {
            return Vec::new();
        };
        let mut units: Vec<ShapeId> = Vec::new();
        for unit in graph.waypoints_for_destination(destination).iter().filter_map(|w| self.unit_from_waypoint(*w)) {
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
        units
    }

    pub fn destinations_from_shape(&self, shape: ShapeId) -> Vec<DestinationId> {
        let Some(graph) = self.graph.as_ref() else {
            return Vec::new();
        };
        let mut destinations: Vec<DestinationId> = Vec::new();
        for w in graph.waypoints_for_shape(shape) {
            for d in graph.destinations_for_waypoint(*w) {
                if !destinations.contains(d) {
                    destinations.push(*d);
                }
            }
        }
        destinations
    }

    pub fn waypoints_from_shape(&self, shape: ShapeId) -> Vec<WaypointId> {
        self.graph.as_ref().map(|g| g.waypoints_for_shape(shape).to_vec()).unwrap_or_default()
    }

    pub fn hide_unit_contents(&mut self, units: &[ShapeId]) -> usize {
        let touched = self.update_shapes(units, |s| {
            if s.is_unit() {
                s.contents_visible = false;
            }
        });
        self.refresh();
        touched
    }

    pub fn show_unit_contents(&mut self, units: &[ShapeId]) -> usize {
        let touched = self.update_shapes(units, |s| s.contents_visible = true);
        self.refresh();
        touched
    }

    pub fn reset_all_unit_styles(&mut self) {
        self.styles.reset(&StyleClass::Unit);
        let units = self.all_units();
        self.update_shapes(&units, |s| s.style = s.base_style.clone());
        self.refresh();
    }

    /// Style units with no destination behind any of their waypoints
    pub fn style_empty_units(&mut self, style: Style) -> usize {
        let units: Vec<ShapeId> =
            self.all_units().into_iter().filter(|u| self.destinations_from_shape(*u).is_empty()).collect();
        self.style_shapes(&units, style)
    }

    pub fn style_units_with_destinations(&mut self, style: Style) -> usize {
        let units: Vec<ShapeId> =
            self.all_units().into_iter().filter(|u| !self.destinations_from_shape(*u).is_empty()).collect();
        self.style_shapes(&units, style)
    }

    /// Overlay `style` on each shape's base style
    pub fn style_shapes(&mut self, shapes: &[ShapeId], style: Style) -> usize {
        let touched = self.update_shapes(shapes, |s| s.style = s.base_style.merged(&style));
        debug!(venue_id = %self.venue.id, requested = shapes.len(), touched, "shapes_styled");
        self.refresh();
        touched
    }

    pub fn reset_style_for_shapes(&mut self, shapes: &[ShapeId]) -> usize {
        let mut touched = 0;
        for id in shapes {
            for entry in self.maps.values_mut() {
                if entry.store.reset_shape_style(*id) {
                    touched += 1;
                    break;
                }
            }
        }
        self.refresh();
        touched
    }

    /// Drop every style override in the venue
    pub fn reset_map_style(&mut self) {
        self.styles.reset_all();
        for entry in self.maps.values_mut() {
            for shape in entry.store.shapes_mut() {
                shape.style = shape.base_style.clone();
            }
        }
        self.refresh();
    }

    pub fn bounds_from_shapes(&self, shapes: &[ShapeId]) -> Option<GeoBounds> {
        let coords = shapes.iter().filter_map(|id| self.shape(*id)).flat_map(|s| s.coordinates.iter());
        GeoBounds::from_coords(coords)
    }

    /// Bounds of every geometry and waypoint in the venue, parsed or not
    pub fn venue_bounds(&self) -> Option<GeoBounds> {
        let georef = self.venue.geo_reference;
        let geometry = self
            .venue
            .maps
            .iter()
            .flat_map(|m| m.layers.iter())
            .flat_map(|l| l.geometries.iter())
            .flat_map(|g| g.coordinates.iter());
        let waypoints = self.venue.waypoints.iter().map(|w| &w.position);
        let coords: Vec<_> = geometry.chain(waypoints).map(|p| georef.to_geo(*p)).collect();
        GeoBounds::from_coords(&coords)
    }

    pub fn zoom_to_bounds(&self, bounds: GeoBounds) {
        self.surface.fit_bounds(bounds);
    }

    pub fn zoom_to_venue(&self) -> bool {
        match self.venue_bounds() {
            Some(bounds) => {
                self.zoom_to_bounds(bounds);
                true
            }
            None => false,
        }
    }
}
