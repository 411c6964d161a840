//! Per-map store of renderable shapes grouped into named, z-ordered layers
//!
//! The layer-name → shapes map and the z-order name list are kept in lockstep;
//! `is_consistent` checks the invariant; structural mutations assert it in
//! debug builds. Layer flags are stored on the layer only, so toggling visibility or
//! interactivity is O(1) and effective visibility is resolved at render time.

use crate::domain::style::{Style, StyleClass};
use crate::domain::types::{GeoCoord, GeometryKind, ShapeId, WaypointId};
use crate::domain::{AmenityId, PathTypeId};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// What a shape stands for, when it stands for something navigable
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOrigin {
    Waypoint(WaypointId),
    Unit(SmallVec<[WaypointId; 2]>),
    Amenity { amenity: AmenityId, waypoint: WaypointId },
    PathType { path_type: PathTypeId, waypoint: WaypointId },
    Route,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: GeometryKind,
    pub coordinates: Vec<GeoCoord>,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub origin: Option<ShapeOrigin>,
    pub class: StyleClass,
    /// Style the shape was created with; resets restore it
    pub base_style: Style,
    /// Currently applied style
    pub style: Style,
    pub visible: bool,
    /// Text contents (unit labels) shown inside the shape
    pub contents_visible: bool,
}

impl Shape {
    pub fn new(id: ShapeId, kind: GeometryKind, coordinates: Vec<GeoCoord>, class: StyleClass, style: Style) -> Self {
        Self {
            id,
            kind,
            coordinates,
            properties: serde_json::Map::new(),
            origin: None,
            class,
            base_style: style.clone(),
            style,
            visible: true,
            contents_visible: true,
        }
    }

    pub fn with_origin(mut self, origin: ShapeOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Map<String, serde_json::Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Waypoints this shape is associated with
    pub fn waypoints(&self) -> SmallVec<[WaypointId; 2]> {
        match &self.origin {
            Some(ShapeOrigin::Waypoint(w)) => SmallVec::from_slice(&[*w]),
            Some(ShapeOrigin::Unit(ws)) => ws.clone(),
            Some(ShapeOrigin::Amenity { waypoint, .. }) => SmallVec::from_slice(&[*waypoint]),
            Some(ShapeOrigin::PathType { waypoint, .. }) => SmallVec::from_slice(&[*waypoint]),
            Some(ShapeOrigin::Route) | None => SmallVec::new(),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.origin, Some(ShapeOrigin::Unit(_)))
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub visible: bool,
    pub interactive: bool,
    shapes: Vec<Shape>,
}

impl Layer {
    fn new() -> Self {
        Self { visible: true, interactive: false, shapes: Vec::new() }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }
}

/// A shape ready for display, borrowed from the store
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub shape: &'a Shape,
    /// Position in the layer order, 0 is the bottom
    pub z: usize,
    pub interactive: bool,
}

#[derive(Debug, Default)]
pub struct GeometryStore {
    layers: FxHashMap<String, Layer>,
    order: Vec<String>,
    /// Shape id → owning layer name
    index: FxHashMap<ShapeId, String>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the layer if absent, appending it on top of the z-order
    pub fn ensure_layer(&mut self, name: &str) -> &mut Layer {
        if !self.layers.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.layers.entry(name.to_string()).or_insert_with(Layer::new)
    }

    /// Insert a shape into the named layer, creating the layer on top if needed.
    /// Re-adding an existing shape id is the caller's responsibility to avoid.
    pub fn add_shape(&mut self, shape: Shape, layer_name: &str) {
        self.index.insert(shape.id, layer_name.to_string());
        self.ensure_layer(layer_name).shapes.push(shape);
        debug_assert!(self.is_consistent());
    }

    /// Shapes in a layer; None means the layer was never created
    pub fn shapes_in_layer(&self, name: &str) -> Option<&[Shape]> {
        self.layers.get(name).map(|l| l.shapes.as_slice())
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// Layer names bottom to top
    pub fn layer_names(&self) -> &[String] {
        &self.order
    }

    pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.layers.get_mut(name) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_layer_interactive(&mut self, name: &str, interactive: bool) -> bool {
        match self.layers.get_mut(name) {
            Some(layer) => {
                layer.interactive = interactive;
                true
            }
            None => false,
        }
    }

    pub fn layer_of(&self, id: ShapeId) -> Option<&str> {
        self.index.get(&id).map(String::as_str)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        let layer = self.layers.get(self.index.get(&id)?)?;
        layer.shapes.iter().find(|s| s.id == id)
    }

    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        let layer = self.layers.get_mut(self.index.get(&id)?)?;
        layer.shapes.iter_mut().find(|s| s.id == id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Every shape, bottom layer first
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> + '_ {
        self.order.iter().filter_map(|n| self.layers.get(n)).flat_map(|l| l.shapes.iter())
    }

    pub fn shapes_mut(&mut self) -> impl Iterator<Item = &mut Shape> + '_ {
        self.layers.values_mut().flat_map(|l| l.shapes.iter_mut())
    }

    pub fn shape_count(&self) -> usize {
        self.index.len()
    }

    /// Restore a shape's base style. Geometry is never touched.
    pub fn reset_shape_style(&mut self, id: ShapeId) -> bool {
        match self.shape_mut(id) {
            Some(shape) => {
                shape.style = shape.base_style.clone();
                true
            }
            None => false,
        }
    }

    /// Remove every shape from a layer, keeping the layer and its position
    pub fn clear_layer(&mut self, name: &str) -> Vec<ShapeId> {
        let Some(layer) = self.layers.get_mut(name) else {
            return Vec::new();
        };
        let removed: Vec<ShapeId> = layer.shapes.drain(..).map(|s| s.id).collect();
        for id in &removed {
            self.index.remove(id);
        }
        removed
    }

    /// Teardown only: drop a layer and its shapes
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let Some(layer) = self.layers.remove(name) else {
            return false;
        };
        for shape in &layer.shapes {
            self.index.remove(&shape.id);
        }
        self.order.retain(|n| n != name);
        debug_assert!(self.is_consistent());
        true
    }

    /// Teardown only: drop everything
    pub fn clear(&mut self) {
        self.layers.clear();
        self.order.clear();
        self.index.clear();
    }

    /// Visible shapes in z-order (layer flag and shape flag both set)
    pub fn render_list(&self) -> Vec<RenderItem<'_>> {
        let mut items = Vec::with_capacity(self.index.len());
        for (z, name) in self.order.iter().enumerate() {
            let Some(layer) = self.layers.get(name) else {
                continue;
            };
            if !layer.visible {
                continue;
            }
            items.extend(
                layer
                    .shapes
                    .iter()
                    .filter(|s| s.visible)
                    .map(|shape| RenderItem { shape, z, interactive: layer.interactive }),
            );
        }
        items
    }

    /// Every ordered name maps to a layer exactly once, and vice versa
    pub fn is_consistent(&self) -> bool {
        if self.order.len() != self.layers.len() {
            return false;
        }
        let mut seen = FxHashSet::default();
        self.order.iter().all(|n| seen.insert(n.as_str()) && self.layers.contains_key(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::VenueId;

    fn shape(seq: u32) -> Shape {
        Shape::new(
            ShapeId::new(VenueId(1), seq),
            GeometryKind::Point,
            vec![GeoCoord::new(0.0, seq as f64)],
            StyleClass::Layer("test".to_string()),
            Style::default().with_fill("#ccc"),
        )
    }

    #[test]
    fn test_new_layer_appended_once_on_top() {
        let mut store = GeometryStore::new();
        store.add_shape(shape(1), "Background");
        store.add_shape(shape(2), "Units");

        for seq in 10..13 {
            store.add_shape(shape(seq), "Labels");
        }

        assert_eq!(store.layer_names(), &["Background", "Units", "Labels"]);
        assert_eq!(store.layer_names().iter().filter(|n| *n == "Labels").count(), 1);
        assert_eq!(store.shapes_in_layer("Labels").map(|s| s.len()), Some(3));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_absent_layer_distinct_from_empty() {
        let mut store = GeometryStore::new();
        assert!(store.shapes_in_layer("Wayfind").is_none());

        store.ensure_layer("Wayfind");
        assert_eq!(store.shapes_in_layer("Wayfind").map(|s| s.len()), Some(0));
    }

    #[test]
    fn test_layer_flags_drive_render_list() {
        let mut store = GeometryStore::new();
        store.add_shape(shape(1), "A");
        store.add_shape(shape(2), "B");

        assert_eq!(store.render_list().len(), 2);

        assert!(store.set_layer_visible("A", false));
        let items = store.render_list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].z, 1);
        // Shape records untouched
        assert!(store.shape(ShapeId::new(VenueId(1), 1)).unwrap().visible);

        assert!(store.set_layer_interactive("B", true));
        assert!(store.render_list()[0].interactive);
        assert!(!store.set_layer_visible("missing", true));
    }

    #[test]
    fn test_reset_shape_style_keeps_geometry() {
        let mut store = GeometryStore::new();
        store.add_shape(shape(1), "A");
        let id = ShapeId::new(VenueId(1), 1);

        store.shape_mut(id).unwrap().style = Style::default().with_fill("#f00");
        assert!(store.reset_shape_style(id));

        let s = store.shape(id).unwrap();
        assert_eq!(s.style, s.base_style);
        assert_eq!(s.coordinates.len(), 1);
    }

    #[test]
    fn test_clear_layer_keeps_order() {
        let mut store = GeometryStore::new();
        store.add_shape(shape(1), "A");
        store.add_shape(shape(2), "Wayfind");
        store.add_shape(shape(3), "Wayfind");

        let removed = store.clear_layer("Wayfind");
        assert_eq!(removed.len(), 2);
        assert_eq!(store.shapes_in_layer("Wayfind").map(|s| s.len()), Some(0));
        assert_eq!(store.layer_names(), &["A", "Wayfind"]);
        assert!(!store.contains(ShapeId::new(VenueId(1), 2)));
        assert_eq!(store.shape_count(), 1);
    }

    #[test]
    fn test_remove_layer_and_clear() {
        let mut store = GeometryStore::new();
        store.add_shape(shape(1), "A");
        store.add_shape(shape(2), "B");

        assert!(store.remove_layer("A"));
        assert_eq!(store.layer_names(), &["B"]);
        assert_eq!(store.layer_of(ShapeId::new(VenueId(1), 2)), Some("B"));
        assert!(store.is_consistent());

        store.clear();
        assert!(store.layer_names().is_empty());
        assert_eq!(store.shape_count(), 0);
    }
}
