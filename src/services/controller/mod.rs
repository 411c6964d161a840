//! Venue controller - one venue's active state, geometry and styles
//!
//! Owns the per-map geometry stores, the venue graph, style records and the
//! current-path overlay slot. A controller is single-owner: callers share it
//! as a `ControllerHandle` and hold the lock only for synchronous work, never
//! across an await.

mod styling;


use crate::domain::error::{Result, WayfindError};
use crate::domain::route::PathSegment;
use crate::domain::style::{StyleClass, StyleSheet};
use crate::domain::types::{
    BuildingId, GeoCoord, GeometryKind, MapId, Point, Polyline, ShapeId, UserLocation, VenueId,
    VenueState, WaypointId,
};
use crate::domain::venue::VenueData;
use crate::infra::config::Config;
use crate::io::surface::{MapObserver, RenderSurface, TapEvent};
use crate::services::geometry_store::{GeometryStore, Shape, ShapeOrigin};
use crate::services::path_overlay::{PathOverlay, RequestToken};
use crate::services::style_engine::StyleEngine;
use crate::services::venue_graph::VenueGraph;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared, lock-guarded controller
pub type ControllerHandle = Arc<Mutex<VenueController>>;

pub const AMENITY_LAYER: &str = "Amenities";
pub const PATH_TYPE_LAYER: &str = "PathTypes";

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Layer receiving indoor path shapes
    pub path_layer: String,
    /// Layer of the outdoor store receiving outdoor path shapes
    pub outdoor_path_layer: String,
    /// Layers created up front, bottom first, when a map is parsed
    pub layer_sequence: Vec<String>,
    /// Layer holding text map labels
    pub label_layer: String,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            path_layer: "Wayfind".to_string(),
            outdoor_path_layer: "OutdoorWayfind".to_string(),
            layer_sequence: Vec::new(),
            label_layer: "MapLabels".to_string(),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path_layer: config.path_layer().to_string(),
            outdoor_path_layer: config.outdoor_path_layer().to_string(),
            layer_sequence: config.layer_sequence().to_vec(),
            label_layer: config.label_layer().to_string(),
        }
    }
}

#[derive(Debug)]
struct MapEntry {
    store: GeometryStore,
    parsed: bool,
    level: i32,
    building: Option<BuildingId>,
}

pub struct VenueController {
    venue: Arc<VenueData>,
    options: ControllerOptions,
    state: VenueState,
    maps: FxHashMap<MapId, MapEntry>,
    /// Outdoor overlay (outdoor legs of stitched routes)
    outdoor: GeometryStore,
    graph: Option<VenueGraph>,
    styles: StyleEngine,
    overlay: PathOverlay,
    surface: Arc<dyn RenderSurface>,
    observer: MapObserver,
    current_map: Option<MapId>,
    current_building: Option<BuildingId>,
    user_location: Option<UserLocation>,
    next_shape: u32,
}

impl VenueController {
    pub fn new(
        venue: Arc<VenueData>,
        sheet: Arc<StyleSheet>,
        surface: Arc<dyn RenderSurface>,
        options: ControllerOptions,
    ) -> Self {
        let maps = venue
            .maps
            .iter()
            .map(|m| {
                let entry = MapEntry { store: GeometryStore::new(), parsed: false, level: m.level, building: m.building };
                (m.id, entry)
            })
            .collect();

        let mut styles = StyleEngine::new(sheet);
        for amenity in &venue.amenities {
            styles.register_name(StyleClass::Amenity(amenity.id), &amenity.name);
        }
        for path_type in &venue.path_types {
            styles.register_name(StyleClass::PathType(path_type.id), &path_type.name);
        }

        Self {
            venue,
            options,
            state: VenueState::Unloaded,
            maps,
            outdoor: GeometryStore::new(),
            graph: None,
            styles,
            overlay: PathOverlay::new(),
            surface,
            observer: MapObserver::default(),
            current_map: None,
            current_building: None,
            user_location: None,
            next_shape: 0,
        }
    }

    pub fn into_handle(self) -> ControllerHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn venue_id(&self) -> VenueId {
        self.venue.id
    }

    pub fn venue(&self) -> &VenueData {
        &self.venue
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn state(&self) -> VenueState {
        self.state
    }

    pub fn current_map(&self) -> Option<MapId> {
        self.current_map
    }

    pub fn current_building(&self) -> Option<BuildingId> {
        self.current_building
    }

    pub fn user_location(&self) -> Option<&UserLocation> {
        self.user_location.as_ref()
    }

    pub fn observer_mut(&mut self) -> &mut MapObserver {
        &mut self.observer
    }

    /// The venue graph, once any map has been parsed
    pub fn graph(&self) -> Option<&VenueGraph> {
        self.graph.as_ref()
    }

    /// The venue graph, or `InvalidState` while the venue is unloaded
    pub fn require_graph(&self) -> Result<&VenueGraph> {
        self.graph
            .as_ref()
            .ok_or_else(|| WayfindError::invalid_state(self.venue.id, self.state, "parsed"))
    }

    /// Canonical levels of every map, ascending
    pub fn levels(&self) -> Vec<i32> {
        let mut levels: Vec<i32> = self.maps.values().map(|m| m.level).collect();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    pub fn map_for_level(&self, level: i32) -> Option<MapId> {
        self.venue.map_for_level(level).map(|m| m.id)
    }

    pub fn map_store(&self, map: MapId) -> Option<&GeometryStore> {
        self.maps.get(&map).map(|m| &m.store)
    }

    pub fn outdoor_store(&self) -> &GeometryStore {
        &self.outdoor
    }

    pub fn is_parsed(&self, map: MapId) -> bool {
        self.maps.get(&map).is_some_and(|m| m.parsed)
    }

    fn next_shape_id(&mut self) -> ShapeId {
        self.next_shape += 1;
        ShapeId::new(self.venue.id, self.next_shape)
    }

    /// Build the map's geometry (and the venue graph on first use).
    /// Repeated calls are no-ops.
    pub fn parse_map(&mut self, map_id: MapId) -> Result<()> {
        let venue_id = self.venue.id;
        let entry = self.maps.get(&map_id).ok_or_else(|| WayfindError::unknown_map(venue_id, map_id))?;
        if entry.parsed {
            debug!(venue_id = %venue_id, map_id = %map_id, "map_already_parsed");
            return Ok(());
        }

        let venue = Arc::clone(&self.venue);
        let Some(data) = venue.map(map_id) else {
            return Err(WayfindError::unknown_map(venue_id, map_id));
        };
        if self.graph.is_none() {
            self.graph = Some(VenueGraph::build(&venue));
        }
        let georef = venue.geo_reference;

        let mut store = GeometryStore::new();
        for name in &self.options.layer_sequence {
            store.ensure_layer(name);
        }

        for raw_layer in &data.layers {
            store.ensure_layer(&raw_layer.name);
            for raw in &raw_layer.geometries {
                let id = self.next_shape_id();
                let class = if raw.unit { StyleClass::Unit } else { StyleClass::Layer(raw_layer.name.clone()) };
                let coords = raw.coordinates.iter().map(|p| georef.to_geo(*p)).collect();
                let origin = if raw.unit {
                    Some(ShapeOrigin::Unit(SmallVec::from_slice(&raw.waypoints)))
                } else if let [waypoint] = raw.waypoints.as_slice() {
                    Some(ShapeOrigin::Waypoint(*waypoint))
                } else {
                    None
                };

                let mut shape = self
                    .new_shape(id, raw.kind, coords, class)
                    .with_properties(raw.properties.clone());
                if let Some(origin) = origin {
                    shape = shape.with_origin(origin);
                }
                if let Some(graph) = self.graph.as_mut() {
                    graph.register_shape(id, &raw.waypoints);
                }
                store.add_shape(shape, &raw_layer.name);
            }
        }

        let mut marker_count = 0usize;
        for amenity in &venue.amenities {
            for (waypoint, geo) in self.waypoints_on_map(&amenity.waypoints, map_id) {
                let id = self.next_shape_id();
                let shape = self
                    .new_shape(id, GeometryKind::Point, vec![geo], StyleClass::Amenity(amenity.id))
                    .with_origin(ShapeOrigin::Amenity { amenity: amenity.id, waypoint });
                if let Some(graph) = self.graph.as_mut() {
                    graph.register_amenity_shape(amenity.id, waypoint, id);
                }
                store.add_shape(shape, AMENITY_LAYER);
                marker_count += 1;
            }
        }
        for path_type in &venue.path_types {
            for (waypoint, geo) in self.waypoints_on_map(&path_type.waypoints, map_id) {
                let id = self.next_shape_id();
                let shape = self
                    .new_shape(id, GeometryKind::Point, vec![geo], StyleClass::PathType(path_type.id))
                    .with_origin(ShapeOrigin::PathType { path_type: path_type.id, waypoint });
                if let Some(graph) = self.graph.as_mut() {
                    graph.register_path_type_shape(path_type.id, waypoint, id);
                }
                store.add_shape(shape, PATH_TYPE_LAYER);
                marker_count += 1;
            }
        }

        store.ensure_layer(&self.options.path_layer);

        info!(
            venue_id = %venue_id,
            map_id = %map_id,
            level = data.level,
            layers = store.layer_names().len(),
            shapes = store.shape_count(),
            markers = marker_count,
            "map_parsed"
        );

        if let Some(entry) = self.maps.get_mut(&map_id) {
            entry.store = store;
            entry.parsed = true;
        }
        if self.state == VenueState::Unloaded {
            self.state = VenueState::Parsed;
        }
        Ok(())
    }

    pub fn parse_all_maps(&mut self) -> Result<()> {
        let ids: Vec<MapId> = self.venue.maps.iter().map(|m| m.id).collect();
        for id in ids {
            self.parse_map(id)?;
        }
        Ok(())
    }

    fn new_shape(&self, id: ShapeId, kind: GeometryKind, coords: Vec<GeoCoord>, class: StyleClass) -> Shape {
        let mut shape = Shape::new(id, kind, coords, class.clone(), self.styles.base_for(&class));
        shape.style = self.styles.effective(&class);
        shape
    }

    /// Waypoints of `ids` located on `map`, with their geo positions
    fn waypoints_on_map(&self, ids: &[WaypointId], map: MapId) -> Vec<(WaypointId, GeoCoord)> {
        let Some(graph) = self.graph.as_ref() else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| graph.waypoint(*id))
            .filter(|w| w.map == map)
            .map(|w| (w.id, w.geo))
            .collect()
    }

    /// Display a map, parsing it first if needed
    pub fn show_map(&mut self, map_id: MapId) -> Result<()> {
        let venue_id = self.venue.id;
        if !self.maps.contains_key(&map_id) {
            return Err(WayfindError::unknown_map(venue_id, map_id));
        }
        self.parse_map(map_id)?;

        if let Some(previous) = self.current_map.filter(|m| *m != map_id) {
            self.surface.clear(venue_id, previous);
        }
        self.current_map = Some(map_id);
        self.current_building = self.maps.get(&map_id).and_then(|m| m.building);
        self.state = VenueState::Displayed;
        self.refresh();

        info!(venue_id = %venue_id, map_id = %map_id, "map_shown");
        Ok(())
    }

    pub fn show_default_map(&mut self) -> Result<()> {
        let map = self.venue.default_map_id().ok_or_else(|| {
            WayfindError::InvalidReference(format!("venue {} has no maps", self.venue.id))
        })?;
        self.show_map(map)
    }

    /// Show the map at a canonical level; Ok(false) when the venue has none
    pub fn show_map_by_level(&mut self, level: i32) -> Result<bool> {
        match self.map_for_level(level) {
            Some(map) => self.show_map(map).map(|_| true),
            None => {
                debug!(venue_id = %self.venue.id, level, "no_map_at_level");
                Ok(false)
            }
        }
    }

    /// Hide the displayed map; geometry stays built
    pub fn hide_map(&mut self) -> Result<()> {
        match self.state {
            VenueState::Displayed => {
                if let Some(map) = self.current_map {
                    self.surface.clear(self.venue.id, map);
                }
                self.state = VenueState::Hidden;
                info!(venue_id = %self.venue.id, "map_hidden");
                Ok(())
            }
            VenueState::Hidden => Ok(()),
            state => Err(WayfindError::invalid_state(self.venue.id, state, "displayed")),
        }
    }

    /// Push the current map and outdoor overlay to the surface
    pub fn refresh(&self) {
        if self.state != VenueState::Displayed {
            return;
        }
        if let Some(map) = self.current_map {
            if let Some(entry) = self.maps.get(&map) {
                self.surface.present(self.venue.id, map, &entry.store.render_list());
            }
        }
        self.surface.present_outdoor(self.venue.id, &self.outdoor.render_list());
    }

    pub fn all_layer_names(&self, map: MapId) -> Vec<String> {
        self.map_store(map).map(|s| s.layer_names().to_vec()).unwrap_or_default()
    }

    pub fn shapes_in_layer(&self, name: &str, map: MapId) -> Option<&[Shape]> {
        self.map_store(map)?.shapes_in_layer(name)
    }

    /// Apply a layer flag on every map; false when no map has the layer
    fn set_layer_flag(&mut self, name: &str, f: impl Fn(&mut GeometryStore, &str) -> bool) -> bool {
        let mut found = false;
        for entry in self.maps.values_mut() {
            found |= f(&mut entry.store, name);
        }
        self.refresh();
        found
    }

    pub fn show_layer(&mut self, name: &str) -> bool {
        self.set_layer_flag(name, |s, n| s.set_layer_visible(n, true))
    }

    pub fn hide_layer(&mut self, name: &str) -> bool {
        self.set_layer_flag(name, |s, n| s.set_layer_visible(n, false))
    }

    pub fn enable_layer_interactivity(&mut self, name: &str) -> bool {
        self.set_layer_flag(name, |s, n| s.set_layer_interactive(n, true))
    }

    pub fn disable_layer_interactivity(&mut self, name: &str) -> bool {
        self.set_layer_flag(name, |s, n| s.set_layer_interactive(n, false))
    }

    pub fn show_all_text_map_labels(&mut self) -> bool {
        let layer = self.options.label_layer.clone();
        self.show_layer(&layer)
    }

    pub fn hide_all_text_map_labels(&mut self) -> bool {
        let layer = self.options.label_layer.clone();
        self.hide_layer(&layer)
    }

    /// Forward a surface tap; the shape is only reported from interactive layers
    pub fn dispatch_tap(&self, map: MapId, shape: Option<ShapeId>, point: GeoCoord) -> bool {
        let shape = shape.filter(|id| {
            self.map_store(map)
                .and_then(|s| s.layer_of(*id).and_then(|l| s.layer(l)))
                .is_some_and(|l| l.interactive)
        });
        let event = TapEvent { venue: self.venue.id, map, shape, point };
        self.observer.notify_tap(&event)
    }

    pub fn dispatch_zoom(&self, scale: f64) -> bool {
        self.observer.notify_zoom(scale)
    }

    pub fn dispatch_rotation(&self, degrees: f64) -> bool {
        self.observer.notify_rotation(degrees)
    }

    pub fn update_user_location(
        &mut self,
        position: Point,
        map: MapId,
        orientation: Option<f32>,
        confidence_radius: Option<f32>,
    ) -> Result<()> {
        if !self.maps.contains_key(&map) {
            return Err(WayfindError::unknown_map(self.venue.id, map));
        }
        let location = UserLocation {
            map,
            position,
            geo: self.venue.geo_reference.to_geo(position),
            orientation,
            confidence_radius,
        };
        self.surface.show_user_location(self.venue.id, &location);
        self.user_location = Some(location);
        Ok(())
    }

    /// Stamp a new wayfinding request; older tokens become stale
    pub fn issue_token(&mut self) -> RequestToken {
        self.overlay.issue()
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.overlay.is_current(token)
    }

    /// Ok while `token` may still write the path, `Superseded` otherwise
    pub fn check_token(&self, token: RequestToken) -> Result<()> {
        self.overlay.check(token)
    }

    pub fn applied_token(&self) -> Option<u64> {
        self.overlay.applied()
    }

    /// Replace the rendered path with `segments` and `outdoor` legs, if
    /// `token` is still the newest request. Nothing is touched otherwise.
    pub fn render_route(&mut self, token: RequestToken, segments: &[PathSegment], outdoor: &[Polyline]) -> Result<()> {
        self.overlay.check(token)?;
        if let Some(seg) = segments.iter().find(|s| !self.maps.contains_key(&s.map)) {
            return Err(WayfindError::unknown_map(self.venue.id, seg.map));
        }
        // A later parse would replace the store and drop the path drawn into it
        let unparsed: Vec<MapId> = segments.iter().map(|s| s.map).filter(|m| !self.is_parsed(*m)).collect();
        for map in unparsed {
            self.parse_map(map)?;
        }

        self.clear_path_shapes();

        let path_layer = self.options.path_layer.clone();
        let mut maps: Vec<MapId> = Vec::new();
        for seg in segments.iter().filter(|s| !s.polyline.is_empty()) {
            let id = self.next_shape_id();
            let kind = if seg.polyline.len() == 1 { GeometryKind::Point } else { GeometryKind::Line };
            let shape = self
                .new_shape(id, kind, seg.polyline.clone(), StyleClass::Wayfind)
                .with_origin(ShapeOrigin::Route);
            if let Some(entry) = self.maps.get_mut(&seg.map) {
                entry.store.add_shape(shape, &path_layer);
            }
            if !maps.contains(&seg.map) {
                maps.push(seg.map);
            }
        }

        let outdoor_layer = self.options.outdoor_path_layer.clone();
        let mut outdoor_ids = Vec::new();
        for line in outdoor.iter().filter(|l| !l.is_empty()) {
            let id = self.next_shape_id();
            let shape = self
                .new_shape(id, GeometryKind::Line, line.clone(), StyleClass::OutdoorWayfind)
                .with_origin(ShapeOrigin::Route);
            self.outdoor.add_shape(shape, &outdoor_layer);
            outdoor_ids.push(id);
        }

        debug!(
            venue_id = %self.venue.id,
            token = %token,
            segments = segments.len(),
            outdoor_legs = outdoor_ids.len(),
            "route_rendered"
        );
        self.overlay.mark_applied(token, maps, outdoor_ids);
        self.refresh();
        Ok(())
    }

    fn clear_path_shapes(&mut self) -> usize {
        let path_layer = &self.options.path_layer;
        let mut removed = 0;
        for entry in self.maps.values_mut() {
            removed += entry.store.clear_layer(path_layer).len();
        }
        removed + self.outdoor.clear_layer(&self.options.outdoor_path_layer).len()
    }

    /// Remove indoor and outdoor path shapes and retire in-flight requests
    pub fn clear_wayfind_path(&mut self) {
        self.overlay.invalidate();
        let removed = self.clear_path_shapes();
        info!(venue_id = %self.venue.id, removed, "wayfind_path_cleared");
        self.refresh();
    }

    /// Shapes currently in the indoor and outdoor path layers
    pub fn path_shape_count(&self) -> usize {
        let indoor: usize = self
            .maps
            .values()
            .filter_map(|e| e.store.shapes_in_layer(&self.options.path_layer))
            .map(<[Shape]>::len)
            .sum();
        indoor + self.outdoor.shapes_in_layer(&self.options.outdoor_path_layer).map_or(0, <[Shape]>::len)
    }
}
