//! Shared builders for service tests

use crate::domain::style::{Style, StyleSheet};
use crate::domain::types::{
    AmenityId, DestinationId, EdgeId, GeoCoord, GeometryKind, MapId, PathTypeId, Point,
    TransitionKind, VenueId, WaypointId,
};
use crate::domain::venue::{
    AmenityData, DestinationData, EdgeData, GeoReference, MapData, PathTypeData, RawGeometry,
    RawLayer, VenueData, WaypointData,
};
use crate::io::surface::RenderSurface;
use crate::services::controller::{ControllerHandle, ControllerOptions, VenueController};
use std::sync::Arc;

/// Builder for test venues. Map ids are `venue * 100 + level offset`.
pub struct VenueBuilder {
    data: VenueData,
}

impl VenueBuilder {
    pub fn new(id: u32) -> Self {
        Self {
            data: VenueData {
                id: VenueId(id),
                name: format!("venue-{id}"),
                buildings: Vec::new(),
                maps: Vec::new(),
                waypoints: Vec::new(),
                edges: Vec::new(),
                destinations: Vec::new(),
                amenities: Vec::new(),
                path_types: Vec::new(),
                default_map: None,
                geo_reference: GeoReference {
                    origin: GeoCoord::new(43.0 + id as f64 * 0.01, -79.0),
                    metres_per_unit: 1.0,
                    rotation_deg: 0.0,
                },
            },
        }
    }

    pub fn map_id(&self, level: i32) -> MapId {
        MapId(self.data.id.0 * 100 + (level + 50) as u32)
    }

    pub fn level(mut self, level: i32) -> Self {
        let id = self.map_id(level);
        self.data.maps.push(MapData { id, building: None, name: format!("L{level}"), level, layers: Vec::new() });
        self
    }

    pub fn levels(self, levels: &[i32]) -> Self {
        levels.iter().fold(self, |b, l| b.level(*l))
    }

    pub fn waypoint(mut self, id: u32, level: i32, x: f64, y: f64) -> Self {
        let map = self.map_id(level);
        self.data.waypoints.push(WaypointData {
            id: WaypointId(id),
            map,
            position: Point::new(x, y),
            exit: false,
            accessibility: 100,
        });
        self
    }

    pub fn exit(mut self, id: u32, level: i32, x: f64, y: f64) -> Self {
        self = self.waypoint(id, level, x, y);
        if let Some(w) = self.data.waypoints.last_mut() {
            w.exit = true;
        }
        self
    }

    pub fn edge(self, id: u32, from: u32, to: u32, weight: f64, accessibility: u8) -> Self {
        self.edge_with(id, from, to, Some(weight), accessibility, TransitionKind::None)
    }

    pub fn edge_with(
        mut self,
        id: u32,
        from: u32,
        to: u32,
        weight: Option<f64>,
        accessibility: u8,
        transition: TransitionKind,
    ) -> Self {
        self.data.edges.push(EdgeData {
            id: EdgeId(id),
            from: WaypointId(from),
            to: WaypointId(to),
            weight,
            accessibility,
            transition,
            bidirectional: true,
        });
        self
    }

    pub fn destination(mut self, id: u32, waypoints: &[u32]) -> Self {
        self.data.destinations.push(DestinationData {
            id: DestinationId(id),
            name: format!("dest-{id}"),
            waypoints: waypoints.iter().map(|w| WaypointId(*w)).collect(),
        });
        self
    }

    pub fn amenity(mut self, id: u32, name: &str, waypoints: &[u32]) -> Self {
        self.data.amenities.push(AmenityData {
            id: AmenityId(id),
            name: name.to_string(),
            waypoints: waypoints.iter().map(|w| WaypointId(*w)).collect(),
        });
        self
    }

    pub fn path_type(mut self, id: u32, name: &str, waypoints: &[u32]) -> Self {
        self.data.path_types.push(PathTypeData {
            id: PathTypeId(id),
            name: name.to_string(),
            waypoints: waypoints.iter().map(|w| WaypointId(*w)).collect(),
        });
        self
    }

    /// Square unit polygon around (x, y) on a level, linked to `waypoints`
    pub fn unit(mut self, level: i32, x: f64, y: f64, waypoints: &[u32]) -> Self {
        let geometry = RawGeometry {
            kind: GeometryKind::Polygon,
            coordinates: vec![
                Point::new(x - 1.0, y - 1.0),
                Point::new(x + 1.0, y - 1.0),
                Point::new(x + 1.0, y + 1.0),
                Point::new(x - 1.0, y + 1.0),
            ],
            properties: serde_json::Map::new(),
            waypoints: waypoints.iter().map(|w| WaypointId(*w)).collect(),
            unit: true,
        };
        self.push_geometry(level, "Units", geometry)
    }

    pub fn label(self, level: i32, x: f64, y: f64, text: &str) -> Self {
        let mut properties = serde_json::Map::new();
        properties.insert("text".to_string(), serde_json::Value::from(text));
        let geometry = RawGeometry {
            kind: GeometryKind::Point,
            coordinates: vec![Point::new(x, y)],
            properties,
            waypoints: Vec::new(),
            unit: false,
        };
        self.push_geometry(level, "MapLabels", geometry)
    }

    fn push_geometry(mut self, level: i32, layer: &str, geometry: RawGeometry) -> Self {
        let id = self.map_id(level);
        if let Some(map) = self.data.maps.iter_mut().find(|m| m.id == id) {
            match map.layers.iter_mut().find(|l| l.name == layer) {
                Some(l) => l.geometries.push(geometry),
                None => map.layers.push(RawLayer { name: layer.to_string(), geometries: vec![geometry] }),
            }
        }
        self
    }

    pub fn build(self) -> VenueData {
        self.data
    }
}

pub fn test_sheet() -> Arc<StyleSheet> {
    let mut sheet = StyleSheet { default: Style::default().with_opacity(1.0), ..Default::default() };
    sheet.units = Style::default().with_fill("#eeeeee");
    sheet.amenities.insert("Washroom".to_string(), Style::default().with_icon("wc"));
    sheet.wayfind = Style::default().with_stroke("#0055ff", 4.0);
    Arc::new(sheet)
}

pub fn controller(data: VenueData, surface: Arc<dyn RenderSurface>) -> VenueController {
    VenueController::new(Arc::new(data), test_sheet(), surface, ControllerOptions::default())
}

pub fn handle(data: VenueData, surface: Arc<dyn RenderSurface>) -> ControllerHandle {
    controller(data, surface).into_handle()
}
