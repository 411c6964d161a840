//! Pre-parsed venue description
//!
//! This is the boundary with the venue data source: one `VenueData` per
//! venue, already decoded into memory. Controllers derive their geometry
//! stores and graphs from it and never mutate it.

use crate::domain::types::{
    AmenityId, BuildingId, DestinationId, EdgeId, GeoCoord, GeometryKind, GlobalWaypoint, MapId,
    PathTypeId, Point, TransitionKind, VenueId, WaypointId, METRES_PER_DEGREE,
};
use serde::Deserialize;

fn full_access() -> u8 {
    100
}

fn default_true() -> bool {
    true
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueData {
    pub id: VenueId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub buildings: Vec<BuildingData>,
    pub maps: Vec<MapData>,
    #[serde(default)]
    pub waypoints: Vec<WaypointData>,
    #[serde(default)]
    pub edges: Vec<EdgeData>,
    #[serde(default)]
    pub destinations: Vec<DestinationData>,
    #[serde(default)]
    pub amenities: Vec<AmenityData>,
    #[serde(default)]
    pub path_types: Vec<PathTypeData>,
    /// Map shown by `show_default_map` (falls back to level 0, then the first map)
    #[serde(default)]
    pub default_map: Option<MapId>,
    #[serde(default)]
    pub geo_reference: GeoReference,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    pub id: BuildingId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_map: Option<MapId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    pub id: MapId,
    #[serde(default)]
    pub building: Option<BuildingId>,
    #[serde(default)]
    pub name: String,
    /// Canonical floor level (not an index; bases differ between venues)
    pub level: i32,
    #[serde(default)]
    pub layers: Vec<RawLayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLayer {
    pub name: String,
    #[serde(default)]
    pub geometries: Vec<RawGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
    pub kind: GeometryKind,
    pub coordinates: Vec<Point>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Waypoints this shape represents (units reference their entrances)
    #[serde(default)]
    pub waypoints: Vec<WaypointId>,
    #[serde(default)]
    pub unit: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaypointData {
    pub id: WaypointId,
    pub map: MapId,
    pub position: Point,
    /// Connector to the outside (building entrance/exit)
    #[serde(default)]
    pub exit: bool,
    /// Accessibility rating of the waypoint itself (0-100)
    #[serde(default = "full_access")]
    pub accessibility: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeData {
    pub id: EdgeId,
    pub from: WaypointId,
    pub to: WaypointId,
    /// Distance weight; derived from endpoint positions when absent
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "full_access")]
    pub accessibility: u8,
    #[serde(default)]
    pub transition: TransitionKind,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationData {
    pub id: DestinationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub waypoints: Vec<WaypointId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmenityData {
    pub id: AmenityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub waypoints: Vec<WaypointId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathTypeData {
    pub id: PathTypeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub waypoints: Vec<WaypointId>,
}

/// Placement of a venue's local map space on the outdoor map
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoReference {
    /// Geo position of the local origin (0, 0)
    pub origin: GeoCoord,
    #[serde(default = "default_scale")]
    pub metres_per_unit: f64,
    /// Counter-clockwise rotation of local +x from east
    #[serde(default)]
    pub rotation_deg: f64,
}

impl Default for GeoReference {
    fn default() -> Self {
        Self { origin: GeoCoord::default(), metres_per_unit: 1.0, rotation_deg: 0.0 }
    }
}

impl GeoReference {
    /// Transform a local map point to a geo coordinate (local +y is north)
    pub fn to_geo(&self, p: Point) -> GeoCoord {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let east = (p.x * cos - p.y * sin) * self.metres_per_unit;
        let north = (p.x * sin + p.y * cos) * self.metres_per_unit;
        let lat = self.origin.lat + north / METRES_PER_DEGREE;
        let lng_scale = METRES_PER_DEGREE * self.origin.lat.to_radians().cos().max(1e-9);
        GeoCoord::new(lat, self.origin.lng + east / lng_scale)
    }

    /// Convert a local distance to metres
    #[inline]
    pub fn to_metres(&self, local: f64) -> f64 {
        local * self.metres_per_unit
    }
}

impl VenueData {
    pub fn map(&self, id: MapId) -> Option<&MapData> {
        self.maps.iter().find(|m| m.id == id)
    }

    pub fn map_for_level(&self, level: i32) -> Option<&MapData> {
        self.maps.iter().find(|m| m.level == level)
    }

    /// Venue default map, then level 0, then the first map
    pub fn default_map_id(&self) -> Option<MapId> {
        self.default_map
            .filter(|id| self.map(*id).is_some())
            .or_else(|| self.map_for_level(0).map(|m| m.id))
            .or_else(|| self.maps.first().map(|m| m.id))
    }

    pub fn levels(&self) -> impl Iterator<Item = i32> + '_ {
        self.maps.iter().map(|m| m.level)
    }

    pub fn amenity(&self, id: AmenityId) -> Option<&AmenityData> {
        self.amenities.iter().find(|a| a.id == id)
    }

    pub fn path_type(&self, id: PathTypeId) -> Option<&PathTypeData> {
        self.path_types.iter().find(|p| p.id == id)
    }
}

/// Indoor connection between waypoints of two venues (skybridge, tunnel)
#[derive(Debug, Clone, PartialEq)]
pub struct VenueLink {
    pub from: GlobalWaypoint,
    pub to: GlobalWaypoint,
    pub weight: f64,
    pub accessibility: u8,
    pub transition: TransitionKind,
    pub bidirectional: bool,
}

impl VenueLink {
    pub fn new(from: GlobalWaypoint, to: GlobalWaypoint, weight: f64) -> Self {
        Self {
            from,
            to,
            weight,
            accessibility: 100,
            transition: TransitionKind::None,
            bidirectional: true,
        }
    }

    pub fn with_accessibility(mut self, accessibility: u8) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Whether this link connects the two venues (in either direction)
    pub fn joins(&self, a: VenueId, b: VenueId) -> bool {
        (self.from.venue == a && self.to.venue == b) || (self.from.venue == b && self.to.venue == a)
    }
}
