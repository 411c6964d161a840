//! Shared identifiers and geometric primitives

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of latitude (spherical approximation)
pub const METRES_PER_DEGREE: f64 = 111_320.0;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Venue identity, unique across a session
    VenueId(u32)
);
id_newtype!(
    /// Building identity within a venue
    BuildingId(u32)
);
id_newtype!(
    /// Map (floor) identity within a venue
    MapId(u32)
);
id_newtype!(
    /// Navigable point in a venue graph
    WaypointId(u32)
);
id_newtype!(
    /// Edge identity within a venue graph
    EdgeId(u32)
);
id_newtype!(DestinationId(u32));
id_newtype!(AmenityId(u32));
id_newtype!(PathTypeId(u32));
id_newtype!(
    /// Shape identity. Doubles as the overlay key handed to the rendering surface.
    ShapeId(u64)
);

impl ShapeId {
    /// Compose a shape id that is unique across venues sharing one surface
    #[inline]
    pub fn new(venue: VenueId, seq: u32) -> Self {
        Self(((venue.0 as u64) << 32) | seq as u64)
    }

    #[inline]
    pub fn venue(&self) -> VenueId {
        VenueId((self.0 >> 32) as u32)
    }
}

/// A waypoint qualified by its venue, used by cross-venue search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalWaypoint {
    pub venue: VenueId,
    pub waypoint: WaypointId,
}

impl GlobalWaypoint {
    pub fn new(venue: VenueId, waypoint: WaypointId) -> Self {
        Self { venue, waypoint }
    }
}

impl fmt::Display for GlobalWaypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.waypoint)
    }
}

impl FromStr for GlobalWaypoint {
    type Err = String;

    /// Parses `<venue>:<waypoint>`, e.g. `12:3004`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (venue, waypoint) =
            s.split_once(':').ok_or_else(|| format!("expected <venue>:<waypoint>, got '{s}'"))?;
        let venue = venue.trim().parse::<u32>().map_err(|e| format!("bad venue id: {e}"))?;
        let waypoint =
            waypoint.trim().parse::<u32>().map_err(|e| format!("bad waypoint id: {e}"))?;
        Ok(Self::new(VenueId(venue), WaypointId(waypoint)))
    }
}

/// Position in a map's local coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// WGS84 coordinate on the outdoor map surface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lng: f64,
}

impl GeoCoord {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle (haversine) distance in metres
    pub fn distance_m(&self, other: &GeoCoord) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// Ordered sequence of geo coordinates rendered as one line
pub type Polyline = Vec<GeoCoord>;

/// North-east / south-west bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub north_east: GeoCoord,
    pub south_west: GeoCoord,
}

impl GeoBounds {
    /// Bounds enclosing every coordinate, or None for an empty input
    pub fn from_coords<'a>(coords: impl IntoIterator<Item = &'a GeoCoord>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self { north_east: first, south_west: first };
        for c in iter {
            bounds.extend(c);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, c: &GeoCoord) {
        self.north_east.lat = self.north_east.lat.max(c.lat);
        self.north_east.lng = self.north_east.lng.max(c.lng);
        self.south_west.lat = self.south_west.lat.min(c.lat);
        self.south_west.lng = self.south_west.lng.min(c.lng);
    }

    pub fn union(&self, other: &GeoBounds) -> GeoBounds {
        let mut merged = *self;
        merged.extend(&other.north_east);
        merged.extend(&other.south_west);
        merged
    }

    /// `[[ne_lat, ne_lng], [sw_lat, sw_lng]]`
    pub fn as_pairs(&self) -> [[f64; 2]; 2] {
        [
            [self.north_east.lat, self.north_east.lng],
            [self.south_west.lat, self.south_west.lng],
        ]
    }
}

/// Vertical circulation element carried by a floor-transition edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    None,
    Elevator,
    Escalator,
    Stairs,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::None => "none",
            TransitionKind::Elevator => "elevator",
            TransitionKind::Escalator => "escalator",
            TransitionKind::Stairs => "stairs",
        }
    }
}

/// Geometry type tag of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

/// Lifecycle state of a venue's active record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueState {
    Unloaded,
    Parsed,
    Displayed,
    Hidden,
}

impl VenueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueState::Unloaded => "unloaded",
            VenueState::Parsed => "parsed",
            VenueState::Displayed => "displayed",
            VenueState::Hidden => "hidden",
        }
    }
}

/// Last reported user position marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserLocation {
    pub map: MapId,
    pub position: Point,
    pub geo: GeoCoord,
    /// Degrees relative to true north
    pub orientation: Option<f32>,
    /// Confidence radius in pixels
    pub confidence_radius: Option<f32>,
}
